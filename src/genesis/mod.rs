//! Genesis account store.
//!
//! Loads vesting accounts from a node's `genesis.json` and writes the reconciled `x/auth`
//! genesis state back out.

/// `AccountStore` trait and its genesis file implementation
mod repository;
/// JSON shapes of the auth genesis state
mod types;

pub use repository::{AccountStore, ExportOutput, GenesisStore};
pub use types::{
	AuthGenesis, CONTINUOUS_VESTING_ACCOUNT, DELAYED_VESTING_ACCOUNT, PERIODIC_VESTING_ACCOUNT,
	is_vesting_account, parse_vesting_account,
};

use crate::utils::AddressError;
use std::path::PathBuf;

/// File name of the genesis document inside the home directory.
pub const GENESIS_FILE_NAME: &str = "genesis.json";

#[derive(Debug, thiserror::Error)]
pub enum GenesisError {
	#[error("failed to read {path:?}: {source}")]
	Read {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("address error: {0}")]
	Address(#[from] AddressError),

	#[error("unsupported account type {0}")]
	UnsupportedAccount(String),

	#[error("malformed genesis: {0}")]
	Malformed(String),
}
