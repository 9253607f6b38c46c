//! Chain query integration.
//!
//! This module defines the `ChainSource` contract the reconciliation driver consumes, the
//! HTTP client implementing it against a Cosmos SDK full node, and a read-through cache for
//! historical balance lookups.

/// Read-through balance cache
mod cache;
/// HTTP client for Tendermint RPC and Cosmos REST
mod client;
/// Wire types and errors of the node endpoints
mod types;

pub use cache::CachedChainSource;
pub use client::NodeClient;
pub use types::*;

use crate::vesting::{DelegationEvent, EventKind};

/// Chain history queries needed to replay an account.
#[async_trait::async_trait]
pub trait ChainSource: Send + Sync {
	/// Height of the latest committed block.
	async fn latest_height(&self) -> Result<u64, NodeError>;

	/// Every `kind` event sent by `address` at or below `max_height`, in any order.
	async fn find_events(
		&self,
		address: &str,
		kind: EventKind,
		max_height: u64,
	) -> Result<Vec<DelegationEvent>, NodeError>;

	/// Holdings of `denom` by `address` in the state committed at `height`.
	async fn fetch_balance(&self, address: &str, denom: &str, height: u64)
	-> Result<u128, NodeError>;
}
