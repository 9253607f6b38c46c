use super::GenesisError;
use super::types::AuthGenesis;
use crate::utils::AddressCodec;
use crate::vesting::VestingAccount;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Source of the accounts to reconcile and sink for the reconciled ones.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
	/// Load every vesting account to reconcile.
	async fn load_accounts(&self) -> Result<Vec<VestingAccount>, GenesisError>;

	/// Persist the reconciled accounts.
	async fn store_accounts(&self, accounts: &[VestingAccount]) -> Result<(), GenesisError>;
}

/// Where the exported auth genesis state is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutput {
	File(PathBuf),
	Stdout,
}

/// File-based implementation of `AccountStore` over a node's `genesis.json`.
///
/// The genesis file itself is never modified: the updated `x/auth` state is written to the
/// configured output.
pub struct GenesisStore {
	genesis_path: PathBuf,
	output: ExportOutput,
	codec: AddressCodec,
}

impl GenesisStore {
	pub fn new(genesis_path: PathBuf, output: ExportOutput, codec: AddressCodec) -> Self {
		Self {
			genesis_path,
			output,
			codec,
		}
	}

	/// Read the `app_state.auth` section of the genesis file.
	pub async fn read_auth_genesis(&self) -> Result<AuthGenesis, GenesisError> {
		let content = tokio::fs::read_to_string(&self.genesis_path)
			.await
			.map_err(|e| GenesisError::Read {
				path: self.genesis_path.clone(),
				source: e,
			})?;

		let mut document: serde_json::Value = serde_json::from_str(&content)?;
		let auth = document
			.get_mut("app_state")
			.and_then(|state| state.get_mut("auth"))
			.map(serde_json::Value::take)
			.ok_or_else(|| GenesisError::Malformed("genesis has no app_state.auth".to_string()))?;

		Ok(serde_json::from_value(auth)?)
	}

	async fn write_output(&self, bytes: &[u8]) -> Result<(), GenesisError> {
		match &self.output {
			ExportOutput::File(path) => {
				tokio::fs::write(path, bytes).await?;
				info!("Wrote exported auth state to {:?}", path);
			}
			ExportOutput::Stdout => {
				let mut stdout = tokio::io::stdout();
				stdout.write_all(bytes).await?;
				stdout.write_all(b"\n").await?;
				stdout.flush().await?;
			}
		}
		Ok(())
	}
}

#[async_trait::async_trait]
impl AccountStore for GenesisStore {
	async fn load_accounts(&self) -> Result<Vec<VestingAccount>, GenesisError> {
		let auth = self.read_auth_genesis().await?;
		let accounts = auth.vesting_accounts(&self.codec)?;
		info!(
			"Loaded {} vesting accounts out of {} genesis accounts from {:?}",
			accounts.len(),
			auth.accounts.len(),
			self.genesis_path
		);
		Ok(accounts)
	}

	async fn store_accounts(&self, accounts: &[VestingAccount]) -> Result<(), GenesisError> {
		let mut auth = self.read_auth_genesis().await?;
		let updated = auth.apply_buckets(accounts)?;
		if updated != accounts.len() {
			return Err(GenesisError::Malformed(format!(
				"{} reconciled accounts but only {} matching genesis entries",
				accounts.len(),
				updated
			)));
		}

		let bytes = serde_json::to_vec_pretty(&auth)?;
		self.write_output(&bytes).await
	}
}
