//! YAML configuration of the exporter.
//!
//! The address prefix, node endpoints and batch limits all live here and are passed
//! explicitly to the components that need them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up inside the home directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("config file {0:?} does not exist, create it before running the export")]
	NotFound(PathBuf),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("YAML parse error: {0}")]
	YamlError(#[from] serde_yaml::Error),

	#[error("invalid config: {0}")]
	Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	pub chain: ChainConfig,
	pub node: NodeConfig,
	#[serde(default)]
	pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
	/// Human readable part of every account address, e.g. `desmos`.
	pub bech32_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
	/// Tendermint RPC endpoint, e.g. `http://localhost:26657`.
	pub rpc_address: String,
	/// Cosmos REST endpoint, e.g. `http://localhost:1317`.
	pub api_address: String,
	#[serde(default = "default_timeout_secs")]
	pub timeout_secs: u64,
	/// Upper bound on the time spent retrying one request.
	#[serde(default = "default_max_retry_elapsed_secs")]
	pub max_retry_elapsed_secs: u64,
	#[serde(default = "default_page_size")]
	pub page_size: u32,
}

impl NodeConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}

	pub fn max_retry_elapsed(&self) -> Duration {
		Duration::from_secs(self.max_retry_elapsed_secs)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
	/// Accounts reconciled at the same time.
	#[serde(default = "default_concurrency")]
	pub concurrency: usize,
	/// Global deadline for the batch. Zero disables it.
	#[serde(default)]
	pub timeout_secs: u64,
}

impl Default for ExportConfig {
	fn default() -> Self {
		Self {
			concurrency: default_concurrency(),
			timeout_secs: 0,
		}
	}
}

impl ExportConfig {
	pub fn timeout(&self) -> Option<Duration> {
		(self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
	}
}

fn default_timeout_secs() -> u64 {
	30
}

fn default_max_retry_elapsed_secs() -> u64 {
	60
}

fn default_page_size() -> u32 {
	100
}

fn default_concurrency() -> usize {
	4
}

impl Config {
	/// Read and validate the config file at `path`.
	pub async fn read(path: &Path) -> Result<Self, ConfigError> {
		if !tokio::fs::try_exists(path).await.unwrap_or(false) {
			return Err(ConfigError::NotFound(path.to_path_buf()));
		}
		let content = tokio::fs::read_to_string(path).await?;
		Self::parse(&content)
	}

	pub fn parse(content: &str) -> Result<Self, ConfigError> {
		let config: Config = serde_yaml::from_str(content)?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.chain.bech32_prefix.trim().is_empty() {
			return Err(ConfigError::Invalid("chain.bech32_prefix is empty".to_string()));
		}
		if self.export.concurrency == 0 {
			return Err(ConfigError::Invalid(
				"export.concurrency must be at least 1".to_string(),
			));
		}
		if !(1..=100).contains(&self.node.page_size) {
			return Err(ConfigError::Invalid(format!(
				"node.page_size must be within 1..=100, got {}",
				self.node.page_size
			)));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
chain:
  bech32_prefix: desmos
node:
  rpc_address: http://localhost:26657
  api_address: http://localhost:1317
"#;

	#[test]
	fn fills_defaults() {
		let config = Config::parse(MINIMAL).unwrap();
		assert_eq!(config.chain.bech32_prefix, "desmos");
		assert_eq!(config.node.timeout(), Duration::from_secs(30));
		assert_eq!(config.node.page_size, 100);
		assert_eq!(config.export.concurrency, 4);
		assert_eq!(config.export.timeout(), None);
	}

	#[test]
	fn rejects_invalid_values() {
		let zero_workers = format!("{}export:\n  concurrency: 0\n", MINIMAL);
		assert!(matches!(
			Config::parse(&zero_workers),
			Err(ConfigError::Invalid(_))
		));

		let big_page = MINIMAL.replace(
			"api_address: http://localhost:1317",
			"api_address: http://localhost:1317\n  page_size: 500",
		);
		assert!(matches!(Config::parse(&big_page), Err(ConfigError::Invalid(_))));

		let no_prefix = MINIMAL.replace("desmos", "\"\"");
		assert!(matches!(Config::parse(&no_prefix), Err(ConfigError::Invalid(_))));
	}

	#[tokio::test]
	async fn missing_file_is_reported() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join(CONFIG_FILE_NAME);
		assert!(matches!(
			Config::read(&path).await,
			Err(ConfigError::NotFound(_))
		));

		tokio::fs::write(&path, MINIMAL).await.unwrap();
		assert!(Config::read(&path).await.is_ok());
	}
}
