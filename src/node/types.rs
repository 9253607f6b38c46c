//! Wire types for the Tendermint RPC and Cosmos REST endpoints used by the exporter.

use crate::vesting::Coin;
use crate::utils::json::str_or_num;
use serde::{Deserialize, Serialize};

/// JSON-RPC envelope returned by the Tendermint RPC endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
	pub result: Option<T>,
	pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorBody {
	pub code: i64,
	pub message: String,
	#[serde(default)]
	pub data: Option<String>,
}

/// Result of `/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResult {
	pub sync_info: SyncInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncInfo {
	#[serde(deserialize_with = "str_or_num")]
	pub latest_block_height: u64,
}

/// Result of `/tx_search`.
#[derive(Debug, Clone, Deserialize)]
pub struct TxSearchResult {
	#[serde(default)]
	pub txs: Vec<TxSearchItem>,
	#[serde(deserialize_with = "str_or_num")]
	pub total_count: u64,
}

/// One transaction hit of `/tx_search`.
#[derive(Debug, Clone, Deserialize)]
pub struct TxSearchItem {
	/// Hex encoded transaction hash.
	pub hash: String,
	#[serde(deserialize_with = "str_or_num")]
	pub height: u64,
	/// Position of the transaction inside its block.
	#[serde(default)]
	pub index: Option<u32>,
}

/// Response of `/cosmos/tx/v1beta1/txs/{hash}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetTxResponse {
	pub tx: TxEnvelope,
	pub tx_response: TxResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxEnvelope {
	pub body: TxBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxBody {
	/// Messages are kept raw: only staking messages are decoded further.
	#[serde(default)]
	pub messages: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxResponse {
	#[serde(deserialize_with = "str_or_num")]
	pub height: u64,
	pub txhash: String,
	#[serde(default)]
	pub code: u32,
	/// RFC3339 block time.
	pub timestamp: String,
}

/// Fields shared by `MsgDelegate` and `MsgUndelegate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingMsg {
	#[serde(rename = "@type")]
	pub type_url: String,
	pub delegator_address: String,
	pub validator_address: String,
	pub amount: Coin,
}

/// Response of `/cosmos/bank/v1beta1/balances/{address}/by_denom`.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
	pub balance: Option<Coin>,
}

/// Error types for node queries
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("HTTP status {status} from {url}: {body}")]
	StatusError {
		status: u16,
		url: String,
		body: String,
	},

	#[error("RPC error {code}: {message}")]
	RpcError { code: i64, message: String },

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

impl NodeError {
	/// Whether retrying the same request may succeed.
	///
	/// Transport failures, timeouts, server errors and rate limiting are transient. Anything
	/// the node understood and rejected is not.
	pub fn is_transient(&self) -> bool {
		match self {
			NodeError::HttpError(e) => {
				e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
			}
			NodeError::StatusError { status, .. } => *status >= 500 || *status == 429,
			NodeError::RpcError { .. } | NodeError::JsonError(_) | NodeError::InvalidResponse(_) => {
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn parses_tx_search_page() {
		let result: TxSearchResult = serde_json::from_value(json!({
			"txs": [
				{"hash": "AB12", "height": "120", "index": 3, "tx": "CgQ="},
				{"hash": "CD34", "height": "121"}
			],
			"total_count": "2"
		}))
		.unwrap();
		assert_eq!(result.total_count, 2);
		assert_eq!(result.txs[0].height, 120);
		assert_eq!(result.txs[0].index, Some(3));
		assert_eq!(result.txs[1].index, None);
	}

	#[test]
	fn parses_rpc_error_envelope() {
		let response: RpcResponse<StatusResult> = serde_json::from_value(json!({
			"jsonrpc": "2.0",
			"id": -1,
			"error": {"code": -32603, "message": "Internal error", "data": "height 5 is not available"}
		}))
		.unwrap();
		assert!(response.result.is_none());
		assert_eq!(response.error.unwrap().code, -32603);
	}

	#[test]
	fn only_server_side_failures_are_transient() {
		let status = |status| NodeError::StatusError {
			status,
			url: "http://node".to_string(),
			body: String::new(),
		};
		assert!(status(503).is_transient());
		assert!(status(429).is_transient());
		assert!(!status(400).is_transient());
		assert!(!status(404).is_transient());
		assert!(
			!NodeError::RpcError {
				code: -32602,
				message: "invalid params".to_string()
			}
			.is_transient()
		);
	}
}
