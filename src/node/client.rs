//!
//! HTTP client for a Cosmos SDK full node.
//!
//! Transaction search and the latest height come from the Tendermint RPC endpoint, decoded
//! transactions and historical balances from the Cosmos REST endpoint. Every request is
//! retried with exponential backoff while the failure is transient.

use super::ChainSource;
use super::types::*;
use crate::config::NodeConfig;
use crate::vesting::{DelegationEvent, EventKind};
use async_trait::async_trait;
use backoff::{ExponentialBackoff, future::retry};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Header selecting the state height of a Cosmos REST query.
const HEIGHT_HEADER: &str = "x-cosmos-block-height";

/// Cosmos full node client
#[derive(Clone)]
pub struct NodeClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Tendermint RPC base URL.
	rpc_url: String,
	/// Cosmos REST base URL.
	api_url: String,
	/// Results requested per `tx_search` page.
	page_size: u32,
	/// Retry budget of a single request.
	max_retry_elapsed: Duration,
}

impl NodeClient {
	/// Create a new node client from the `node` config section.
	pub fn new(config: &NodeConfig) -> Result<Self, NodeError> {
		let http_client = Client::builder().timeout(config.timeout()).build()?;

		Ok(Self {
			http_client,
			rpc_url: config.rpc_address.trim_end_matches('/').to_string(),
			api_url: config.api_address.trim_end_matches('/').to_string(),
			page_size: config.page_size,
			max_retry_elapsed: config.max_retry_elapsed(),
		})
	}

	fn backoff(&self) -> ExponentialBackoff {
		ExponentialBackoff {
			max_elapsed_time: Some(self.max_retry_elapsed),
			..ExponentialBackoff::default()
		}
	}

	/// GET `url` and decode the JSON body, retrying transient failures.
	async fn get_json<T: DeserializeOwned>(
		&self,
		url: &str,
		query: &[(&str, String)],
		height: Option<u64>,
	) -> Result<T, NodeError> {
		retry(self.backoff(), || async {
			let mut request = self.http_client.get(url).query(query);
			if let Some(height) = height {
				request = request.header(HEIGHT_HEADER, height.to_string());
			}

			let response = request.send().await.map_err(|e| classify(e.into()))?;
			let status = response.status();
			let body = response.text().await.map_err(|e| classify(e.into()))?;

			if !status.is_success() {
				return Err(classify(NodeError::StatusError {
					status: status.as_u16(),
					url: url.to_string(),
					body,
				}));
			}

			serde_json::from_str::<T>(&body)
				.map_err(|e| backoff::Error::permanent(NodeError::JsonError(e)))
		})
		.await
	}

	/// Call a Tendermint RPC method and unwrap its JSON-RPC envelope.
	async fn rpc<T: DeserializeOwned>(
		&self,
		method: &str,
		query: &[(&str, String)],
	) -> Result<T, NodeError> {
		let url = format!("{}/{}", self.rpc_url, method);
		let envelope: RpcResponse<T> = self.get_json(&url, query, None).await?;

		if let Some(error) = envelope.error {
			return Err(NodeError::RpcError {
				code: error.code,
				message: match error.data {
					Some(data) => format!("{}: {}", error.message, data),
					None => error.message,
				},
			});
		}
		envelope
			.result
			.ok_or_else(|| NodeError::InvalidResponse(format!("{} returned no result", method)))
	}

	/// All transactions sent by `address` containing a message of `kind`, up to `max_height`.
	pub async fn search_txs(
		&self,
		address: &str,
		kind: EventKind,
		max_height: u64,
	) -> Result<Vec<TxSearchItem>, NodeError> {
		let query = format!(
			"\"message.action='{}' AND message.sender='{}' AND tx.height<={}\"",
			kind.type_url(),
			address,
			max_height
		);

		let mut items = Vec::new();
		let mut page = 1u32;
		loop {
			let result: TxSearchResult = self
				.rpc(
					"tx_search",
					&[
						("query", query.clone()),
						("page", page.to_string()),
						("per_page", self.page_size.to_string()),
						("order_by", "\"asc\"".to_string()),
					],
				)
				.await?;

			let received = result.txs.len();
			items.extend(result.txs);
			debug!(
				"tx_search page {} for {} {}: {} of {} txs",
				page,
				kind,
				address,
				items.len(),
				result.total_count
			);

			if received == 0 || items.len() as u64 >= result.total_count {
				break;
			}
			page += 1;
		}

		Ok(items)
	}

	/// Fetch a decoded transaction by hash.
	pub async fn get_tx(&self, hash: &str) -> Result<GetTxResponse, NodeError> {
		let url = format!("{}/cosmos/tx/v1beta1/txs/{}", self.api_url, hash);
		self.get_json(&url, &[], None).await
	}
}

#[async_trait]
impl ChainSource for NodeClient {
	async fn latest_height(&self) -> Result<u64, NodeError> {
		let status: StatusResult = self.rpc("status", &[]).await?;
		Ok(status.sync_info.latest_block_height)
	}

	async fn find_events(
		&self,
		address: &str,
		kind: EventKind,
		max_height: u64,
	) -> Result<Vec<DelegationEvent>, NodeError> {
		let mut events = Vec::new();
		for item in self.search_txs(address, kind, max_height).await? {
			let hash = normalize_hash(&item.hash)?;
			let tx = self.get_tx(&hash).await?;
			if tx.tx_response.code != 0 {
				debug!("Skipping failed tx {} (code {})", hash, tx.tx_response.code);
				continue;
			}
			events.extend(events_from_tx(&tx, &item, address, kind)?);
		}
		Ok(events)
	}

	async fn fetch_balance(
		&self,
		address: &str,
		denom: &str,
		height: u64,
	) -> Result<u128, NodeError> {
		let url = format!(
			"{}/cosmos/bank/v1beta1/balances/{}/by_denom",
			self.api_url, address
		);
		let response: BalanceResponse = self
			.get_json(&url, &[("denom", denom.to_string())], Some(height))
			.await?;

		match response.balance {
			Some(coin) => coin
				.parse_amount()
				.map_err(|e| NodeError::InvalidResponse(e.to_string())),
			None => Ok(0),
		}
	}
}

fn classify(error: NodeError) -> backoff::Error<NodeError> {
	if error.is_transient() {
		warn!("Transient node error, retrying: {}", error);
		backoff::Error::transient(error)
	} else {
		backoff::Error::permanent(error)
	}
}

/// Upper-case hex form of a transaction hash, as the REST endpoint expects it.
fn normalize_hash(hash: &str) -> Result<String, NodeError> {
	let bytes = hex::decode(hash)
		.map_err(|e| NodeError::InvalidResponse(format!("bad tx hash {}: {}", hash, e)))?;
	Ok(hex::encode_upper(bytes))
}

/// Extract the `kind` messages sent by `address` from a decoded transaction.
pub(crate) fn events_from_tx(
	tx: &GetTxResponse,
	item: &TxSearchItem,
	address: &str,
	kind: EventKind,
) -> Result<Vec<DelegationEvent>, NodeError> {
	let timestamp = DateTime::parse_from_rfc3339(&tx.tx_response.timestamp)
		.map_err(|e| {
			NodeError::InvalidResponse(format!(
				"bad timestamp {:?} in tx {}: {}",
				tx.tx_response.timestamp, tx.tx_response.txhash, e
			))
		})?
		.with_timezone(&Utc);

	let mut events = Vec::new();
	for (msg_index, raw) in tx.tx.body.messages.iter().enumerate() {
		if raw.get("@type").and_then(|t| t.as_str()) != Some(kind.type_url()) {
			continue;
		}

		let msg: StakingMsg = serde_json::from_value(raw.clone())?;
		if msg.delegator_address != address {
			continue;
		}

		let amount = msg
			.amount
			.parse_amount()
			.map_err(|e| NodeError::InvalidResponse(e.to_string()))?;
		events.push(DelegationEvent {
			height: item.height,
			tx_index: item.index,
			msg_index: msg_index as u32,
			tx_hash: tx.tx_response.txhash.clone(),
			timestamp,
			kind,
			denom: msg.amount.denom.clone(),
			amount,
		});
	}
	Ok(events)
}
