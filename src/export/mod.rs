//! Vesting account export
//!
//! This module drives reconciliation runs against a `ChainSource`:
//!
//! - `exporter`: replays one account's delegation history into fresh buckets.
//! - `batch`: runs the exporter over many accounts with bounded concurrency and shutdown support.
//! - `progress`: counts and periodically logs batch outcomes.

/// Bounded-concurrency batch runner
pub mod batch;
/// Single account reconciliation driver
pub mod exporter;
/// Batch progress tracking
pub mod progress;

pub use batch::{AccountOutcome, AccountReport, BatchReport, export_accounts};
pub use exporter::VestingExporter;
pub use progress::{BatchProgress, BatchStats};

use crate::node::NodeError;
use crate::vesting::{EventKind, OrderingError, ReconcileError, ScheduleError};

/// Failure of one account's reconciliation. Always names the account.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
	#[error("account {address}: invalid vesting schedule: {source}")]
	Schedule {
		address: String,
		source: ScheduleError,
	},

	#[error("account {address}: node query failed: {source}")]
	Node { address: String, source: NodeError },

	#[error("account {address}: cannot order history: {source}")]
	Ordering {
		address: String,
		source: OrderingError,
	},

	#[error("account {address}: {kind} of {denom} at height {height} (tx {tx_hash}): {source}")]
	Event {
		address: String,
		height: u64,
		kind: EventKind,
		denom: String,
		tx_hash: String,
		source: EventError,
	},
}

/// Failure while applying one event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
	#[error(transparent)]
	Reconcile(#[from] ReconcileError),

	#[error("balance lookup failed: {0}")]
	BalanceLookup(#[from] NodeError),
}

impl ExportError {
	pub fn address(&self) -> &str {
		match self {
			ExportError::Schedule { address, .. }
			| ExportError::Node { address, .. }
			| ExportError::Ordering { address, .. }
			| ExportError::Event { address, .. } => address,
		}
	}
}

#[cfg(test)]
pub(crate) mod testing {
	//! In-memory `ChainSource` for driver and batch tests.

	use crate::node::{ChainSource, NodeError};
	use crate::vesting::{DelegationEvent, EventKind};
	use chrono::{TimeZone, Utc};
	use std::sync::Mutex;

	/// Build an event for `desmos1account`-style tests; `time` is the block time in seconds.
	pub fn event(kind: EventKind, height: u64, tx_index: u32, time: i64, amount: u128) -> DelegationEvent {
		DelegationEvent {
			height,
			tx_index: Some(tx_index),
			msg_index: 0,
			tx_hash: format!("{:X}{:02X}", height, tx_index),
			timestamp: Utc.timestamp_opt(time, 0).unwrap(),
			kind,
			denom: "udsm".to_string(),
			amount,
		}
	}

	pub struct MemoryChain {
		latest: u64,
		balance: u128,
		/// `(from_height, balance)` steps overriding `balance`
		balance_steps: Vec<(u64, u128)>,
		failing: bool,
		failing_balances: bool,
		events: Vec<(Option<String>, DelegationEvent)>,
		balance_queries: Mutex<Vec<(String, String, u64)>>,
	}

	impl MemoryChain {
		pub fn new(latest: u64) -> Self {
			Self {
				latest,
				balance: u128::MAX,
				balance_steps: Vec::new(),
				failing: false,
				failing_balances: false,
				events: Vec::new(),
				balance_queries: Mutex::new(Vec::new()),
			}
		}

		/// Event visible to every address.
		pub fn with_event(mut self, event: DelegationEvent) -> Self {
			self.events.push((None, event));
			self
		}

		/// Event visible only to `address`.
		pub fn with_event_for(mut self, address: &str, event: DelegationEvent) -> Self {
			self.events.push((Some(address.to_string()), event));
			self
		}

		pub fn with_balance(mut self, balance: u128) -> Self {
			self.balance = balance;
			self
		}

		/// Holdings of `balance` from `height` on.
		pub fn with_balance_from(mut self, height: u64, balance: u128) -> Self {
			self.balance_steps.push((height, balance));
			self.balance_steps.sort_by_key(|(from, _)| *from);
			self
		}

		pub fn failing(mut self) -> Self {
			self.failing = true;
			self
		}

		pub fn failing_balances(mut self) -> Self {
			self.failing_balances = true;
			self
		}

		pub fn balance_queries(&self) -> Vec<(String, String, u64)> {
			self.balance_queries.lock().unwrap().clone()
		}
	}

	#[async_trait::async_trait]
	impl ChainSource for MemoryChain {
		async fn latest_height(&self) -> Result<u64, NodeError> {
			Ok(self.latest)
		}

		async fn find_events(
			&self,
			address: &str,
			kind: EventKind,
			max_height: u64,
		) -> Result<Vec<DelegationEvent>, NodeError> {
			if self.failing {
				return Err(NodeError::InvalidResponse("node unavailable".to_string()));
			}
			Ok(self
				.events
				.iter()
				.filter(|(owner, e)| {
					owner.as_deref().is_none_or(|owner| owner == address)
						&& e.kind == kind
						&& e.height <= max_height
				})
				.map(|(_, e)| e.clone())
				.collect())
		}

		async fn fetch_balance(
			&self,
			address: &str,
			denom: &str,
			height: u64,
		) -> Result<u128, NodeError> {
			self.balance_queries
				.lock()
				.unwrap()
				.push((address.to_string(), denom.to_string(), height));
			if self.failing_balances {
				return Err(NodeError::InvalidResponse("balance unavailable".to_string()));
			}
			Ok(self
				.balance_steps
				.iter()
				.rev()
				.find(|(from, _)| *from <= height)
				.map_or(self.balance, |(_, balance)| *balance))
		}
	}
}
