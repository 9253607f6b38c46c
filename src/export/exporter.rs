//! Reconciliation driver for a single vesting account.
//!
//! The `VestingExporter` resolves the height ceiling, fetches the account's delegation and
//! undelegation history through a `ChainSource`, orders it and folds every event into a copy
//! of the account. The caller's account is never modified; a failure anywhere discards the
//! partially folded copy.

use crate::export::{EventError, ExportError};
use crate::node::{ChainSource, NodeError};
use crate::vesting::{
	DelegationEvent, EventKind, VestingAccount, apply_delegation, apply_undelegation,
	merge_events, validate_schedule,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub struct VestingExporter<S> {
	source: S,
	/// Explicit height ceiling; zero means the latest committed height.
	limit_height: u64,
}

impl<S: ChainSource> VestingExporter<S> {
	pub fn new(source: S) -> Self {
		Self {
			source,
			limit_height: 0,
		}
	}

	/// Use `height` as the ceiling for transaction queries. Zero selects the latest height.
	pub fn with_limit_height(mut self, height: u64) -> Self {
		self.limit_height = height;
		self
	}

	pub fn source(&self) -> &S {
		&self.source
	}

	/// The height ceiling to query transactions up to.
	pub async fn resolve_height(&self) -> Result<u64, NodeError> {
		if self.limit_height != 0 {
			return Ok(self.limit_height);
		}
		self.source.latest_height().await
	}

	/// Resolve the ceiling and replay the account's full history.
	pub async fn reconcile(&self, account: &VestingAccount) -> Result<VestingAccount, ExportError> {
		let height = self
			.resolve_height()
			.await
			.map_err(|e| ExportError::Node {
				address: account.address.clone(),
				source: e,
			})?;
		self.fix_vesting_account(account, height).await
	}

	/// Replay every delegation and undelegation of `account` committed at or below `max_height`.
	pub async fn fix_vesting_account(
		&self,
		account: &VestingAccount,
		max_height: u64,
	) -> Result<VestingAccount, ExportError> {
		let address = account.address.as_str();
		validate_schedule(&account.schedule, &account.original_vesting).map_err(|e| {
			ExportError::Schedule {
				address: address.to_string(),
				source: e,
			}
		})?;

		let node_error = |e: NodeError| ExportError::Node {
			address: address.to_string(),
			source: e,
		};
		let delegations = self
			.source
			.find_events(address, EventKind::Delegate, max_height)
			.await
			.map_err(node_error)?;
		let undelegations = self
			.source
			.find_events(address, EventKind::Undelegate, max_height)
			.await
			.map_err(node_error)?;

		let events: Vec<DelegationEvent> = merge_events(delegations, undelegations)
			.map_err(|e| ExportError::Ordering {
				address: address.to_string(),
				source: e,
			})?
			.collect();
		let block_delegations = delegated_per_block(&events);

		debug!(
			"Replaying {} events for {} up to height {}",
			events.len(),
			address,
			max_height
		);

		let mut fixed = account.clone();
		for event in &events {
			let delegated_in_block = block_delegations
				.get(&(event.height, event.denom.as_str()))
				.copied()
				.unwrap_or_default();
			self.apply_event(&mut fixed, event, delegated_in_block)
				.await
				.map_err(|source| ExportError::Event {
					address: address.to_string(),
					height: event.height,
					kind: event.kind,
					denom: event.denom.clone(),
					tx_hash: event.tx_hash.clone(),
					source,
				})?;
		}

		info!(
			"Fixed {} ({} schedule, {} events): delegated_vesting={} delegated_free={}",
			address,
			fixed.schedule.kind(),
			events.len(),
			fixed.delegated_vesting,
			fixed.delegated_free
		);
		Ok(fixed)
	}

	async fn apply_event(
		&self,
		account: &mut VestingAccount,
		event: &DelegationEvent,
		delegated_in_block: u128,
	) -> Result<(), EventError> {
		let amount = event.coins();
		match event.kind {
			EventKind::Delegate => {
				self.check_balance(&account.address, event, delegated_in_block)
					.await?;
				let split = apply_delegation(account, event.timestamp, &amount)?;
				debug!(
					"height {}: delegate {} -> vesting {} free {}",
					event.height, amount, split.locked, split.free
				);
			}
			EventKind::Undelegate => {
				apply_undelegation(account, &amount)?;
				debug!("height {}: undelegate {}", event.height, amount);
			}
		}
		Ok(())
	}

	/// Warn about a delegation the account could not have funded.
	///
	/// Only block boundaries are queryable, so the holdings right before the event lie
	/// between the balance before its block and the balance after it plus everything the
	/// account delegated in that block. Same-block transfers make anything stricter wrong.
	async fn check_balance(
		&self,
		address: &str,
		event: &DelegationEvent,
		delegated_in_block: u128,
	) -> Result<(), NodeError> {
		// height 0 would select the latest state
		let before = self
			.source
			.fetch_balance(address, &event.denom, event.height.saturating_sub(1).max(1))
			.await?;
		if event.amount <= before {
			return Ok(());
		}

		let after = self
			.source
			.fetch_balance(address, &event.denom, event.height)
			.await?;
		let bound = after.saturating_add(delegated_in_block);
		if event.amount > bound {
			warn!(
				"{} delegated {}{} at height {} (tx {}) but held {} before the block and at most {} within it",
				address, event.amount, event.denom, event.height, event.tx_hash, before, bound
			);
		}
		Ok(())
	}
}

/// Total delegated per `(height, denom)`.
fn delegated_per_block(events: &[DelegationEvent]) -> HashMap<(u64, &str), u128> {
	let mut totals = HashMap::new();
	for event in events.iter().filter(|e| e.kind == EventKind::Delegate) {
		let total: &mut u128 = totals
			.entry((event.height, event.denom.as_str()))
			.or_default();
		*total = total.saturating_add(event.amount);
	}
	totals
}
