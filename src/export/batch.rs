//! Batch reconciliation of many vesting accounts.
//!
//! Accounts are independent: they are reconciled concurrently, a failure is recorded against
//! its account only, and the shutdown signal stops new accounts from starting while in-flight
//! folds run to completion.

use super::progress::{BatchProgress, BatchStats};
use super::{ExportError, VestingExporter};
use crate::node::ChainSource;
use crate::vesting::VestingAccount;
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{Instrument, info, info_span};

#[derive(Debug)]
pub enum AccountOutcome {
	Reconciled(VestingAccount),
	Failed(ExportError),
	/// Never started because the batch was shut down.
	Cancelled,
}

#[derive(Debug)]
pub struct AccountReport {
	pub address: String,
	pub outcome: AccountOutcome,
}

/// Per-account outcomes of one export run, in input order.
#[derive(Debug)]
pub struct BatchReport {
	/// Height ceiling every account was reconciled against
	pub height: u64,
	pub reports: Vec<AccountReport>,
	pub stats: BatchStats,
}

impl BatchReport {
	pub fn succeeded(&self) -> usize {
		self.stats.reconciled
	}

	pub fn failed(&self) -> usize {
		self.stats.failed
	}

	pub fn cancelled(&self) -> usize {
		self.stats.cancelled
	}

	/// True when every account was reconciled.
	pub fn is_complete(&self) -> bool {
		self.succeeded() == self.reports.len()
	}

	pub fn failures(&self) -> impl Iterator<Item = &ExportError> {
		self.reports.iter().filter_map(|report| match &report.outcome {
			AccountOutcome::Failed(e) => Some(e),
			_ => None,
		})
	}

	pub fn reconciled_accounts(&self) -> Vec<VestingAccount> {
		self.reports
			.iter()
			.filter_map(|report| match &report.outcome {
				AccountOutcome::Reconciled(account) => Some(account.clone()),
				_ => None,
			})
			.collect()
	}
}

/// Reconcile `accounts` against `height` with at most `concurrency` accounts in flight.
pub async fn export_accounts<S: ChainSource>(
	exporter: &VestingExporter<S>,
	accounts: &[VestingAccount],
	height: u64,
	concurrency: usize,
	shutdown: watch::Receiver<bool>,
) -> BatchReport {
	info!(
		"Exporting {} vesting accounts at height {} ({} concurrent)",
		accounts.len(),
		height,
		concurrency
	);
	let mut progress = BatchProgress::new(accounts.len());

	let mut reports: Vec<(usize, AccountReport)> = futures::stream::iter(accounts.iter().enumerate())
		.map(|(position, account)| {
			let shutdown = shutdown.clone();
			async move {
				let outcome = if *shutdown.borrow() {
					AccountOutcome::Cancelled
				} else {
					let span = info_span!("account", address = %account.address);
					match exporter
						.fix_vesting_account(account, height)
						.instrument(span)
						.await
					{
						Ok(fixed) => AccountOutcome::Reconciled(fixed),
						Err(e) => AccountOutcome::Failed(e),
					}
				};
				let report = AccountReport {
					address: account.address.clone(),
					outcome,
				};
				(position, report)
			}
		})
		.buffer_unordered(concurrency.max(1))
		.inspect(|(_, report)| match &report.outcome {
			AccountOutcome::Reconciled(_) => progress.record_reconciled(),
			AccountOutcome::Failed(e) => progress.record_failed(e.address()),
			AccountOutcome::Cancelled => progress.record_cancelled(),
		})
		.collect()
		.await;

	reports.sort_by_key(|(position, _)| *position);
	progress.log_progress(true);

	BatchReport {
		height,
		reports: reports.into_iter().map(|(_, report)| report).collect(),
		stats: progress.get_stats(),
	}
}
