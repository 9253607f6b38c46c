//! Progress tracking for batch exports.
//!
//! `BatchProgress` counts account outcomes as the batch runner reports them and logs a line
//! every few accounts so that long exports against a remote node stay observable.

use tracing::{info, warn};

/// Number of finished accounts between two progress lines.
const LOG_INTERVAL: usize = 25;

#[derive(Debug, Clone)]
pub struct BatchProgress {
	total: usize,
	reconciled: usize,
	failed: usize,
	cancelled: usize,
	/// Finished count at the last progress line
	last_logged: usize,
}

impl BatchProgress {
	pub fn new(total: usize) -> Self {
		Self {
			total,
			reconciled: 0,
			failed: 0,
			cancelled: 0,
			last_logged: 0,
		}
	}

	pub fn record_reconciled(&mut self) {
		self.reconciled += 1;
		self.log_progress(false);
	}

	pub fn record_failed(&mut self, address: &str) {
		self.failed += 1;
		warn!("Account {} failed ({} failures so far)", address, self.failed);
		self.log_progress(false);
	}

	pub fn record_cancelled(&mut self) {
		self.cancelled += 1;
	}

	pub fn finished(&self) -> usize {
		self.reconciled + self.failed + self.cancelled
	}

	/// Log progress every `LOG_INTERVAL` accounts, or immediately when forced.
	pub fn log_progress(&mut self, force: bool) {
		let finished = self.finished();
		let should_log = force || finished.saturating_sub(self.last_logged) >= LOG_INTERVAL;

		if should_log && finished > 0 {
			info!(
				"Export progress: {}/{} accounts ({} reconciled, {} failed, {} cancelled)",
				finished, self.total, self.reconciled, self.failed, self.cancelled
			);
			self.last_logged = finished;
		}
	}

	pub fn get_stats(&self) -> BatchStats {
		BatchStats {
			total: self.total,
			reconciled: self.reconciled,
			failed: self.failed,
			cancelled: self.cancelled,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStats {
	pub total: usize,
	pub reconciled: usize,
	pub failed: usize,
	pub cancelled: usize,
}

impl BatchStats {
	pub fn summary(&self) -> String {
		format!(
			"{} accounts: {} reconciled, {} failed{}",
			self.total,
			self.reconciled,
			self.failed,
			if self.cancelled == 0 {
				String::new()
			} else {
				format!(", {} cancelled", self.cancelled)
			}
		)
	}
}
