use super::{ChainSource, NodeError};
use crate::vesting::{DelegationEvent, EventKind};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::trace;

/// `ChainSource` decorator caching `(address, denom, height)` balance lookups.
///
/// Balances at a committed height never change, so cached values stay valid for the
/// lifetime of the process. Other queries pass straight through.
pub struct CachedChainSource<S> {
	inner: S,
	balances: Mutex<HashMap<(String, String, u64), u128>>,
}

impl<S: ChainSource> CachedChainSource<S> {
	pub fn new(inner: S) -> Self {
		Self {
			inner,
			balances: Mutex::new(HashMap::new()),
		}
	}

	/// Number of cached balance entries.
	pub async fn cached_balances(&self) -> usize {
		self.balances.lock().await.len()
	}
}

#[async_trait::async_trait]
impl<S: ChainSource> ChainSource for CachedChainSource<S> {
	async fn latest_height(&self) -> Result<u64, NodeError> {
		self.inner.latest_height().await
	}

	async fn find_events(
		&self,
		address: &str,
		kind: EventKind,
		max_height: u64,
	) -> Result<Vec<DelegationEvent>, NodeError> {
		self.inner.find_events(address, kind, max_height).await
	}

	async fn fetch_balance(
		&self,
		address: &str,
		denom: &str,
		height: u64,
	) -> Result<u128, NodeError> {
		let key = (address.to_string(), denom.to_string(), height);
		if let Some(balance) = self.balances.lock().await.get(&key) {
			trace!("Balance cache hit for {} {} at {}", address, denom, height);
			return Ok(*balance);
		}

		// not held across the query; a concurrent miss just fetches twice
		let balance = self.inner.fetch_balance(address, denom, height).await?;
		self.balances.lock().await.insert(key, balance);
		Ok(balance)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Default)]
	struct CountingSource {
		balance_calls: AtomicUsize,
	}

	#[async_trait::async_trait]
	impl ChainSource for CountingSource {
		async fn latest_height(&self) -> Result<u64, NodeError> {
			Ok(1)
		}

		async fn find_events(
			&self,
			_address: &str,
			_kind: EventKind,
			_max_height: u64,
		) -> Result<Vec<DelegationEvent>, NodeError> {
			Ok(vec![])
		}

		async fn fetch_balance(
			&self,
			_address: &str,
			_denom: &str,
			height: u64,
		) -> Result<u128, NodeError> {
			self.balance_calls.fetch_add(1, Ordering::SeqCst);
			Ok(height as u128 * 10)
		}
	}

	#[tokio::test]
	async fn repeated_lookups_hit_the_cache() {
		let cached = CachedChainSource::new(CountingSource::default());

		assert_eq!(cached.fetch_balance("a", "udsm", 5).await.unwrap(), 50);
		assert_eq!(cached.fetch_balance("a", "udsm", 5).await.unwrap(), 50);
		assert_eq!(cached.fetch_balance("a", "udsm", 6).await.unwrap(), 60);
		assert_eq!(cached.fetch_balance("b", "udsm", 5).await.unwrap(), 50);

		assert_eq!(cached.inner.balance_calls.load(Ordering::SeqCst), 3);
		assert_eq!(cached.cached_balances().await, 3);
	}
}
