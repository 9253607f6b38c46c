//! Core data types shared by the schedule, merger and reconciler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single `(denom, amount)` pair in the wire form used by genesis files and the REST API.
///
/// Amounts travel as decimal strings so that 128-bit values survive JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
	pub denom: String,
	pub amount: String,
}

impl Coin {
	pub fn new(denom: impl Into<String>, amount: u128) -> Self {
		Self {
			denom: denom.into(),
			amount: amount.to_string(),
		}
	}

	/// Parse the decimal amount.
	pub fn parse_amount(&self) -> Result<u128, CoinsError> {
		self.amount
			.parse::<u128>()
			.map_err(|_| CoinsError::InvalidAmount {
				denom: self.denom.clone(),
				amount: self.amount.clone(),
			})
	}
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoinsError {
	#[error("invalid amount {amount:?} for denom {denom}")]
	InvalidAmount { denom: String, amount: String },

	#[error("empty denom")]
	EmptyDenom,

	#[error("duplicate denom {0}")]
	DuplicateDenom(String),
}

/// Mapping of asset denom to amount. Zero entries are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coin>", into = "Vec<Coin>")]
pub struct Coins(BTreeMap<String, u128>);

impl Coins {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn single(denom: impl Into<String>, amount: u128) -> Self {
		let mut coins = Self::new();
		coins.set(denom, amount);
		coins
	}

	/// Amount held for `denom`, zero when absent.
	pub fn amount_of(&self, denom: &str) -> u128 {
		self.0.get(denom).copied().unwrap_or_default()
	}

	/// Overwrite the amount for `denom`, dropping the entry when it reaches zero.
	pub fn set(&mut self, denom: impl Into<String>, amount: u128) {
		let denom = denom.into();
		if amount == 0 {
			self.0.remove(&denom);
		} else {
			self.0.insert(denom, amount);
		}
	}

	pub fn checked_add(&self, other: &Coins) -> Option<Coins> {
		let mut sum = self.clone();
		for (denom, amount) in other.iter() {
			let total = sum.amount_of(denom).checked_add(amount)?;
			sum.set(denom, total);
		}
		Some(sum)
	}

	pub fn denoms(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, u128)> {
		self.0.iter().map(|(denom, amount)| (denom.as_str(), *amount))
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl TryFrom<Vec<Coin>> for Coins {
	type Error = CoinsError;

	fn try_from(value: Vec<Coin>) -> Result<Self, Self::Error> {
		let mut coins = Coins::new();
		for coin in value {
			if coin.denom.is_empty() {
				return Err(CoinsError::EmptyDenom);
			}
			if coins.0.contains_key(&coin.denom) {
				return Err(CoinsError::DuplicateDenom(coin.denom));
			}
			let amount = coin.parse_amount()?;
			coins.set(coin.denom, amount);
		}
		Ok(coins)
	}
}

impl From<Coins> for Vec<Coin> {
	fn from(value: Coins) -> Self {
		value
			.0
			.into_iter()
			.map(|(denom, amount)| Coin::new(denom, amount))
			.collect()
	}
}

impl fmt::Display for Coins {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.0.is_empty() {
			return write!(f, "0");
		}
		let parts: Vec<String> = self
			.0
			.iter()
			.map(|(denom, amount)| format!("{}{}", amount, denom))
			.collect();
		write!(f, "{}", parts.join(","))
	}
}

/// One discrete unlock in a periodic schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tranche {
	/// Seconds after the previous tranche (or the schedule start for the first one).
	pub length: u64,
	pub amount: Coins,
}

/// Unlock schedule of a vesting account. Times are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
	/// Linear unlock between `start_time` and `end_time`.
	Continuous { start_time: i64, end_time: i64 },
	/// Everything unlocks at once at `end_time`.
	Delayed { end_time: i64 },
	/// Discrete tranches unlocking at cumulative offsets from `start_time`.
	Periodic {
		start_time: i64,
		end_time: i64,
		tranches: Vec<Tranche>,
	},
}

impl Schedule {
	pub fn kind(&self) -> &'static str {
		match self {
			Schedule::Continuous { .. } => "continuous",
			Schedule::Delayed { .. } => "delayed",
			Schedule::Periodic { .. } => "periodic",
		}
	}
}

/// A vesting account as seen by the reconciler.
///
/// `delegated_vesting` and `delegated_free` are only ever changed by
/// [`crate::vesting::apply_delegation`] and [`crate::vesting::apply_undelegation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VestingAccount {
	pub address: String,
	pub original_vesting: Coins,
	pub schedule: Schedule,
	pub delegated_vesting: Coins,
	pub delegated_free: Coins,
}

impl VestingAccount {
	pub fn new(address: impl Into<String>, original_vesting: Coins, schedule: Schedule) -> Self {
		Self {
			address: address.into(),
			original_vesting,
			schedule,
			delegated_vesting: Coins::new(),
			delegated_free: Coins::new(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
	Delegate,
	Undelegate,
}

impl EventKind {
	/// Protobuf type URL of the message that produces this event.
	pub fn type_url(&self) -> &'static str {
		match self {
			EventKind::Delegate => "/cosmos.staking.v1beta1.MsgDelegate",
			EventKind::Undelegate => "/cosmos.staking.v1beta1.MsgUndelegate",
		}
	}
}

impl fmt::Display for EventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EventKind::Delegate => write!(f, "delegate"),
			EventKind::Undelegate => write!(f, "undelegate"),
		}
	}
}

/// A delegation or undelegation reconstructed from chain history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationEvent {
	pub height: u64,
	/// Position of the transaction inside its block, when the source exposes it.
	pub tx_index: Option<u32>,
	/// Position of the message inside its transaction.
	pub msg_index: u32,
	pub tx_hash: String,
	pub timestamp: DateTime<Utc>,
	pub kind: EventKind,
	pub denom: String,
	pub amount: u128,
}

impl DelegationEvent {
	pub fn coins(&self) -> Coins {
		Coins::single(self.denom.clone(), self.amount)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn coins_drop_zero_entries() {
		let mut coins = Coins::single("udsm", 10);
		coins.set("udsm", 0);
		assert!(coins.is_empty());
		assert_eq!(coins.amount_of("udsm"), 0);
	}

	#[test]
	fn coins_parse_from_wire_form() {
		let coins: Coins = serde_json::from_value(serde_json::json!([
			{"denom": "udsm", "amount": "1000"},
			{"denom": "uatom", "amount": "0"}
		]))
		.unwrap();
		assert_eq!(coins.amount_of("udsm"), 1000);
		assert_eq!(coins.denoms().collect::<Vec<_>>(), vec!["udsm"]);
		assert_eq!(
			serde_json::to_value(&coins).unwrap(),
			serde_json::json!([{"denom": "udsm", "amount": "1000"}])
		);
	}

	#[test]
	fn coins_reject_bad_wire_form() {
		let bad_amount = serde_json::from_value::<Coins>(serde_json::json!([
			{"denom": "udsm", "amount": "-5"}
		]));
		assert!(bad_amount.is_err());

		let duplicated = Coins::try_from(vec![Coin::new("udsm", 1), Coin::new("udsm", 2)]);
		assert_eq!(duplicated, Err(CoinsError::DuplicateDenom("udsm".to_string())));
	}

	#[test]
	fn checked_add_detects_overflow() {
		let a = Coins::single("udsm", u128::MAX);
		assert!(a.checked_add(&Coins::single("udsm", 1)).is_none());
		let sum = a.checked_add(&Coins::single("uatom", 1)).unwrap();
		assert_eq!(sum.to_string(), "1uatom,340282366920938463463374607431768211455udsm");
	}
}
