//! The locked/free bucket fold.
//!
//! A delegation first claims whatever locked balance is not yet backing earlier delegations,
//! and attributes the rest to unlocked funds. An undelegation releases unlocked-backed stake
//! first and only then locked-backed stake. Each call either applies every asset of the
//! event or leaves the account untouched.

use crate::vesting::schedule::{ScheduleError, locked_coins};
use crate::vesting::types::{Coins, VestingAccount};
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
	DelegatedVesting,
	DelegatedFree,
}

impl fmt::Display for Bucket {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Bucket::DelegatedVesting => write!(f, "delegated_vesting"),
			Bucket::DelegatedFree => write!(f, "delegated_free"),
		}
	}
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReconcileError {
	#[error("schedule error: {0}")]
	Schedule(#[from] ScheduleError),

	#[error("{bucket} of {denom} would underflow: holds {held}, release needs {requested}")]
	BucketUnderflow {
		bucket: Bucket,
		denom: String,
		held: u128,
		requested: u128,
	},

	#[error("{bucket} of {denom} would overflow")]
	BucketOverflow { bucket: Bucket, denom: String },

	#[error("zero amount for {0}")]
	ZeroAmount(String),
}

/// How a single delegation was attributed, per asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegationSplit {
	pub locked: Coins,
	pub free: Coins,
}

/// Track a delegation of `amount` made at `timestamp`.
///
/// The split depends only on the schedule and the current buckets, never on the account's
/// spendable balance.
pub fn apply_delegation(
	account: &mut VestingAccount,
	timestamp: DateTime<Utc>,
	amount: &Coins,
) -> Result<DelegationSplit, ReconcileError> {
	if amount.is_empty() {
		return Err(ReconcileError::ZeroAmount("delegation".to_string()));
	}

	let locked_now = locked_coins(
		&account.schedule,
		&account.original_vesting,
		timestamp.timestamp(),
	)?;

	let mut delegated_vesting = account.delegated_vesting.clone();
	let mut delegated_free = account.delegated_free.clone();
	let mut split = DelegationSplit::default();

	for (denom, requested) in amount.iter() {
		let current_vesting = delegated_vesting.amount_of(denom);
		let headroom = locked_now.amount_of(denom).saturating_sub(current_vesting);
		let locked_portion = headroom.min(requested);
		let free_portion = requested - locked_portion;

		let new_vesting = current_vesting.checked_add(locked_portion).ok_or_else(|| {
			ReconcileError::BucketOverflow {
				bucket: Bucket::DelegatedVesting,
				denom: denom.to_string(),
			}
		})?;
		let new_free = delegated_free
			.amount_of(denom)
			.checked_add(free_portion)
			.ok_or_else(|| ReconcileError::BucketOverflow {
				bucket: Bucket::DelegatedFree,
				denom: denom.to_string(),
			})?;

		delegated_vesting.set(denom, new_vesting);
		delegated_free.set(denom, new_free);
		split.locked.set(denom, locked_portion);
		split.free.set(denom, free_portion);
	}

	account.delegated_vesting = delegated_vesting;
	account.delegated_free = delegated_free;
	Ok(split)
}

/// Track an undelegation of `amount`, releasing free-backed stake before vesting-backed stake.
pub fn apply_undelegation(
	account: &mut VestingAccount,
	amount: &Coins,
) -> Result<(), ReconcileError> {
	if amount.is_empty() {
		return Err(ReconcileError::ZeroAmount("undelegation".to_string()));
	}

	let mut delegated_vesting = account.delegated_vesting.clone();
	let mut delegated_free = account.delegated_free.clone();

	for (denom, requested) in amount.iter() {
		let free = delegated_free.amount_of(denom);
		let unlocked_release = free.min(requested);
		delegated_free.set(denom, free - unlocked_release);

		let locked_release = requested - unlocked_release;
		let vesting = delegated_vesting.amount_of(denom);
		let remaining =
			vesting
				.checked_sub(locked_release)
				.ok_or_else(|| ReconcileError::BucketUnderflow {
					bucket: Bucket::DelegatedVesting,
					denom: denom.to_string(),
					held: vesting,
					requested: locked_release,
				})?;
		delegated_vesting.set(denom, remaining);
	}

	account.delegated_vesting = delegated_vesting;
	account.delegated_free = delegated_free;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::vesting::types::Schedule;
	use chrono::TimeZone;

	fn at(seconds: i64) -> DateTime<Utc> {
		Utc.timestamp_opt(seconds, 0).unwrap()
	}

	fn account() -> VestingAccount {
		VestingAccount::new(
			"desmos1test",
			Coins::single("udsm", 1000),
			Schedule::Continuous {
				start_time: 0,
				end_time: 100,
			},
		)
	}

	#[test]
	fn replays_the_reference_history() {
		let mut account = account();

		apply_delegation(&mut account, at(50), &Coins::single("udsm", 300)).unwrap();
		assert_eq!(account.delegated_vesting.amount_of("udsm"), 300);
		assert_eq!(account.delegated_free.amount_of("udsm"), 0);

		apply_delegation(&mut account, at(80), &Coins::single("udsm", 400)).unwrap();
		assert_eq!(account.delegated_vesting.amount_of("udsm"), 300);
		assert_eq!(account.delegated_free.amount_of("udsm"), 400);

		apply_undelegation(&mut account, &Coins::single("udsm", 500)).unwrap();
		assert_eq!(account.delegated_vesting.amount_of("udsm"), 200);
		assert_eq!(account.delegated_free.amount_of("udsm"), 0);
	}

	#[test]
	fn split_conserves_the_delegated_amount() {
		let mut account = account();
		for (t, amount) in [(10, 450), (30, 400), (60, 123), (99, 7), (150, 1000)] {
			let split =
				apply_delegation(&mut account, at(t), &Coins::single("udsm", amount))
					.unwrap();
			assert_eq!(
				split.locked.amount_of("udsm") + split.free.amount_of("udsm"),
				amount,
				"at t={}",
				t
			);
		}
	}

	#[test]
	fn delegation_partially_claims_locked_headroom() {
		let mut account = account();
		let split =
			apply_delegation(&mut account, at(50), &Coins::single("udsm", 800)).unwrap();
		assert_eq!(split.locked.amount_of("udsm"), 500);
		assert_eq!(split.free.amount_of("udsm"), 300);
	}

	#[test]
	fn unknown_denoms_are_fully_free() {
		let mut account = account();
		apply_delegation(&mut account, at(10), &Coins::single("uatom", 10)).unwrap();
		assert_eq!(account.delegated_free.amount_of("uatom"), 10);
		assert!(account.delegated_vesting.is_empty());
	}

	#[test]
	fn undelegation_on_empty_buckets_underflows() {
		let mut account = account();
		let err = apply_undelegation(&mut account, &Coins::single("udsm", 1)).unwrap_err();
		assert_eq!(
			err,
			ReconcileError::BucketUnderflow {
				bucket: Bucket::DelegatedVesting,
				denom: "udsm".to_string(),
				held: 0,
				requested: 1,
			}
		);
		assert!(account.delegated_free.is_empty());
		assert!(account.delegated_vesting.is_empty());
	}

	#[test]
	fn failed_events_leave_the_account_untouched() {
		let mut account = account();
		apply_delegation(&mut account, at(50), &Coins::single("udsm", 300)).unwrap();
		let before = account.clone();

		let mut amount = Coins::single("udsm", 100);
		amount.set("uatom", 5);
		assert!(apply_undelegation(&mut account, &amount).is_err());
		assert_eq!(account, before);
	}

	#[test]
	fn empty_amounts_are_rejected() {
		let mut account = account();
		assert!(matches!(
			apply_delegation(&mut account, at(1), &Coins::new()),
			Err(ReconcileError::ZeroAmount(_))
		));
		assert!(matches!(
			apply_undelegation(&mut account, &Coins::new()),
			Err(ReconcileError::ZeroAmount(_))
		));
	}

	#[test]
	fn malformed_schedule_aborts_delegation() {
		let mut account = account();
		account.schedule = Schedule::Continuous {
			start_time: 100,
			end_time: 0,
		};
		assert!(matches!(
			apply_delegation(&mut account, at(1), &Coins::single("udsm", 1)),
			Err(ReconcileError::Schedule(ScheduleError::EndBeforeStart { .. }))
		));
	}
}
