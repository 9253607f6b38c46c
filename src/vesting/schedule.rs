//! Evaluation of vesting schedules at arbitrary points in time.
//!
//! Every function here is pure: the same schedule, original vesting and timestamp always
//! produce the same locked amount. Replaying history depends on this, since each event is
//! evaluated at its own block time rather than at "now".

use crate::vesting::types::{Coins, Schedule, Tranche};

/// Malformed schedule parameters.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
	#[error("end time {end_time} is before start time {start_time}")]
	EndBeforeStart { start_time: i64, end_time: i64 },

	#[error("periodic schedule has no tranches")]
	NoTranches,

	#[error("periodic tranches end at {computed_end}, schedule declares {end_time}")]
	EndTimeMismatch { computed_end: i64, end_time: i64 },

	#[error("tranches unlock {actual} {denom}, original vesting is {expected}")]
	TrancheSumMismatch {
		denom: String,
		expected: u128,
		actual: u128,
	},

	#[error("schedule arithmetic overflow")]
	Overflow,
}

/// Check the schedule parameters against the account's original vesting.
pub fn validate_schedule(schedule: &Schedule, original_vesting: &Coins) -> Result<(), ScheduleError> {
	match schedule {
		Schedule::Continuous {
			start_time,
			end_time,
		} => check_bounds(*start_time, *end_time),
		Schedule::Delayed { .. } => Ok(()),
		Schedule::Periodic {
			start_time,
			end_time,
			tranches,
		} => {
			check_bounds(*start_time, *end_time)?;
			if tranches.is_empty() {
				return Err(ScheduleError::NoTranches);
			}

			let unlock_times = tranche_unlock_times(*start_time, tranches)?;
			let computed_end = unlock_times.last().copied().unwrap_or(*start_time);
			if computed_end != *end_time {
				return Err(ScheduleError::EndTimeMismatch {
					computed_end,
					end_time: *end_time,
				});
			}

			let mut total = Coins::new();
			for tranche in tranches {
				total = total
					.checked_add(&tranche.amount)
					.ok_or(ScheduleError::Overflow)?;
			}
			let denoms = total
				.denoms()
				.chain(original_vesting.denoms())
				.map(str::to_string)
				.collect::<std::collections::BTreeSet<_>>();
			for denom in denoms {
				let expected = original_vesting.amount_of(&denom);
				let actual = total.amount_of(&denom);
				if expected != actual {
					return Err(ScheduleError::TrancheSumMismatch {
						denom,
						expected,
						actual,
					});
				}
			}
			Ok(())
		}
	}
}

/// Amount of `original_vesting` still locked at `time` (Unix seconds).
///
/// Before (or at) the schedule start everything is locked, at or after the end nothing is.
/// The result never increases as `time` grows.
pub fn locked_coins(
	schedule: &Schedule,
	original_vesting: &Coins,
	time: i64,
) -> Result<Coins, ScheduleError> {
	validate_schedule(schedule, original_vesting)?;

	match schedule {
		Schedule::Continuous {
			start_time,
			end_time,
		} => {
			if time <= *start_time {
				return Ok(original_vesting.clone());
			}
			if time >= *end_time {
				return Ok(Coins::new());
			}

			// start < time < end, so both spans are positive
			let elapsed = time.checked_sub(*start_time).ok_or(ScheduleError::Overflow)? as u128;
			let duration = end_time
				.checked_sub(*start_time)
				.ok_or(ScheduleError::Overflow)? as u128;
			let mut locked = Coins::new();
			for (denom, original) in original_vesting.iter() {
				let vested = mul_div_floor(original, elapsed, duration);
				locked.set(denom, original - vested);
			}
			Ok(locked)
		}
		Schedule::Delayed { end_time } => {
			if time < *end_time {
				Ok(original_vesting.clone())
			} else {
				Ok(Coins::new())
			}
		}
		Schedule::Periodic {
			start_time,
			tranches,
			..
		} => {
			if time <= *start_time {
				return Ok(original_vesting.clone());
			}

			let mut locked = original_vesting.clone();
			let unlock_times = tranche_unlock_times(*start_time, tranches)?;
			for (tranche, unlock_time) in tranches.iter().zip(unlock_times) {
				if unlock_time > time {
					break;
				}
				for (denom, amount) in tranche.amount.iter() {
					let remaining = locked
						.amount_of(denom)
						.checked_sub(amount)
						.ok_or(ScheduleError::Overflow)?;
					locked.set(denom, remaining);
				}
			}
			Ok(locked)
		}
	}
}

fn check_bounds(start_time: i64, end_time: i64) -> Result<(), ScheduleError> {
	if end_time < start_time {
		return Err(ScheduleError::EndBeforeStart {
			start_time,
			end_time,
		});
	}
	Ok(())
}

/// Absolute unlock time of every tranche, in sequence order.
fn tranche_unlock_times(start_time: i64, tranches: &[Tranche]) -> Result<Vec<i64>, ScheduleError> {
	let mut current = start_time;
	let mut times = Vec::with_capacity(tranches.len());
	for tranche in tranches {
		let length = i64::try_from(tranche.length).map_err(|_| ScheduleError::Overflow)?;
		current = current.checked_add(length).ok_or(ScheduleError::Overflow)?;
		times.push(current);
	}
	Ok(times)
}

/// `floor(value * numerator / denominator)` for `numerator <= denominator`, without overflow.
fn mul_div_floor(value: u128, numerator: u128, denominator: u128) -> u128 {
	let whole = value / denominator;
	let rest = value % denominator;
	// rest < denominator <= 2^64 and numerator < 2^64
	whole * numerator + rest * numerator / denominator
}
