//! JSON shapes of the `x/auth` genesis state and its vesting accounts.
//!
//! Only the fields the reconciler needs are decoded. Accounts are otherwise carried as raw
//! JSON so that an export reproduces every field it did not touch.

use crate::utils::AddressCodec;
use crate::utils::json::str_or_num;
use crate::vesting::{Coins, Schedule, Tranche, VestingAccount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::GenesisError;

pub const CONTINUOUS_VESTING_ACCOUNT: &str = "/cosmos.vesting.v1beta1.ContinuousVestingAccount";
pub const DELAYED_VESTING_ACCOUNT: &str = "/cosmos.vesting.v1beta1.DelayedVestingAccount";
pub const PERIODIC_VESTING_ACCOUNT: &str = "/cosmos.vesting.v1beta1.PeriodicVestingAccount";

/// The `app_state.auth` section of a genesis file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthGenesis {
	#[serde(default)]
	pub params: serde_json::Value,
	#[serde(default)]
	pub accounts: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct BaseAccountJson {
	address: String,
}

#[derive(Debug, Deserialize)]
struct BaseVestingAccountJson {
	base_account: BaseAccountJson,
	#[serde(default)]
	original_vesting: Coins,
	#[serde(default)]
	delegated_free: Coins,
	#[serde(default)]
	delegated_vesting: Coins,
	#[serde(deserialize_with = "str_or_num")]
	end_time: i64,
}

#[derive(Debug, Deserialize)]
struct ContinuousJson {
	base_vesting_account: BaseVestingAccountJson,
	#[serde(deserialize_with = "str_or_num")]
	start_time: i64,
}

#[derive(Debug, Deserialize)]
struct DelayedJson {
	base_vesting_account: BaseVestingAccountJson,
}

#[derive(Debug, Deserialize)]
struct PeriodJson {
	#[serde(deserialize_with = "str_or_num")]
	length: u64,
	#[serde(default)]
	amount: Coins,
}

#[derive(Debug, Deserialize)]
struct PeriodicJson {
	base_vesting_account: BaseVestingAccountJson,
	#[serde(deserialize_with = "str_or_num")]
	start_time: i64,
	#[serde(default)]
	vesting_periods: Vec<PeriodJson>,
}

fn type_url(account: &serde_json::Value) -> Option<&str> {
	account.get("@type").and_then(|t| t.as_str())
}

pub fn is_vesting_account(account: &serde_json::Value) -> bool {
	matches!(
		type_url(account),
		Some(CONTINUOUS_VESTING_ACCOUNT | DELAYED_VESTING_ACCOUNT | PERIODIC_VESTING_ACCOUNT)
	)
}

/// Decode a raw vesting account entry.
pub fn parse_vesting_account(
	account: &serde_json::Value,
	codec: &AddressCodec,
) -> Result<VestingAccount, GenesisError> {
	let (base, schedule) = match type_url(account) {
		Some(CONTINUOUS_VESTING_ACCOUNT) => {
			let parsed: ContinuousJson = serde_json::from_value(account.clone())?;
			let end_time = parsed.base_vesting_account.end_time;
			(
				parsed.base_vesting_account,
				Schedule::Continuous {
					start_time: parsed.start_time,
					end_time,
				},
			)
		}
		Some(DELAYED_VESTING_ACCOUNT) => {
			let parsed: DelayedJson = serde_json::from_value(account.clone())?;
			let end_time = parsed.base_vesting_account.end_time;
			(parsed.base_vesting_account, Schedule::Delayed { end_time })
		}
		Some(PERIODIC_VESTING_ACCOUNT) => {
			let parsed: PeriodicJson = serde_json::from_value(account.clone())?;
			let end_time = parsed.base_vesting_account.end_time;
			let tranches = parsed
				.vesting_periods
				.into_iter()
				.map(|period| Tranche {
					length: period.length,
					amount: period.amount,
				})
				.collect();
			(
				parsed.base_vesting_account,
				Schedule::Periodic {
					start_time: parsed.start_time,
					end_time,
					tranches,
				},
			)
		}
		other => {
			return Err(GenesisError::UnsupportedAccount(
				other.unwrap_or("<missing @type>").to_string(),
			));
		}
	};

	codec.validate(&base.base_account.address)?;

	Ok(VestingAccount {
		address: base.base_account.address,
		original_vesting: base.original_vesting,
		schedule,
		delegated_vesting: base.delegated_vesting,
		delegated_free: base.delegated_free,
	})
}

impl AuthGenesis {
	/// Every vesting account of the genesis state, in file order.
	pub fn vesting_accounts(&self, codec: &AddressCodec) -> Result<Vec<VestingAccount>, GenesisError> {
		self.accounts
			.iter()
			.filter(|account| is_vesting_account(account))
			.map(|account| parse_vesting_account(account, codec))
			.collect()
	}

	/// Overwrite the delegation buckets of the given accounts, leaving everything else as is.
	///
	/// Returns the number of genesis entries updated.
	pub fn apply_buckets(&mut self, reconciled: &[VestingAccount]) -> Result<usize, GenesisError> {
		let by_address: HashMap<&str, &VestingAccount> = reconciled
			.iter()
			.map(|account| (account.address.as_str(), account))
			.collect();

		let mut updated = 0;
		for raw in self.accounts.iter_mut().filter(|a| is_vesting_account(a)) {
			let base = raw
				.get_mut("base_vesting_account")
				.and_then(|b| b.as_object_mut())
				.ok_or_else(|| {
					GenesisError::Malformed("vesting account without base_vesting_account".to_string())
				})?;
			let address = base
				.get("base_account")
				.and_then(|b| b.get("address"))
				.and_then(|a| a.as_str())
				.unwrap_or_default()
				.to_string();

			if let Some(account) = by_address.get(address.as_str()) {
				base.insert(
					"delegated_free".to_string(),
					serde_json::to_value(&account.delegated_free)?,
				);
				base.insert(
					"delegated_vesting".to_string(),
					serde_json::to_value(&account.delegated_vesting)?,
				);
				updated += 1;
			}
		}
		Ok(updated)
	}
}
