use serde::{Deserialize, Deserializer};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrNum<T> {
	Str(String),
	Num(T),
}

/// Cosmos and Tendermint encode 64-bit integers as JSON strings; accept both forms.
pub fn str_or_num<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: FromStr + Deserialize<'de>,
	T::Err: Display,
{
	match StrOrNum::<T>::deserialize(deserializer)? {
		StrOrNum::Str(s) => s.parse::<T>().map_err(serde::de::Error::custom),
		StrOrNum::Num(n) => Ok(n),
	}
}
