use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressError {
	#[error("address {address} is not valid bech32: {reason}")]
	InvalidEncoding { address: String, reason: String },
	#[error("address {address} has prefix {found}, expected {expected}")]
	PrefixMismatch {
		address: String,
		found: String,
		expected: String,
	},
	#[error("address {0} has an empty payload")]
	EmptyPayload(String),
}

/// Validates account addresses against the chain's configured bech32 prefix.
#[derive(Debug, Clone)]
pub struct AddressCodec {
	prefix: String,
}

impl AddressCodec {
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
		}
	}

	/// Decode `address` and return its payload bytes.
	pub fn decode(&self, address: &str) -> Result<Vec<u8>, AddressError> {
		let (hrp, data) = bech32::decode(address).map_err(|e| AddressError::InvalidEncoding {
			address: address.to_string(),
			reason: e.to_string(),
		})?;
		if hrp.as_str() != self.prefix {
			return Err(AddressError::PrefixMismatch {
				address: address.to_string(),
				found: hrp.as_str().to_string(),
				expected: self.prefix.clone(),
			});
		}
		if data.is_empty() {
			return Err(AddressError::EmptyPayload(address.to_string()));
		}
		Ok(data)
	}

	pub fn validate(&self, address: &str) -> Result<(), AddressError> {
		self.decode(address).map(|_| ())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bech32::{Bech32, Hrp};

	fn encode(prefix: &str, data: &[u8]) -> String {
		bech32::encode::<Bech32>(Hrp::parse(prefix).expect("Failed while bech32 parsing"), data)
			.expect("Failed while bech32 encoding")
	}

	#[test]
	fn test_decode() {
		let codec = AddressCodec::new("desmos");
		let address = encode("desmos", &[1, 2, 3]);
		assert_eq!(codec.decode(&address).unwrap(), vec![1u8, 2u8, 3u8]);
	}

	#[test]
	fn test_prefix_mismatch() {
		let codec = AddressCodec::new("desmos");
		let address = encode("cosmos", &[7; 20]);
		assert!(matches!(
			codec.validate(&address),
			Err(AddressError::PrefixMismatch { .. })
		));
	}

	#[test]
	fn test_garbage() {
		let codec = AddressCodec::new("desmos");
		assert!(matches!(
			codec.validate("desmos1notanaddress"),
			Err(AddressError::InvalidEncoding { .. })
		));
	}
}
