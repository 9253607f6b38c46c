//!
//! Utility module for the exporter.
//!
//! Re-exports address helpers used by the genesis store and the CLI.
/// Bech32 account address validation
pub mod address;
/// Serde helpers for Cosmos JSON encodings
pub mod json;

pub use address::{AddressCodec, AddressError};
