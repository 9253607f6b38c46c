//! Vesting account state sync.
//!
//! Rebuilds the `delegated_vesting` and `delegated_free` buckets of every vesting account in a
//! Cosmos SDK genesis by replaying the accounts' delegation history from a full node, and
//! exports the repaired `x/auth` genesis state.

pub mod config;
pub mod export;
pub mod genesis;
pub mod node;
pub mod utils;
pub mod vesting;
