//! Vesting ledger core.
//!
//! Pure, I/O free building blocks of a reconciliation run:
//!
//! - `schedule`: locked amount of a vesting account at any point in time.
//! - `merger`: deterministic ordering of delegation and undelegation histories.
//! - `reconciler`: the fold that attributes delegated stake to locked or unlocked funds.

/// Event ordering by commit position
pub mod merger;
/// Delegated-vesting / delegated-free bucket fold
pub mod reconciler;
/// Vesting schedule evaluation
pub mod schedule;
/// Accounts, coins and events
pub mod types;

pub use merger::{EventPosition, MergedEvents, OrderingError, merge_events};
pub use reconciler::{Bucket, DelegationSplit, ReconcileError, apply_delegation, apply_undelegation};
pub use schedule::{ScheduleError, locked_coins, validate_schedule};
pub use types::*;
