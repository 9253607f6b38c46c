//! Merging of separately fetched delegation and undelegation histories.
//!
//! Events are ordered by their commit position `(height, tx index, message index)`. Event
//! kind and source list never influence the order, and an event without a within-block
//! position is rejected instead of being placed arbitrarily.

use crate::vesting::types::DelegationEvent;
use itertools::Itertools;
use std::fmt;

/// Exact commit position of an event on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventPosition {
	pub height: u64,
	pub tx_index: u32,
	pub msg_index: u32,
}

impl fmt::Display for EventPosition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}/{}", self.height, self.tx_index, self.msg_index)
	}
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OrderingError {
	#[error("{kind} event in tx {tx_hash} at height {height} has no within-block position")]
	MissingSequence {
		height: u64,
		kind: String,
		tx_hash: String,
	},

	#[error("events in tx {first_tx} and tx {second_tx} share position {position}")]
	DuplicatePosition {
		position: EventPosition,
		first_tx: String,
		second_tx: String,
	},
}

impl DelegationEvent {
	pub fn position(&self) -> Result<EventPosition, OrderingError> {
		let tx_index = self.tx_index.ok_or_else(|| OrderingError::MissingSequence {
			height: self.height,
			kind: self.kind.to_string(),
			tx_hash: self.tx_hash.clone(),
		})?;
		Ok(EventPosition {
			height: self.height,
			tx_index,
			msg_index: self.msg_index,
		})
	}
}

/// Single-pass iterator over events in commit order.
#[derive(Debug)]
pub struct MergedEvents {
	inner: std::vec::IntoIter<DelegationEvent>,
}

impl Iterator for MergedEvents {
	type Item = DelegationEvent;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next()
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.inner.size_hint()
	}
}

impl ExactSizeIterator for MergedEvents {}

/// Combine both histories into one stream ordered by commit position.
pub fn merge_events(
	delegations: Vec<DelegationEvent>,
	undelegations: Vec<DelegationEvent>,
) -> Result<MergedEvents, OrderingError> {
	let keyed = delegations
		.into_iter()
		.chain(undelegations)
		.map(|event| event.position().map(|position| (position, event)))
		.collect::<Result<Vec<_>, _>>()?;

	// stable, so equal keys would keep input order; duplicates are rejected below anyway
	let sorted = keyed
		.into_iter()
		.sorted_by_key(|(position, _)| *position)
		.collect_vec();

	if let Some(((position, first), (_, second))) = sorted
		.iter()
		.tuple_windows()
		.find(|((a, _), (b, _))| a == b)
	{
		return Err(OrderingError::DuplicatePosition {
			position: *position,
			first_tx: first.tx_hash.clone(),
			second_tx: second.tx_hash.clone(),
		});
	}

	Ok(MergedEvents {
		inner: sorted
			.into_iter()
			.map(|(_, event)| event)
			.collect_vec()
			.into_iter(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::vesting::types::EventKind;
	use chrono::{TimeZone, Utc};

	fn event(kind: EventKind, height: u64, tx_index: Option<u32>, msg_index: u32) -> DelegationEvent {
		DelegationEvent {
			height,
			tx_index,
			msg_index,
			tx_hash: format!("{}-{:?}-{}", height, tx_index, msg_index),
			timestamp: Utc.timestamp_opt(height as i64 * 6, 0).unwrap(),
			kind,
			denom: "udsm".to_string(),
			amount: 1,
		}
	}

	fn positions(events: MergedEvents) -> Vec<(u64, u32, u32, EventKind)> {
		events
			.map(|e| (e.height, e.tx_index.unwrap(), e.msg_index, e.kind))
			.collect()
	}

	#[test]
	fn orders_by_height_then_commit_position() {
		let delegations = vec![
			event(EventKind::Delegate, 20, Some(3), 0),
			event(EventKind::Delegate, 10, Some(0), 0),
			event(EventKind::Delegate, 20, Some(1), 1),
		];
		let undelegations = vec![
			event(EventKind::Undelegate, 20, Some(1), 0),
			event(EventKind::Undelegate, 15, Some(7), 0),
		];

		let merged = merge_events(delegations, undelegations).unwrap();
		assert_eq!(merged.len(), 5);
		assert_eq!(
			positions(merged),
			vec![
				(10, 0, 0, EventKind::Delegate),
				(15, 7, 0, EventKind::Undelegate),
				(20, 1, 0, EventKind::Undelegate),
				(20, 1, 1, EventKind::Delegate),
				(20, 3, 0, EventKind::Delegate),
			]
		);
	}

	#[test]
	fn merging_is_deterministic() {
		let delegations = vec![
			event(EventKind::Delegate, 5, Some(2), 0),
			event(EventKind::Delegate, 5, Some(0), 0),
		];
		let undelegations = vec![event(EventKind::Undelegate, 5, Some(1), 0)];

		let first = positions(merge_events(delegations.clone(), undelegations.clone()).unwrap());
		let swapped = positions(merge_events(
			delegations.iter().rev().cloned().collect(),
			undelegations.clone(),
		)
		.unwrap());
		assert_eq!(first, swapped);
		assert_eq!(first, positions(merge_events(delegations, undelegations).unwrap()));
	}

	#[test]
	fn missing_tx_index_is_an_error() {
		let err = merge_events(
			vec![event(EventKind::Delegate, 5, Some(0), 0)],
			vec![event(EventKind::Undelegate, 5, None, 0)],
		)
		.unwrap_err();
		assert!(matches!(err, OrderingError::MissingSequence { height: 5, .. }));
	}

	#[test]
	fn duplicate_positions_are_an_error() {
		let err = merge_events(
			vec![event(EventKind::Delegate, 9, Some(4), 0)],
			vec![event(EventKind::Undelegate, 9, Some(4), 0)],
		)
		.unwrap_err();
		assert!(matches!(
			err,
			OrderingError::DuplicatePosition {
				position: EventPosition {
					height: 9,
					tx_index: 4,
					msg_index: 0
				},
				..
			}
		));
	}

	#[test]
	fn empty_histories_merge_to_nothing() {
		assert_eq!(merge_events(vec![], vec![]).unwrap().count(), 0);
	}
}
