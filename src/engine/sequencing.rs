//! Route sequencing primitives.
//!
//! Everything here is pure and works on a snapshot of one shift's stops.
//! `sequence_order` values must stay pairwise distinct within a shift, and a
//! relocation's pickup must come before its dropoff; [`verify_ordering`]
//! checks both and every mutating helper runs it before returning.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::move_request::MoveType;
use crate::models::shift::{ShiftStatus, StopEntry, StopType};

/// Where new stops should land on a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InsertionHint {
    /// Directly after the given bin's stop.
    AfterBin { bin_id: Uuid },
    /// Front of the route. On an active route this resolves to the next
    /// waypoint, since the driver cannot go back.
    Start,
    End,
    /// Right after the first stop the driver has not completed yet.
    NextWaypoint,
    #[serde(skip)]
    AtSequence { sequence: i32 },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SequencingError {
    #[error("bin {0} is not on this route")]
    AfterBinMissing(Uuid),

    #[error("sequence {sequence} is used by more than one stop")]
    DuplicateSequence { sequence: i32 },

    #[error("pickup for move request {move_request_id} is not before its dropoff")]
    PickupAfterDropoff { move_request_id: Uuid },

    #[error("ranked tail does not match the stops submitted for ranking")]
    TailMismatch,

    #[error("no sequence numbers left after {sequence}")]
    SequenceOverflow { sequence: i32 },
}

/// `sequence + delta`, or an error once the route runs out of numbers.
pub fn sequence_after(sequence: i32, delta: i32) -> Result<i32, SequencingError> {
    sequence
        .checked_add(delta)
        .ok_or(SequencingError::SequenceOverflow { sequence })
}

/// Stop types generated for one move, in route order.
pub fn waypoint_types(move_type: MoveType) -> &'static [StopType] {
    match move_type {
        MoveType::Store | MoveType::PickupOnly => &[StopType::Pickup],
        MoveType::Relocation => &[StopType::Pickup, StopType::Dropoff],
    }
}

pub fn allocate_waypoints(move_type: MoveType) -> i32 {
    waypoint_types(move_type).len() as i32
}

/// Sequence the first new stop should take.
///
/// With no hint an active route inserts after the next waypoint and any
/// other route appends. An empty route always starts at 1, except that
/// `AfterBin` still fails because the bin cannot be on it.
pub fn find_insertion_index(
    stops: &[StopEntry],
    shift_status: ShiftStatus,
    hint: Option<&InsertionHint>,
) -> Result<i32, SequencingError> {
    let first = stops.iter().map(|stop| stop.sequence_order).min().unwrap_or(1);
    let last = stops.iter().map(|stop| stop.sequence_order).max().unwrap_or(0);
    let active = shift_status == ShiftStatus::Active;
    let next_waypoint = || {
        let current = stops
            .iter()
            .filter(|stop| !stop.is_completed)
            .map(|stop| stop.sequence_order)
            .min()
            .unwrap_or(last);
        sequence_after(current, 1)
    };

    match hint {
        Some(InsertionHint::AfterBin { bin_id }) => {
            let anchor = stops
                .iter()
                .filter(|stop| stop.bin_id == *bin_id)
                .min_by_key(|stop| (stop.is_completed, stop.sequence_order))
                .ok_or(SequencingError::AfterBinMissing(*bin_id))?;
            sequence_after(anchor.sequence_order, 1)
        }
        Some(InsertionHint::AtSequence { sequence }) => Ok(*sequence),
        Some(InsertionHint::Start) if active => next_waypoint(),
        Some(InsertionHint::Start) => Ok(first.min(1)),
        Some(InsertionHint::End) => sequence_after(last, 1),
        Some(InsertionHint::NextWaypoint) => next_waypoint(),
        None if active => next_waypoint(),
        None => sequence_after(last, 1),
    }
}

/// Pushes every stop at or after `from` back by `delta`, opening a gap of
/// `delta` free sequences starting at `from`. Relative order is unchanged.
/// Nothing moves if any stop would run past `i32::MAX`.
pub fn shift_tail(stops: &mut [StopEntry], from: i32, delta: i32) -> Result<(), SequencingError> {
    if let Some(last) = stops
        .iter()
        .map(|stop| stop.sequence_order)
        .filter(|sequence| *sequence >= from)
        .max()
    {
        sequence_after(last, delta)?;
    }

    for stop in stops.iter_mut().filter(|stop| stop.sequence_order >= from) {
        stop.sequence_order += delta;
    }
    Ok(())
}

/// Opens a gap at `index` and places `block` into it in order.
pub fn insert_block(
    stops: &mut Vec<StopEntry>,
    index: i32,
    block: Vec<StopEntry>,
) -> Result<(), SequencingError> {
    let len = block.len() as i32;
    if len > 0 {
        sequence_after(index, len - 1)?;
    }
    shift_tail(stops, index, len)?;

    for (offset, mut stop) in (0..).zip(block) {
        stop.sequence_order = index + offset;
        stops.push(stop);
    }
    stops.sort_by_key(|stop| stop.sequence_order);

    verify_ordering(stops)
}

/// Stops eligible for proximity re-ranking: at or after `from`, not yet
/// completed and not generated by a move request. Sorted by sequence.
pub fn rankable_tail(stops: &[StopEntry], from: i32) -> Vec<&StopEntry> {
    let mut tail: Vec<&StopEntry> = stops
        .iter()
        .filter(|stop| {
            stop.sequence_order >= from && !stop.is_completed && stop.move_request_id.is_none()
        })
        .collect();
    tail.sort_by_key(|stop| stop.sequence_order);
    tail
}

/// Renumbers the rankable tail in `ranked` order, starting at `start` and
/// skipping any sequence still held by a stop outside the tail.
pub fn resequence_tail(
    stops: &mut [StopEntry],
    ranked: &[Uuid],
    start: i32,
) -> Result<(), SequencingError> {
    let tail: HashSet<Uuid> = rankable_tail(stops, start)
        .into_iter()
        .map(|stop| stop.id)
        .collect();
    let ranked_set: HashSet<Uuid> = ranked.iter().copied().collect();
    if ranked.len() != tail.len() || ranked_set != tail {
        return Err(SequencingError::TailMismatch);
    }

    let occupied: HashSet<i32> = stops
        .iter()
        .filter(|stop| !tail.contains(&stop.id))
        .map(|stop| stop.sequence_order)
        .collect();

    let mut next = start;
    let mut assigned: HashMap<Uuid, i32> = HashMap::with_capacity(ranked.len());
    for (position, id) in ranked.iter().enumerate() {
        while occupied.contains(&next) {
            next = sequence_after(next, 1)?;
        }
        assigned.insert(*id, next);
        if position + 1 < ranked.len() {
            next = sequence_after(next, 1)?;
        }
    }

    for stop in stops.iter_mut() {
        if let Some(sequence) = assigned.get(&stop.id) {
            stop.sequence_order = *sequence;
        }
    }
    stops.sort_by_key(|stop| stop.sequence_order);

    verify_ordering(stops)
}

pub fn verify_ordering(stops: &[StopEntry]) -> Result<(), SequencingError> {
    let mut seen = HashSet::with_capacity(stops.len());
    for stop in stops {
        if !seen.insert(stop.sequence_order) {
            return Err(SequencingError::DuplicateSequence {
                sequence: stop.sequence_order,
            });
        }
    }

    let mut pairs: HashMap<Uuid, (Option<i32>, Option<i32>)> = HashMap::new();
    for stop in stops {
        let Some(move_request_id) = stop.move_request_id else {
            continue;
        };
        let entry = pairs.entry(move_request_id).or_default();
        match stop.stop_type {
            StopType::Pickup => entry.0 = Some(stop.sequence_order),
            StopType::Dropoff => entry.1 = Some(stop.sequence_order),
            StopType::Regular => {}
        }
    }

    for (move_request_id, pair) in pairs {
        if let (Some(pickup), Some(dropoff)) = pair {
            if pickup >= dropoff {
                return Err(SequencingError::PickupAfterDropoff { move_request_id });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::*;

    fn stop(sequence: i32, completed: bool) -> StopEntry {
        StopEntry {
            id: Uuid::new_v4(),
            shift_id: Uuid::nil(),
            bin_id: Uuid::new_v4(),
            sequence_order: sequence,
            is_completed: completed,
            stop_type: StopType::Regular,
            move_request_id: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    fn move_stop(move_request_id: Uuid, stop_type: StopType) -> StopEntry {
        StopEntry {
            stop_type,
            move_request_id: Some(move_request_id),
            ..stop(0, false)
        }
    }

    fn sequences(stops: &[StopEntry]) -> Vec<i32> {
        stops.iter().map(|stop| stop.sequence_order).collect()
    }

    #[test]
    fn empty_route_starts_at_one() {
        for status in [ShiftStatus::Active, ShiftStatus::NotStarted] {
            assert_eq!(find_insertion_index(&[], status, None), Ok(1));
            assert_eq!(
                find_insertion_index(&[], status, Some(&InsertionHint::End)),
                Ok(1)
            );
        }
    }

    #[test]
    fn active_route_inserts_after_next_waypoint() {
        let stops = vec![stop(5, true), stop(10, false), stop(20, false)];
        assert_eq!(find_insertion_index(&stops, ShiftStatus::Active, None), Ok(11));
        assert_eq!(
            find_insertion_index(&stops, ShiftStatus::Active, Some(&InsertionHint::Start)),
            Ok(11)
        );
    }

    #[test]
    fn fully_completed_route_appends() {
        let stops = vec![stop(1, true), stop(2, true)];
        assert_eq!(find_insertion_index(&stops, ShiftStatus::Active, None), Ok(3));
    }

    #[test]
    fn future_route_honours_start_and_end() {
        let stops = vec![stop(3, false), stop(7, false)];
        assert_eq!(find_insertion_index(&stops, ShiftStatus::NotStarted, None), Ok(8));
        assert_eq!(
            find_insertion_index(&stops, ShiftStatus::NotStarted, Some(&InsertionHint::Start)),
            Ok(1)
        );
        assert_eq!(
            find_insertion_index(&stops, ShiftStatus::NotStarted, Some(&InsertionHint::End)),
            Ok(8)
        );
    }

    #[test]
    fn after_bin_requires_the_bin_on_route() {
        let stops = vec![stop(1, false), stop(2, false)];
        let target = stops[0].bin_id;
        assert_eq!(
            find_insertion_index(
                &stops,
                ShiftStatus::Paused,
                Some(&InsertionHint::AfterBin { bin_id: target })
            ),
            Ok(2)
        );

        let missing = Uuid::new_v4();
        assert_eq!(
            find_insertion_index(
                &stops,
                ShiftStatus::Paused,
                Some(&InsertionHint::AfterBin { bin_id: missing })
            ),
            Err(SequencingError::AfterBinMissing(missing))
        );
    }

    #[test]
    fn relocation_block_is_contiguous() {
        let move_id = Uuid::new_v4();
        let mut stops = vec![stop(10, false), stop(20, false)];
        let block = vec![
            move_stop(move_id, StopType::Pickup),
            move_stop(move_id, StopType::Dropoff),
        ];

        insert_block(&mut stops, 11, block).unwrap();

        assert_eq!(sequences(&stops), vec![10, 11, 12, 22]);
        assert_eq!(stops[1].stop_type, StopType::Pickup);
        assert_eq!(stops[2].stop_type, StopType::Dropoff);
    }

    #[test]
    fn resequence_skips_slots_held_by_other_stops() {
        let linked = move_stop(Uuid::new_v4(), StopType::Pickup);
        let mut stops = vec![stop(10, false), stop(21, false), stop(30, false)];
        stops.push(StopEntry {
            sequence_order: 12,
            ..linked
        });
        stops.sort_by_key(|stop| stop.sequence_order);

        let far = stops[2].id;
        let near = stops[3].id;
        resequence_tail(&mut stops, &[near, far], 12).unwrap();

        let order: Vec<(Uuid, i32)> = stops.iter().map(|s| (s.id, s.sequence_order)).collect();
        assert!(order.contains(&(near, 13)));
        assert!(order.contains(&(far, 14)));
    }

    #[test]
    fn resequence_rejects_foreign_ids() {
        let mut stops = vec![stop(1, false), stop(2, false)];
        let bogus = Uuid::new_v4();
        assert_eq!(
            resequence_tail(&mut stops, &[bogus], 2),
            Err(SequencingError::TailMismatch)
        );
    }

    #[test]
    fn exhausted_sequence_space_is_an_error() {
        let stops = vec![stop(10, false), stop(i32::MAX, false)];
        let overflow = SequencingError::SequenceOverflow { sequence: i32::MAX };

        assert_eq!(
            find_insertion_index(&stops, ShiftStatus::NotStarted, None),
            Err(overflow.clone())
        );
        assert_eq!(
            find_insertion_index(&stops, ShiftStatus::Paused, Some(&InsertionHint::End)),
            Err(overflow.clone())
        );

        let mut route = stops.clone();
        let block = vec![move_stop(Uuid::new_v4(), StopType::Pickup)];
        assert_eq!(insert_block(&mut route, 11, block), Err(overflow));
        assert_eq!(sequences(&route), vec![10, i32::MAX]);
    }

    #[test]
    fn resequence_stops_at_the_top_of_the_range() {
        let mut stops = vec![stop(i32::MAX - 1, false), stop(i32::MAX, false)];
        let ranked = vec![stops[1].id, stops[0].id];
        resequence_tail(&mut stops, &ranked, i32::MAX - 1).unwrap();
        assert_eq!(stops[0].id, ranked[0]);
    }

    #[test]
    fn verify_catches_duplicates_and_inverted_pairs() {
        assert_eq!(
            verify_ordering(&[stop(4, false), stop(4, true)]),
            Err(SequencingError::DuplicateSequence { sequence: 4 })
        );

        let move_id = Uuid::new_v4();
        let pickup = StopEntry {
            sequence_order: 9,
            ..move_stop(move_id, StopType::Pickup)
        };
        let dropoff = StopEntry {
            sequence_order: 8,
            ..move_stop(move_id, StopType::Dropoff)
        };
        assert_eq!(
            verify_ordering(&[pickup, dropoff]),
            Err(SequencingError::PickupAfterDropoff {
                move_request_id: move_id
            })
        );
    }

    fn route_strategy() -> impl Strategy<Value = Vec<StopEntry>> {
        prop::collection::btree_set(-5i32..200, 0..25).prop_flat_map(|sequences| {
            let len = sequences.len();
            (
                Just(sequences),
                prop::collection::vec(any::<bool>(), len..=len),
            )
                .prop_map(|(sequences, completed)| {
                    sequences
                        .into_iter()
                        .zip(completed)
                        .map(|(sequence, done)| stop(sequence, done))
                        .collect()
                })
        })
    }

    proptest! {
        #[test]
        fn insertion_keeps_sequences_distinct_and_pairs_adjacent(
            mut stops in route_strategy(),
            active in any::<bool>(),
            relocation in any::<bool>(),
        ) {
            let status = if active { ShiftStatus::Active } else { ShiftStatus::NotStarted };
            let move_type = if relocation { MoveType::Relocation } else { MoveType::Store };
            let move_id = Uuid::new_v4();
            let before: Vec<Uuid> = stops.iter().map(|s| s.id).collect();

            let index = find_insertion_index(&stops, status, None).unwrap();
            let block = waypoint_types(move_type)
                .iter()
                .map(|kind| move_stop(move_id, *kind))
                .collect();
            insert_block(&mut stops, index, block).unwrap();

            prop_assert!(verify_ordering(&stops).is_ok());

            let generated: Vec<&StopEntry> = stops
                .iter()
                .filter(|s| s.move_request_id == Some(move_id))
                .collect();
            prop_assert_eq!(generated.len() as i32, allocate_waypoints(move_type));
            prop_assert_eq!(generated[0].sequence_order, index);
            if relocation {
                prop_assert_eq!(generated[1].sequence_order, index + 1);
            }

            let survivors: Vec<Uuid> = stops
                .iter()
                .filter(|s| s.move_request_id.is_none())
                .map(|s| s.id)
                .collect();
            prop_assert_eq!(survivors, before);
        }

        #[test]
        fn shift_tail_preserves_relative_order(
            mut stops in route_strategy(),
            from in -5i32..210,
            delta in 1i32..4,
        ) {
            let before: Vec<Uuid> = stops.iter().map(|s| s.id).collect();
            shift_tail(&mut stops, from, delta).unwrap();
            prop_assert!(verify_ordering(&stops).is_ok());

            let mut after = stops.clone();
            after.sort_by_key(|s| s.sequence_order);
            let after: Vec<Uuid> = after.iter().map(|s| s.id).collect();
            prop_assert_eq!(after, before);
            prop_assert!(
                stops.iter().all(|s| s.sequence_order < from || s.sequence_order >= from + delta)
            );
        }

        #[test]
        fn reversed_tail_resequences_cleanly(mut stops in route_strategy(), start in 0i32..150) {
            let mut ranked: Vec<Uuid> = rankable_tail(&stops, start).iter().map(|s| s.id).collect();
            ranked.reverse();
            resequence_tail(&mut stops, &ranked, start).unwrap();

            prop_assert!(verify_ordering(&stops).is_ok());
            let reordered: Vec<Uuid> = rankable_tail(&stops, start).iter().map(|s| s.id).collect();
            prop_assert_eq!(reordered, ranked);
        }
    }
}
