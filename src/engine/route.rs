//! Route mutations performed inside an open transaction.
//!
//! These helpers are the only code that adds or removes move-generated
//! stops, and they keep `Shift::total_bins` in step with the stop rows.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::ranking::RankCandidate;
use crate::engine::sequencing::{
    find_insertion_index, insert_block, rankable_tail, resequence_tail, waypoint_types,
    InsertionHint,
};
use crate::error::AppError;
use crate::models::move_request::MoveRequest;
use crate::models::shift::{ShiftStatus, StopEntry};
use crate::state::AppState;
use crate::store::Tables;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPolicy {
    /// Re-rank the untouched tail by proximity when the shift is active.
    Reoptimize,
    Keep,
}

#[derive(Debug, Clone, Copy)]
pub struct Insertion {
    pub shift_id: Uuid,
    pub index: i32,
    pub waypoints: i32,
}

/// Picks the shift a move should go to. An explicit id must exist; without
/// one, the newest active shift wins, then the newest paused shift.
pub fn select_shift(
    tables: &Tables,
    explicit: Option<Uuid>,
    driver_id: Option<Uuid>,
) -> Result<Uuid, AppError> {
    if let Some(shift_id) = explicit {
        return tables.shift(shift_id).map(|shift| shift.id);
    }

    tables
        .shifts
        .values()
        .filter(|shift| matches!(shift.status, ShiftStatus::Active | ShiftStatus::Paused))
        .filter(|shift| driver_id.is_none_or(|driver| shift.driver_id == driver))
        .max_by_key(|shift| (shift.status == ShiftStatus::Active, shift.created_at))
        .map(|shift| shift.id)
        .ok_or_else(|| AppError::NotFound("no active or paused shift available".to_string()))
}

/// Inserts the move's waypoints into `shift_id` and bumps the shift's bin
/// counter. Any error leaves the caller's transaction to be dropped.
pub async fn insert_into_shift(
    tables: &mut Tables,
    state: &AppState,
    request: &MoveRequest,
    shift_id: Uuid,
    hint: Option<&InsertionHint>,
    tail: TailPolicy,
) -> Result<Insertion, AppError> {
    let shift = tables.shift(shift_id)?.clone();
    if shift.status == ShiftStatus::Completed {
        return Err(AppError::Conflict(format!(
            "shift {shift_id} is already completed"
        )));
    }

    let mut stops = tables.stops_for_shift(shift_id);
    let index = find_insertion_index(&stops, shift.status, hint)?;

    let now = Utc::now();
    let block: Vec<StopEntry> = waypoint_types(request.move_type)
        .iter()
        .map(|stop_type| StopEntry {
            id: Uuid::new_v4(),
            shift_id,
            bin_id: request.bin_id,
            sequence_order: index,
            is_completed: false,
            stop_type: *stop_type,
            move_request_id: Some(request.id),
            completed_at: None,
            created_at: now,
        })
        .collect();
    let waypoints = block.len() as i32;

    insert_block(&mut stops, index, block)?;

    if shift.status == ShiftStatus::Active && tail == TailPolicy::Reoptimize {
        let tail_start = index.saturating_add(waypoints);
        reoptimize_tail(tables, state, &mut stops, tail_start, request).await?;
    }

    tables.replace_shift_stops(shift_id, stops);
    let shift = tables.shift_mut(shift_id)?;
    shift.total_bins += waypoints as u32;
    shift.updated_at = now;

    info!(
        move_request_id = %request.id,
        shift_id = %shift_id,
        index,
        waypoints,
        "move inserted into route"
    );

    Ok(Insertion {
        shift_id,
        index,
        waypoints,
    })
}

async fn reoptimize_tail(
    tables: &Tables,
    state: &AppState,
    stops: &mut [StopEntry],
    start: i32,
    request: &MoveRequest,
) -> Result<(), AppError> {
    let Some(anchor) = request.anchor_location() else {
        debug!(move_request_id = %request.id, "no anchor coordinates; tail left as is");
        return Ok(());
    };

    let candidates: Vec<RankCandidate> = rankable_tail(stops, start)
        .into_iter()
        .map(|stop| RankCandidate {
            stop_id: stop.id,
            location: tables.bins.get(&stop.bin_id).and_then(|bin| bin.location),
        })
        .collect();
    if candidates.is_empty() {
        return Ok(());
    }

    let ranked = tokio::time::timeout(
        state.settings.ranking_timeout,
        state.ranker.rank(candidates, anchor),
    )
    .await
    .map_err(|_| AppError::Collaborator("proximity ranking timed out".to_string()))??;

    resequence_tail(stops, &ranked, start)?;
    Ok(())
}

/// Deletes the move's stops from `shift_id` and decrements its counters.
/// Returns the removed rows in route order.
pub fn remove_from_shift(
    tables: &mut Tables,
    move_request_id: Uuid,
    shift_id: Uuid,
) -> Result<Vec<StopEntry>, AppError> {
    let removed = tables.remove_stops_for_move(move_request_id);
    let completed = removed.iter().filter(|stop| stop.is_completed).count() as u32;

    let shift = tables.shift_mut(shift_id)?;
    shift.total_bins = shift.total_bins.saturating_sub(removed.len() as u32);
    shift.completed_bins = shift.completed_bins.saturating_sub(completed);
    shift.updated_at = Utc::now();

    debug!(
        move_request_id = %move_request_id,
        shift_id = %shift_id,
        removed = removed.len(),
        "move removed from route"
    );
    Ok(removed)
}
