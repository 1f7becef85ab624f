use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::instrumented;
use crate::engine::route::{insert_into_shift, remove_from_shift, select_shift, TailPolicy};
use crate::engine::sequencing::InsertionHint;
use crate::engine::views::{move_request_view, MoveRequestView};
use crate::error::AppError;
use crate::models::bin::{BinMoveRecord, BinStatus};
use crate::models::history::HistoryKind;
use crate::models::move_request::{
    derive_status, Assignment, DisposalAction, MoveRequest, MoveStatus, MoveType,
};
use crate::models::user::Actor;
use crate::notify::fanout;
use crate::state::AppState;
use crate::store::Tables;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignToShift {
    pub shift_id: Option<Uuid>,
    /// Limits automatic shift selection to this driver's shifts.
    pub driver_id: Option<Uuid>,
    pub insertion_hint: Option<InsertionHint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignToUser {
    pub user_id: Uuid,
}

/// Display name of whoever currently holds the request, for error messages.
pub(crate) fn holder_name(tables: &Tables, assignment: &Assignment) -> String {
    let user_id = match *assignment {
        Assignment::None => return "nobody".to_string(),
        Assignment::Shift { shift_id } => match tables.shifts.get(&shift_id) {
            Some(shift) => shift.driver_id,
            None => return format!("shift {shift_id}"),
        },
        Assignment::Manual { user_id } => user_id,
    };

    tables
        .users
        .get(&user_id)
        .map(|user| user.name.clone())
        .unwrap_or_else(|| format!("user {user_id}"))
}

fn ensure_open(request: &MoveRequest) -> Result<(), AppError> {
    if request.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "move request {} is {:?} and can no longer change",
            request.id, request.status
        )));
    }
    Ok(())
}

fn assigned_kind(before: &Assignment) -> HistoryKind {
    if before.is_assigned() {
        HistoryKind::Reassigned
    } else {
        HistoryKind::Assigned
    }
}

pub async fn assign_to_shift(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    input: AssignToShift,
) -> Result<MoveRequestView, AppError> {
    instrumented(state, "assign_to_shift", async {
        let mut tx = state.store.begin().await;
        let before = tx.move_request(id)?.clone();
        ensure_open(&before)?;

        let shift_id = select_shift(&tx, input.shift_id, input.driver_id)?;

        if let Some(old_shift) = before.assignment.shift_id() {
            remove_from_shift(&mut tx, id, old_shift)?;
        }
        insert_into_shift(
            &mut tx,
            state,
            &before,
            shift_id,
            input.insertion_hint.as_ref(),
            TailPolicy::Reoptimize,
        )
        .await?;

        let shift_status = tx.shift(shift_id)?.status;
        let now = Utc::now();
        let request = tx.move_request_mut(id)?;
        request.assignment = Assignment::Shift { shift_id };
        request.status = derive_status(&request.assignment, Some(shift_status));
        request.updated_at = now;
        let after = request.clone();

        let view = move_request_view(&tx, &after, now, state.settings.urgency);
        tx.commit();

        info!(move_request_id = %id, shift_id = %shift_id, status = ?after.status, "move assigned to shift");

        fanout::assignment_changed(state, &before.assignment, &view).await;
        fanout::notify_operators(state, &view);
        fanout::record_history(state, actor, assigned_kind(&before.assignment), Some(&before), &after)
            .await;

        Ok(view)
    })
    .await
}

pub async fn assign_to_user(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    input: AssignToUser,
) -> Result<MoveRequestView, AppError> {
    instrumented(state, "assign_to_user", async {
        let mut tx = state.store.begin().await;
        let before = tx.move_request(id)?.clone();
        ensure_open(&before)?;
        tx.user(input.user_id)?;

        let target = Assignment::Manual {
            user_id: input.user_id,
        };
        let now = Utc::now();
        if before.assignment == target {
            return Ok(move_request_view(&tx, &before, now, state.settings.urgency));
        }

        if let Some(old_shift) = before.assignment.shift_id() {
            remove_from_shift(&mut tx, id, old_shift)?;
        }

        let request = tx.move_request_mut(id)?;
        request.assignment = target;
        request.status = MoveStatus::Assigned;
        request.updated_at = now;
        let after = request.clone();

        let view = move_request_view(&tx, &after, now, state.settings.urgency);
        tx.commit();

        info!(move_request_id = %id, user_id = %input.user_id, "move assigned to user");

        fanout::assignment_changed(state, &before.assignment, &view).await;
        fanout::notify_operators(state, &view);
        fanout::record_history(state, actor, assigned_kind(&before.assignment), Some(&before), &after)
            .await;

        Ok(view)
    })
    .await
}

/// Clears the assignment. Calling it on an unassigned request succeeds
/// without changing anything.
pub async fn unassign(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
) -> Result<MoveRequestView, AppError> {
    instrumented(state, "unassign", async {
        let mut tx = state.store.begin().await;
        let before = tx.move_request(id)?.clone();
        ensure_open(&before)?;

        let now = Utc::now();
        if !before.assignment.is_assigned() {
            return Ok(move_request_view(&tx, &before, now, state.settings.urgency));
        }
        if before.status == MoveStatus::InProgress {
            return Err(AppError::Guardrail(format!(
                "move request {id} is in progress on {}'s route; edit it with an \
                 in_progress_action of remove_from_route instead",
                holder_name(&tx, &before.assignment)
            )));
        }

        if let Some(old_shift) = before.assignment.shift_id() {
            remove_from_shift(&mut tx, id, old_shift)?;
        }

        let request = tx.move_request_mut(id)?;
        request.assignment = Assignment::None;
        request.status = MoveStatus::Pending;
        request.updated_at = now;
        let after = request.clone();

        let view = move_request_view(&tx, &after, now, state.settings.urgency);
        tx.commit();

        info!(move_request_id = %id, "move unassigned");

        fanout::assignment_changed(state, &before.assignment, &view).await;
        fanout::notify_operators(state, &view);
        fanout::record_history(state, actor, HistoryKind::Unassigned, Some(&before), &after).await;

        Ok(view)
    })
    .await
}

pub async fn cancel(state: &AppState, actor: &Actor, id: Uuid) -> Result<MoveRequestView, AppError> {
    instrumented(state, "cancel", async {
        let mut tx = state.store.begin().await;
        let before = tx.move_request(id)?.clone();
        ensure_open(&before)?;

        if let Some(old_shift) = before.assignment.shift_id() {
            remove_from_shift(&mut tx, id, old_shift)?;
        }

        let now = Utc::now();
        let bin = tx.bin_mut(before.bin_id)?;
        if bin.status == BinStatus::PendingMove {
            bin.status = BinStatus::Active;
            bin.updated_at = now;
        }

        let request = tx.move_request_mut(id)?;
        request.status = MoveStatus::Cancelled;
        request.assignment = Assignment::None;
        request.updated_at = now;
        let after = request.clone();

        let view = move_request_view(&tx, &after, now, state.settings.urgency);
        tx.commit();

        info!(move_request_id = %id, "move cancelled");

        fanout::move_cancelled(state, &before.assignment, id).await;
        fanout::notify_operators(state, &view);
        fanout::record_history(state, actor, HistoryKind::Cancelled, Some(&before), &after).await;

        Ok(view)
    })
    .await
}

/// Completes a manually assigned move and applies its effect to the bin.
pub async fn complete_manually(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
) -> Result<MoveRequestView, AppError> {
    instrumented(state, "complete_manually", async {
        let mut tx = state.store.begin().await;
        let before = tx.move_request(id)?.clone();
        ensure_open(&before)?;

        if !matches!(before.assignment, Assignment::Manual { .. }) {
            return Err(AppError::Conflict(format!(
                "move request {id} is not manually assigned; route moves are completed by the driver"
            )));
        }
        if !matches!(before.status, MoveStatus::Assigned | MoveStatus::InProgress) {
            return Err(AppError::Conflict(format!(
                "move request {id} is {:?}; only assigned or in-progress moves can be completed",
                before.status
            )));
        }

        let now = Utc::now();
        let bin = tx.bin_mut(before.bin_id)?;
        let mut move_record = None;
        match before.move_type {
            MoveType::PickupOnly => {
                bin.status = match before.disposal_action {
                    Some(DisposalAction::Retire) => BinStatus::Retired,
                    Some(DisposalAction::Store) => BinStatus::InStorage,
                    None => {
                        return Err(AppError::Validation(
                            "pickup_only move has no disposal_action".to_string(),
                        ));
                    }
                };
            }
            MoveType::Store => bin.status = BinStatus::InStorage,
            MoveType::Relocation => {
                let (Some(to_location), Some(to_address)) =
                    (before.new_location, before.new_address.clone())
                else {
                    return Err(AppError::Validation(
                        "relocation has no destination".to_string(),
                    ));
                };

                move_record = Some(BinMoveRecord {
                    id: Uuid::new_v4(),
                    bin_id: bin.id,
                    move_request_id: id,
                    from_address: bin.address.clone(),
                    from_location: bin.location,
                    to_address: to_address.clone(),
                    to_location,
                    moved_by: actor.id,
                    moved_at: now,
                });
                bin.location = Some(to_location);
                bin.address = to_address;
                bin.status = BinStatus::Active;
            }
        }
        bin.updated_at = now;
        tx.bin_moves.extend(move_record);

        let request = tx.move_request_mut(id)?;
        request.status = MoveStatus::Completed;
        request.completed_at = Some(now);
        request.updated_at = now;
        let after = request.clone();

        let view = move_request_view(&tx, &after, now, state.settings.urgency);
        tx.commit();

        info!(move_request_id = %id, move_type = ?after.move_type, "move completed manually");

        fanout::notify_operators(state, &view);
        fanout::record_history(state, actor, HistoryKind::Completed, Some(&before), &after).await;

        Ok(view)
    })
    .await
}
