use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::engine::instrumented;
use crate::engine::views::move_request_view;
use crate::error::AppError;
use crate::models::history::HistoryKind;
use crate::models::move_request::{Assignment, MoveStatus};
use crate::models::shift::{Shift, ShiftStatus};
use crate::models::user::Actor;
use crate::notify::fanout;
use crate::state::AppState;

/// Moves a shift to `status`. Activating a shift promotes the `assigned`
/// move requests on it to `in_progress` in the same transaction; nothing
/// is ever demoted from `in_progress` here.
pub async fn set_shift_status(
    state: &AppState,
    actor: &Actor,
    shift_id: Uuid,
    status: ShiftStatus,
) -> Result<Shift, AppError> {
    instrumented(state, "shift_status", async {
        let mut tx = state.store.begin().await;
        let current = tx.shift(shift_id)?.clone();

        if current.status == ShiftStatus::Completed && status != ShiftStatus::Completed {
            return Err(AppError::Conflict(format!(
                "shift {shift_id} is completed and cannot be reopened"
            )));
        }
        if current.status == status {
            return Ok(current);
        }

        let now = Utc::now();
        let shift = tx.shift_mut(shift_id)?;
        shift.status = status;
        shift.updated_at = now;
        match status {
            ShiftStatus::Active if shift.started_at.is_none() => shift.started_at = Some(now),
            ShiftStatus::Completed => shift.ended_at = Some(now),
            _ => {}
        }
        let updated = shift.clone();

        let mut promoted = Vec::new();
        if status == ShiftStatus::Active {
            for request in tx.move_requests.values_mut() {
                if request.assignment == (Assignment::Shift { shift_id })
                    && request.status == MoveStatus::Assigned
                {
                    let before = request.clone();
                    request.status = MoveStatus::InProgress;
                    request.updated_at = now;
                    promoted.push((before, request.clone()));
                }
            }
        }

        let views: Vec<_> = promoted
            .iter()
            .map(|(_, after)| move_request_view(&tx, after, now, state.settings.urgency))
            .collect();
        tx.commit();

        info!(shift_id = %shift_id, status = ?status, promoted = promoted.len(), "shift status changed");

        for view in &views {
            fanout::notify_operators(state, view);
        }
        for (before, after) in &promoted {
            fanout::record_history(state, actor, HistoryKind::Updated, Some(before), after).await;
        }

        Ok(updated)
    })
    .await
}
