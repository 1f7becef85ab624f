//! In-place edits of a move request.
//!
//! Edits are checked against the stored `updated_at` the client last saw,
//! and edits that would move a request off a live route need an explicit
//! acknowledgement before anything is written.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::assignment::holder_name;
use crate::engine::history;
use crate::engine::instrumented;
use crate::engine::route::{insert_into_shift, remove_from_shift, TailPolicy};
use crate::engine::sequencing::{waypoint_types, InsertionHint};
use crate::engine::views::{move_request_view, MoveRequestView};
use crate::error::AppError;
use crate::models::location::{Address, GeoPoint};
use crate::models::move_request::{
    derive_status, Assignment, DisposalAction, MoveRequest, MoveStatus, MoveType, Urgency,
};
use crate::models::patch::{id_or_empty, Patch};
use crate::models::shift::ShiftStatus;
use crate::models::user::Actor;
use crate::notify::fanout;
use crate::state::AppState;
use crate::store::Tables;

/// How to treat the driver's route when reassigning a move they are
/// already working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InProgressAction {
    /// Drop the stops from the current route; the new assignee gets the
    /// default placement.
    RemoveFromRoute,
    /// Place the new stops right after the driver's next waypoint and leave
    /// the rest of the route alone.
    InsertAfterCurrent,
    /// Place after the next waypoint and re-rank the remaining tail.
    ReoptimizeRoute,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoveRequestEdit {
    #[serde(default)]
    pub scheduled_date: Patch<DateTime<Utc>>,
    #[serde(default)]
    pub urgency: Patch<Urgency>,
    #[serde(default)]
    pub move_type: Patch<MoveType>,
    #[serde(default)]
    pub disposal_action: Patch<DisposalAction>,
    #[serde(default)]
    pub reason: Patch<String>,
    #[serde(default)]
    pub notes: Patch<String>,
    #[serde(default)]
    pub new_location: Patch<GeoPoint>,
    #[serde(default)]
    pub new_address: Patch<Address>,
    #[serde(default, deserialize_with = "id_or_empty")]
    pub assigned_shift_id: Patch<Uuid>,
    #[serde(default, deserialize_with = "id_or_empty")]
    pub assigned_user_id: Patch<Uuid>,

    /// `updated_at` as last seen by the client.
    pub client_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub confirm_active_route_change: bool,
    pub in_progress_action: Option<InProgressAction>,
    pub insertion_hint: Option<InsertionHint>,
}

impl MoveRequestEdit {
    /// Assignment the edit asks for, or the current one when the edit does
    /// not touch assignment.
    fn target_assignment(&self, current: &Assignment) -> Result<Assignment, AppError> {
        match (&self.assigned_shift_id, &self.assigned_user_id) {
            (Patch::Set(_), Patch::Set(_)) => Err(AppError::Validation(
                "a move request cannot be assigned to a shift and a user at once".to_string(),
            )),
            (Patch::Set(shift_id), _) => Ok(Assignment::Shift {
                shift_id: *shift_id,
            }),
            (_, Patch::Set(user_id)) => Ok(Assignment::Manual { user_id: *user_id }),
            (Patch::Missing, Patch::Missing) => Ok(*current),
            (Patch::Clear, _) if current.user_id().is_some() && self.assigned_user_id.is_missing() => {
                Ok(*current)
            }
            (_, Patch::Clear) if current.shift_id().is_some() && self.assigned_shift_id.is_missing() => {
                Ok(*current)
            }
            _ => Ok(Assignment::None),
        }
    }

    /// Checks that need nothing but the edit itself, so they run before the
    /// store is touched.
    fn validate(&self) -> Result<(), AppError> {
        let cleared = [
            ("scheduled_date", matches!(self.scheduled_date, Patch::Clear)),
            ("urgency", matches!(self.urgency, Patch::Clear)),
            ("move_type", matches!(self.move_type, Patch::Clear)),
        ];
        if let Some((field, _)) = cleared.iter().find(|(_, cleared)| *cleared) {
            return Err(AppError::Validation(format!("{field} cannot be cleared")));
        }
        if self.assigned_shift_id.is_set() && self.assigned_user_id.is_set() {
            return Err(AppError::Validation(
                "a move request cannot be assigned to a shift and a user at once".to_string(),
            ));
        }

        match self.move_type {
            Patch::Set(MoveType::Relocation) => {
                let blank_address = match &self.new_address {
                    Patch::Clear => true,
                    Patch::Set(address) => address.is_blank(),
                    Patch::Missing => false,
                };
                if matches!(self.new_location, Patch::Clear) || blank_address {
                    return Err(AppError::Validation(
                        "relocation requires new coordinates and a new address".to_string(),
                    ));
                }
            }
            Patch::Set(MoveType::PickupOnly) if matches!(self.disposal_action, Patch::Clear) => {
                return Err(AppError::Validation(
                    "pickup_only requires a disposal_action".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Merges the patch into `request`. Expects [`Self::validate`] to have
    /// passed; the merged shape is still checked against the stored fields.
    fn apply_fields(self, request: &mut MoveRequest) -> Result<(), AppError> {
        if let Patch::Set(date) = self.scheduled_date {
            request.scheduled_date = date;
        }
        if let Patch::Set(urgency) = self.urgency {
            request.urgency = urgency;
        }
        if let Patch::Set(move_type) = self.move_type {
            request.move_type = move_type;
        }
        self.disposal_action.apply_to(&mut request.disposal_action);
        self.reason.apply_to(&mut request.reason);
        self.notes.apply_to(&mut request.notes);
        self.new_location.apply_to(&mut request.new_location);
        self.new_address.apply_to(&mut request.new_address);

        request.validate_shape()
    }
}

fn shift_status_of(tables: &Tables, assignment: &Assignment) -> Result<Option<ShiftStatus>, AppError> {
    assignment
        .shift_id()
        .map(|shift_id| tables.shift(shift_id).map(|shift| shift.status))
        .transpose()
}

pub async fn update_move_request(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    edit: MoveRequestEdit,
) -> Result<MoveRequestView, AppError> {
    instrumented(state, "update", async {
        edit.validate()?;

        let mut tx = state.store.begin().await;
        let before = tx.move_request(id)?.clone();

        if before.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "move request {id} is {:?} and can no longer be edited",
                before.status
            )));
        }
        if let Some(seen) = edit.client_updated_at {
            if seen != before.updated_at {
                return Err(AppError::Conflict(format!(
                    "move request {id} was modified at {} after it was read at {seen}",
                    before.updated_at.to_rfc3339()
                )));
            }
        }

        let target = edit.target_assignment(&before.assignment)?;
        let assignment_changes = target != before.assignment;
        let action = edit.in_progress_action;
        let confirmed = edit.confirm_active_route_change;
        let hint = edit.insertion_hint.clone();
        let mut after = before.clone();
        edit.apply_fields(&mut after)?;

        let is_on_active_shift =
            shift_status_of(&tx, &before.assignment)? == Some(ShiftStatus::Active);
        let is_in_progress = before.status == MoveStatus::InProgress;

        if assignment_changes && is_in_progress && action.is_none() {
            return Err(AppError::Guardrail(format!(
                "move request {id} is in progress on {}'s route; choose an in_progress_action \
                 (remove_from_route, insert_after_current or reoptimize_route)",
                holder_name(&tx, &before.assignment)
            )));
        }
        if assignment_changes
            && !is_in_progress
            && is_on_active_shift
            && !confirmed
        {
            return Err(AppError::Guardrail(format!(
                "{} is actively driving this route; changing the assignment will change their \
                 live navigation. Resend with confirm_active_route_change to proceed",
                holder_name(&tx, &before.assignment)
            )));
        }

        let mut route_rebuilt = false;
        if assignment_changes {
            if let Some(old_shift) = before.assignment.shift_id() {
                remove_from_shift(&mut tx, id, old_shift)?;
            }
            match target {
                Assignment::None => {}
                Assignment::Manual { user_id } => {
                    tx.user(user_id)?;
                }
                Assignment::Shift { shift_id } => {
                    let (hint, tail) = match action {
                        Some(InProgressAction::InsertAfterCurrent) => {
                            (Some(InsertionHint::NextWaypoint), TailPolicy::Keep)
                        }
                        Some(InProgressAction::ReoptimizeRoute) => {
                            (Some(InsertionHint::NextWaypoint), TailPolicy::Reoptimize)
                        }
                        Some(InProgressAction::RemoveFromRoute) | None => {
                            (hint, TailPolicy::Reoptimize)
                        }
                    };
                    insert_into_shift(&mut tx, state, &after, shift_id, hint.as_ref(), tail)
                        .await?;
                }
            }
            after.assignment = target;
            after.status = derive_status(&target, shift_status_of(&tx, &target)?);
        } else if let Some(shift_id) = before.assignment.shift_id() {
            if waypoint_types(before.move_type) != waypoint_types(after.move_type) {
                let removed = remove_from_shift(&mut tx, id, shift_id)?;
                let at = removed.first().map(|stop| InsertionHint::AtSequence {
                    sequence: stop.sequence_order,
                });
                insert_into_shift(&mut tx, state, &after, shift_id, at.as_ref(), TailPolicy::Keep)
                    .await?;
                route_rebuilt = true;
            }
        }

        if !matches!(after.status, MoveStatus::InProgress | MoveStatus::Completed) {
            after.status = derive_status(&after.assignment, shift_status_of(&tx, &after.assignment)?);
        }

        let now = Utc::now();
        if history::diff(Some(&before), &after).is_empty() {
            return Ok(move_request_view(&tx, &before, now, state.settings.urgency));
        }

        after.updated_at = now;
        tx.move_requests.insert(id, after.clone());
        let view = move_request_view(&tx, &after, now, state.settings.urgency);
        tx.commit();

        let kind = history::classify_edit(&before.assignment, &after.assignment);
        info!(move_request_id = %id, kind = ?kind, "move request edited");

        fanout::notify_operators(state, &view);
        if assignment_changes {
            fanout::assignment_changed(state, &before.assignment, &view).await;
        } else if is_on_active_shift || route_rebuilt {
            fanout::details_changed(state, &view, route_rebuilt).await;
        }
        fanout::record_history(state, actor, kind, Some(&before), &after).await;

        Ok(view)
    })
    .await
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::MoveRequestEdit;
    use crate::models::move_request::Assignment;

    fn edit(value: serde_json::Value) -> MoveRequestEdit {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn untouched_assignment_is_kept() {
        let current = Assignment::Shift {
            shift_id: Uuid::new_v4(),
        };
        let target = edit(json!({ "notes": "x" }))
            .target_assignment(&current)
            .unwrap();
        assert_eq!(target, current);
    }

    #[test]
    fn empty_string_unassigns() {
        let current = Assignment::Manual {
            user_id: Uuid::new_v4(),
        };
        let target = edit(json!({ "assigned_user_id": "" }))
            .target_assignment(&current)
            .unwrap();
        assert_eq!(target, Assignment::None);
    }

    #[test]
    fn clearing_the_other_kind_keeps_assignment() {
        let current = Assignment::Manual {
            user_id: Uuid::new_v4(),
        };
        let target = edit(json!({ "assigned_shift_id": null }))
            .target_assignment(&current)
            .unwrap();
        assert_eq!(target, current);
    }

    #[test]
    fn switching_to_a_shift_replaces_manual() {
        let shift_id = Uuid::new_v4();
        let current = Assignment::Manual {
            user_id: Uuid::new_v4(),
        };
        let target = edit(json!({ "assigned_shift_id": shift_id, "assigned_user_id": "" }))
            .target_assignment(&current)
            .unwrap();
        assert_eq!(target, Assignment::Shift { shift_id });
    }

    #[test]
    fn clearing_required_fields_is_rejected_up_front() {
        assert!(edit(json!({ "scheduled_date": null })).validate().is_err());
        assert!(edit(json!({ "move_type": null })).validate().is_err());
        assert!(edit(json!({ "notes": null, "reason": null })).validate().is_ok());
    }

    #[test]
    fn relocation_patch_without_destination_is_rejected_up_front() {
        let cleared = edit(json!({ "move_type": "relocation", "new_location": null }));
        assert!(cleared.validate().is_err());

        let blank = edit(json!({
            "move_type": "relocation",
            "new_address": { "street": " ", "city": "", "postal_code": "" }
        }));
        assert!(blank.validate().is_err());

        // Missing fields may still be satisfied by the stored request.
        assert!(edit(json!({ "move_type": "relocation" })).validate().is_ok());
    }

    #[test]
    fn both_targets_are_rejected() {
        let result = edit(json!({
            "assigned_shift_id": Uuid::new_v4(),
            "assigned_user_id": Uuid::new_v4(),
        }))
        .target_assignment(&Assignment::None);
        assert!(result.is_err());
    }
}
