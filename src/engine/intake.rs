use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::instrumented;
use crate::engine::views::{move_request_view, MoveRequestView};
use crate::error::AppError;
use crate::models::bin::BinStatus;
use crate::models::history::HistoryKind;
use crate::models::location::{Address, GeoPoint};
use crate::models::move_request::{
    check_shape, Assignment, DisposalAction, MoveRequest, MoveStatus, MoveType, Urgency,
};
use crate::models::user::Actor;
use crate::notify::fanout;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewMoveRequest {
    pub bin_id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    #[serde(default = "default_urgency")]
    pub urgency: Urgency,
    pub move_type: MoveType,
    pub disposal_action: Option<DisposalAction>,
    pub new_location: Option<GeoPoint>,
    pub new_address: Option<Address>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

fn default_urgency() -> Urgency {
    Urgency::Scheduled
}

pub async fn create_move_request(
    state: &AppState,
    actor: &Actor,
    input: NewMoveRequest,
) -> Result<MoveRequestView, AppError> {
    instrumented(state, "create", async {
        check_shape(
            input.move_type,
            input.disposal_action,
            input.new_location,
            input.new_address.as_ref(),
        )?;

        let mut tx = state.store.begin().await;
        let bin = tx.bin(input.bin_id)?.clone();
        if matches!(bin.status, BinStatus::Retired) {
            return Err(AppError::Validation(format!(
                "bin {} is retired",
                bin.bin_number
            )));
        }
        if let Some(open) = tx.open_move_for_bin(bin.id) {
            return Err(AppError::Conflict(format!(
                "bin {} already has an open move request {}",
                bin.bin_number, open.id
            )));
        }

        let now = Utc::now();
        let request = MoveRequest {
            id: Uuid::new_v4(),
            bin_id: bin.id,
            scheduled_date: input.scheduled_date,
            urgency: input.urgency,
            status: MoveStatus::Pending,
            move_type: input.move_type,
            disposal_action: input.disposal_action,
            original_location: bin.location,
            original_address: bin.address.clone(),
            new_location: input.new_location,
            new_address: input.new_address,
            reason: input.reason,
            notes: input.notes,
            assignment: Assignment::None,
            created_by: actor.id,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let bin = tx.bin_mut(bin.id)?;
        bin.status = BinStatus::PendingMove;
        bin.updated_at = now;
        tx.move_requests.insert(request.id, request.clone());

        let view = move_request_view(&tx, &request, now, state.settings.urgency);
        tx.commit();

        info!(move_request_id = %request.id, bin_id = %request.bin_id, "move request created");

        fanout::record_history(state, actor, HistoryKind::Created, None, &request).await;
        fanout::notify_operators(state, &view);

        Ok(view)
    })
    .await
}
