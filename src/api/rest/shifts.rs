use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::sequencing::{sequence_after, verify_ordering};
use crate::engine::shifts::set_shift_status;
use crate::error::AppError;
use crate::models::shift::{Shift, ShiftStatus, StopEntry, StopType};
use crate::models::user::{Actor, UserRole};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shifts", post(create_shift))
        .route("/shifts/:id", get(get_shift))
        .route("/shifts/:id/status", patch(update_status))
        .route("/shifts/:id/stops", post(add_stop))
}

#[derive(Deserialize)]
pub struct CreateShiftRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ShiftStatus,
}

#[derive(Deserialize)]
pub struct AddStopRequest {
    pub bin_id: Uuid,
    /// Defaults to one past the current last stop.
    pub sequence_order: Option<i32>,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Serialize)]
pub struct ShiftResponse {
    #[serde(flatten)]
    pub shift: Shift,
    pub stops: Vec<StopEntry>,
}

async fn create_shift(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateShiftRequest>,
) -> Result<Json<Shift>, AppError> {
    let mut tx = state.store.begin().await;
    let driver = tx.user(payload.driver_id)?;
    if driver.role != UserRole::Driver {
        return Err(AppError::Validation(format!(
            "user {} is not a driver",
            driver.name
        )));
    }

    let now = Utc::now();
    let shift = Shift {
        id: Uuid::new_v4(),
        driver_id: payload.driver_id,
        status: ShiftStatus::NotStarted,
        total_bins: 0,
        completed_bins: 0,
        started_at: None,
        ended_at: None,
        created_at: now,
        updated_at: now,
    };
    tx.shifts.insert(shift.id, shift.clone());
    tx.commit();

    Ok(Json(shift))
}

async fn get_shift(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShiftResponse>, AppError> {
    let tables = state.store.read().await;
    let shift = tables.shift(id)?.clone();
    Ok(Json(ShiftResponse {
        stops: tables.stops_for_shift(id),
        shift,
    }))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Shift>, AppError> {
    set_shift_status(&state, &actor, id, payload.status)
        .await
        .map(Json)
}

/// Appends a regular service stop. Route planning proper happens upstream.
async fn add_stop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddStopRequest>,
) -> Result<Json<StopEntry>, AppError> {
    let mut tx = state.store.begin().await;
    tx.bin(payload.bin_id)?;
    tx.shift(id)?;

    let mut stops = tx.stops_for_shift(id);
    let sequence_order = match payload.sequence_order {
        Some(sequence_order) => sequence_order,
        None => match stops.iter().map(|stop| stop.sequence_order).max() {
            Some(last) => sequence_after(last, 1)?,
            None => 1,
        },
    };

    let now = Utc::now();
    let stop = StopEntry {
        id: Uuid::new_v4(),
        shift_id: id,
        bin_id: payload.bin_id,
        sequence_order,
        is_completed: payload.is_completed,
        stop_type: StopType::Regular,
        move_request_id: None,
        completed_at: payload.is_completed.then_some(now),
        created_at: now,
    };
    stops.push(stop.clone());
    verify_ordering(&stops).map_err(|err| AppError::Conflict(err.to_string()))?;

    tx.replace_shift_stops(id, stops);
    let shift = tx.shift_mut(id)?;
    shift.total_bins += 1;
    if stop.is_completed {
        shift.completed_bins += 1;
    }
    shift.updated_at = now;
    tx.commit();

    Ok(Json(stop))
}
