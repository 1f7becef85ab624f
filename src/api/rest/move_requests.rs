use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use uuid::Uuid;

use crate::engine::assignment::{self, AssignToShift, AssignToUser};
use crate::engine::edit::{update_move_request, MoveRequestEdit};
use crate::engine::intake::{create_move_request, NewMoveRequest};
use crate::engine::views::{list_move_requests, move_request_view, MoveRequestFilter, MoveRequestView};
use crate::error::AppError;
use crate::models::history::HistoryEntry;
use crate::models::user::Actor;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/move-requests", post(create).get(list))
        .route("/move-requests/:id", get(get_one).patch(update))
        .route("/move-requests/:id/history", get(history))
        .route("/move-requests/:id/assign-shift", post(assign_shift))
        .route("/move-requests/:id/assign-user", post(assign_user))
        .route("/move-requests/:id/unassign", post(unassign))
        .route("/move-requests/:id/cancel", post(cancel))
        .route("/move-requests/:id/complete", post(complete))
}

async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<NewMoveRequest>,
) -> Result<Json<MoveRequestView>, AppError> {
    create_move_request(&state, &actor, payload).await.map(Json)
}

async fn list(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<MoveRequestFilter>,
) -> Json<Vec<MoveRequestView>> {
    let tables = state.store.read().await;
    Json(list_move_requests(
        &tables,
        &filter,
        Utc::now(),
        state.settings.urgency,
    ))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MoveRequestView>, AppError> {
    let tables = state.store.read().await;
    let request = tables.move_request(id)?;
    Ok(Json(move_request_view(
        &tables,
        request,
        Utc::now(),
        state.settings.urgency,
    )))
}

async fn history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let tables = state.store.read().await;
    tables.move_request(id)?;
    Ok(Json(
        tables
            .history
            .iter()
            .filter(|entry| entry.move_request_id == id)
            .cloned()
            .collect(),
    ))
}

async fn update(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoveRequestEdit>,
) -> Result<Json<MoveRequestView>, AppError> {
    update_move_request(&state, &actor, id, payload).await.map(Json)
}

/// The body is optional; an empty one means automatic shift selection. A body
/// that is present but does not parse is rejected.
async fn assign_shift(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<MoveRequestView>, AppError> {
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        AssignToShift::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| AppError::Validation(format!("invalid assign-shift body: {err}")))?
    };
    assignment::assign_to_shift(&state, &actor, id, input)
        .await
        .map(Json)
}

async fn assign_user(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignToUser>,
) -> Result<Json<MoveRequestView>, AppError> {
    assignment::assign_to_user(&state, &actor, id, payload)
        .await
        .map(Json)
}

async fn unassign(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<MoveRequestView>, AppError> {
    assignment::unassign(&state, &actor, id).await.map(Json)
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<MoveRequestView>, AppError> {
    assignment::cancel(&state, &actor, id).await.map(Json)
}

async fn complete(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<MoveRequestView>, AppError> {
    assignment::complete_manually(&state, &actor, id)
        .await
        .map(Json)
}
