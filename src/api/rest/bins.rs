use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::bin::{Bin, BinMoveRecord, BinStatus};
use crate::models::history::HistoryEntry;
use crate::models::location::{Address, GeoPoint};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bins", post(create_bin))
        .route("/bins/:id", get(get_bin))
        .route("/bins/:id/history", get(bin_history))
}

#[derive(Deserialize)]
pub struct CreateBinRequest {
    pub bin_number: String,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub fill_percentage: u8,
}

#[derive(Serialize)]
pub struct BinHistoryResponse {
    pub entries: Vec<HistoryEntry>,
    pub moves: Vec<BinMoveRecord>,
}

async fn create_bin(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBinRequest>,
) -> Result<Json<Bin>, AppError> {
    if payload.bin_number.trim().is_empty() {
        return Err(AppError::Validation("bin_number cannot be empty".to_string()));
    }

    let now = Utc::now();
    let bin = Bin {
        id: Uuid::new_v4(),
        bin_number: payload.bin_number,
        location: payload.location,
        address: payload.address,
        status: BinStatus::Active,
        fill_percentage: payload.fill_percentage.min(100),
        last_checked: None,
        created_at: now,
        updated_at: now,
    };

    let mut tx = state.store.begin().await;
    tx.bins.insert(bin.id, bin.clone());
    tx.commit();

    Ok(Json(bin))
}

async fn get_bin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Bin>, AppError> {
    let tables = state.store.read().await;
    tables.bin(id).cloned().map(Json)
}

async fn bin_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<BinHistoryResponse>, AppError> {
    let tables = state.store.read().await;
    tables.bin(id)?;

    Ok(Json(BinHistoryResponse {
        entries: tables.history_for_bin(id),
        moves: tables.moves_for_bin(id),
    }))
}
