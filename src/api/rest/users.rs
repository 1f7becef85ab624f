use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{User, UserRole};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(create_user))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub role: UserRole,
    pub device_token: Option<String>,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: payload.name,
        role: payload.role,
        device_token: payload.device_token,
    };

    let mut tx = state.store.begin().await;
    tx.users.insert(user.id, user.clone());
    tx.commit();

    Ok(Json(user))
}
