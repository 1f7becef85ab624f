use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::engine::sequencing::SequencingError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// An edit was blocked because it would disturb a live route without
    /// the caller acknowledging it.
    #[error("blocked: {0}")]
    Guardrail(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("collaborator failed: {0}")]
    Collaborator(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Guardrail(_) => "guardrail",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::InvariantViolation(_) => "invariant_violation",
            AppError::Collaborator(_) => "collaborator_failure",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<SequencingError> for AppError {
    fn from(err: SequencingError) -> Self {
        match err {
            SequencingError::AfterBinMissing(_) | SequencingError::SequenceOverflow { .. } => {
                AppError::Validation(err.to_string())
            }
            SequencingError::DuplicateSequence { .. }
            | SequencingError::PickupAfterDropoff { .. }
            | SequencingError::TailMismatch => AppError::InvariantViolation(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                format!("{msg}; refetch the move request and retry"),
            ),
            AppError::Guardrail(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::InvariantViolation(msg) => {
                tracing::error!(error = %msg, "route invariant violated; transaction aborted");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "route sequencing invariant violated".to_string(),
                )
            }
            AppError::Collaborator(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}
