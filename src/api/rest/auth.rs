use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::Actor;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";

/// Identity is established upstream; the gateway forwards the caller as
/// two headers.
#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let id = header(ACTOR_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {ACTOR_ID_HEADER} header")))?;
        let id = Uuid::parse_str(id)
            .map_err(|err| AppError::Unauthorized(format!("invalid {ACTOR_ID_HEADER}: {err}")))?;
        let name = header(ACTOR_NAME_HEADER).unwrap_or("unknown").to_string();

        Ok(Actor { id, name })
    }
}
