use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub data: Value,
}

#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn notify(&self, device_token: &str, payload: &PushPayload) -> Result<(), AppError>;
}

/// Records pushes in the log instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogPushNotifier;

#[async_trait]
impl PushNotifier for LogPushNotifier {
    async fn notify(&self, device_token: &str, payload: &PushPayload) -> Result<(), AppError> {
        info!(
            device_token,
            title = %payload.title,
            body = %payload.body,
            "push notification"
        );
        Ok(())
    }
}
