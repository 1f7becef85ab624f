use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::user::UserRole;
use crate::notify::events::RealtimeEvent;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Subscription {
    pub user_id: Option<Uuid>,
    pub role: Option<UserRole>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(subscription): Query<Subscription>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, subscription))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();

    let mut streams = Vec::with_capacity(2);
    if let Some(user_id) = subscription.user_id {
        streams.push(BroadcastStream::new(state.hub.subscribe_user(user_id)));
    }
    if let Some(role) = subscription.role {
        streams.push(BroadcastStream::new(state.hub.subscribe_role(role)));
    }
    let mut events = futures::stream::select_all(streams);

    state.metrics.realtime_subscribers.inc();
    info!(user_id = ?subscription.user_id, role = ?subscription.role, "websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let event: RealtimeEvent = match event {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "websocket subscriber lagged; events dropped");
                    continue;
                }
            };
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize realtime event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.metrics.realtime_subscribers.dec();
    info!("websocket client disconnected");
}
