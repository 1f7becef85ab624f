use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::history;
use crate::engine::views::MoveRequestView;
use crate::models::history::HistoryKind;
use crate::models::move_request::{Assignment, MoveRequest};
use crate::models::shift::StopEntry;
use crate::models::user::{Actor, UserRole};
use crate::notify::events::RealtimeEvent;
use crate::notify::push::PushPayload;
use crate::state::AppState;

pub async fn record_history(
    state: &AppState,
    actor: &Actor,
    kind: HistoryKind,
    before: Option<&MoveRequest>,
    after: &MoveRequest,
) {
    let entry = history::entry(actor, kind, before, after);
    if let Err(err) = state.audit.append(entry).await {
        state.metrics.record_fanout_failure("audit");
        warn!(move_request_id = %after.id, error = %err, "failed to write history entry");
    }
}

pub fn notify_operators(state: &AppState, view: &MoveRequestView) {
    for role in [UserRole::Operator, UserRole::Admin] {
        state.hub.send_to_role(
            role,
            RealtimeEvent::MoveRequestChanged {
                move_request: view.clone(),
            },
        );
    }
}

pub async fn push_to_user(state: &AppState, user_id: Uuid, payload: PushPayload) {
    let token = {
        let tables = state.store.read().await;
        tables
            .users
            .get(&user_id)
            .and_then(|user| user.device_token.clone())
    };

    let Some(token) = token else {
        debug!(user_id = %user_id, "no device token; push skipped");
        return;
    };

    if let Err(err) = state.push.notify(&token, &payload).await {
        state.metrics.record_fanout_failure("push");
        warn!(user_id = %user_id, error = %err, "push notification failed");
    }
}

async fn route_snapshot(state: &AppState, shift_id: Uuid) -> Option<(Uuid, Vec<StopEntry>)> {
    let tables = state.store.read().await;
    match tables.shift(shift_id) {
        Ok(shift) => Some((shift.driver_id, tables.stops_for_shift(shift_id))),
        Err(err) => {
            state.metrics.record_fanout_failure("realtime");
            warn!(shift_id = %shift_id, error = %err, "route vanished before broadcast");
            None
        }
    }
}

pub async fn route_inserted(state: &AppState, shift_id: Uuid, view: &MoveRequestView) {
    let Some((driver_id, stops)) = route_snapshot(state, shift_id).await else {
        return;
    };

    state.hub.send_to_user(
        driver_id,
        RealtimeEvent::RouteStopsInserted {
            shift_id,
            move_request_id: view.request.id,
            stops,
        },
    );
    state.hub.send_to_user(
        driver_id,
        RealtimeEvent::MoveAssigned {
            move_request: view.clone(),
        },
    );

    let bin = view.bin_number.clone().unwrap_or_else(|| "a bin".to_string());
    push_to_user(
        state,
        driver_id,
        PushPayload {
            title: "Route updated".to_string(),
            body: format!("A move for {bin} was added to your route"),
            data: json!({ "move_request_id": view.request.id, "shift_id": shift_id }),
        },
    )
    .await;
}

pub async fn route_removed(state: &AppState, shift_id: Uuid, move_request_id: Uuid) {
    let Some((driver_id, stops)) = route_snapshot(state, shift_id).await else {
        return;
    };

    state.hub.send_to_user(
        driver_id,
        RealtimeEvent::RouteStopsRemoved {
            shift_id,
            move_request_id,
            stops,
        },
    );
    push_to_user(
        state,
        driver_id,
        PushPayload {
            title: "Route updated".to_string(),
            body: "A move was removed from your route".to_string(),
            data: json!({ "move_request_id": move_request_id, "shift_id": shift_id }),
        },
    )
    .await;
}

/// Tells the previous and the new assignee about an assignment change.
pub async fn assignment_changed(state: &AppState, before: &Assignment, view: &MoveRequestView) {
    let after = &view.request.assignment;

    if let Some(old_shift) = before.shift_id() {
        if after.shift_id() != Some(old_shift) {
            route_removed(state, old_shift, view.request.id).await;
        }
    }
    if let Some(old_user) = before.user_id() {
        if after.user_id() != Some(old_user) {
            state.hub.send_to_user(
                old_user,
                RealtimeEvent::MoveCancelled {
                    move_request_id: view.request.id,
                    shift_id: None,
                },
            );
        }
    }

    match *after {
        Assignment::Shift { shift_id } => route_inserted(state, shift_id, view).await,
        Assignment::Manual { user_id } => {
            state.hub.send_to_user(
                user_id,
                RealtimeEvent::MoveAssigned {
                    move_request: view.clone(),
                },
            );
            push_to_user(
                state,
                user_id,
                PushPayload {
                    title: "Move assigned".to_string(),
                    body: format!(
                        "You were assigned a move for {}",
                        view.bin_number.as_deref().unwrap_or("a bin")
                    ),
                    data: json!({ "move_request_id": view.request.id }),
                },
            )
            .await;
        }
        Assignment::None => {}
    }
}

/// Field-only change on a request that stays with the same assignee.
pub async fn details_changed(state: &AppState, view: &MoveRequestView, route_rebuilt: bool) {
    match view.request.assignment {
        Assignment::Shift { shift_id } => {
            let Some((driver_id, stops)) = route_snapshot(state, shift_id).await else {
                return;
            };
            if route_rebuilt {
                state.hub.send_to_user(
                    driver_id,
                    RealtimeEvent::RouteStopsInserted {
                        shift_id,
                        move_request_id: view.request.id,
                        stops,
                    },
                );
            }
            state.hub.send_to_user(
                driver_id,
                RealtimeEvent::MoveUpdated {
                    move_request: view.clone(),
                },
            );
        }
        Assignment::Manual { user_id } => {
            state.hub.send_to_user(
                user_id,
                RealtimeEvent::MoveUpdated {
                    move_request: view.clone(),
                },
            );
        }
        Assignment::None => {}
    }
}

pub async fn move_cancelled(state: &AppState, before: &Assignment, move_request_id: Uuid) {
    match *before {
        Assignment::Shift { shift_id } => {
            if let Some((driver_id, _)) = route_snapshot(state, shift_id).await {
                state.hub.send_to_user(
                    driver_id,
                    RealtimeEvent::MoveCancelled {
                        move_request_id,
                        shift_id: Some(shift_id),
                    },
                );
            }
            route_removed(state, shift_id, move_request_id).await;
        }
        Assignment::Manual { user_id } => {
            state.hub.send_to_user(
                user_id,
                RealtimeEvent::MoveCancelled {
                    move_request_id,
                    shift_id: None,
                },
            );
        }
        Assignment::None => {}
    }
}
