use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::views::MoveRequestView;
use crate::models::shift::StopEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// New stops were inserted into the driver's route; `stops` is the
    /// full route after the insertion.
    RouteStopsInserted {
        shift_id: Uuid,
        move_request_id: Uuid,
        stops: Vec<StopEntry>,
    },
    RouteStopsRemoved {
        shift_id: Uuid,
        move_request_id: Uuid,
        stops: Vec<StopEntry>,
    },
    MoveAssigned {
        move_request: MoveRequestView,
    },
    MoveUpdated {
        move_request: MoveRequestView,
    },
    MoveCancelled {
        move_request_id: Uuid,
        shift_id: Option<Uuid>,
    },
    /// Operator feed: any committed change to a move request.
    MoveRequestChanged {
        move_request: MoveRequestView,
    },
}
