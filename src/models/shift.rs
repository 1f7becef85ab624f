use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    NotStarted,
    Active,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub status: ShiftStatus,
    pub total_bins: u32,
    pub completed_bins: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopType {
    Pickup,
    Dropoff,
    Regular,
}

/// One waypoint on a shift's route. `sequence_order` is unique within the
/// shift but need not be contiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopEntry {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub bin_id: Uuid,
    pub sequence_order: i32,
    pub is_completed: bool,
    pub stop_type: StopType,
    pub move_request_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
