use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Created,
    Assigned,
    Reassigned,
    Unassigned,
    Updated,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// Append-only audit record for a move request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub move_request_id: Uuid,
    pub bin_id: Uuid,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub kind: HistoryKind,
    pub changes: Vec<FieldChange>,
    pub created_at: DateTime<Utc>,
}
