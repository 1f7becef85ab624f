use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::{Address, GeoPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinStatus {
    Active,
    PendingMove,
    Retired,
    InStorage,
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bin {
    pub id: Uuid,
    pub bin_number: String,
    pub location: Option<GeoPoint>,
    pub address: Address,
    pub status: BinStatus,
    pub fill_percentage: u8,
    pub last_checked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Permanent record of a bin being physically relocated. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinMoveRecord {
    pub id: Uuid,
    pub bin_id: Uuid,
    pub move_request_id: Uuid,
    pub from_address: Address,
    pub from_location: Option<GeoPoint>,
    pub to_address: Address,
    pub to_location: GeoPoint,
    pub moved_by: Uuid,
    pub moved_at: DateTime<Utc>,
}
