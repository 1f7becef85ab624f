use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::move_request::{
    display_urgency, Assignment, DisplayUrgency, MoveRequest, MoveStatus, UrgencyWindows,
};
use crate::store::Tables;

/// Canonical representation returned by every move request operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequestView {
    #[serde(flatten)]
    pub request: MoveRequest,
    pub display_urgency: DisplayUrgency,
    pub bin_number: Option<String>,
    pub bin_address: Option<String>,
    pub assigned_shift_id: Option<Uuid>,
    pub assigned_user_id: Option<Uuid>,
    pub assigned_driver_name: Option<String>,
}

pub fn move_request_view(
    tables: &Tables,
    request: &MoveRequest,
    now: DateTime<Utc>,
    windows: UrgencyWindows,
) -> MoveRequestView {
    let bin = tables.bins.get(&request.bin_id);
    let responsible = match request.assignment {
        Assignment::None => None,
        Assignment::Shift { shift_id } => tables.shifts.get(&shift_id).map(|s| s.driver_id),
        Assignment::Manual { user_id } => Some(user_id),
    };

    MoveRequestView {
        display_urgency: display_urgency(request, now, windows),
        bin_number: bin.map(|bin| bin.bin_number.clone()),
        bin_address: bin.map(|bin| bin.address.formatted()),
        assigned_shift_id: request.assignment.shift_id(),
        assigned_user_id: request.assignment.user_id(),
        assigned_driver_name: responsible
            .and_then(|id| tables.users.get(&id))
            .map(|user| user.name.clone()),
        request: request.clone(),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoveRequestFilter {
    pub status: Option<MoveStatus>,
    pub urgency: Option<DisplayUrgency>,
    pub bin_id: Option<Uuid>,
}

impl MoveRequestFilter {
    fn matches(&self, view: &MoveRequestView) -> bool {
        self.status.is_none_or(|status| view.request.status == status)
            && self.urgency.is_none_or(|urgency| view.display_urgency == urgency)
            && self.bin_id.is_none_or(|bin_id| view.request.bin_id == bin_id)
    }
}

/// Filtered listing, newest scheduled first.
pub fn list_move_requests(
    tables: &Tables,
    filter: &MoveRequestFilter,
    now: DateTime<Utc>,
    windows: UrgencyWindows,
) -> Vec<MoveRequestView> {
    let mut views: Vec<MoveRequestView> = tables
        .move_requests
        .values()
        .map(|request| move_request_view(tables, request, now, windows))
        .filter(|view| filter.matches(view))
        .collect();
    views.sort_by_key(|view| Reverse((view.request.scheduled_date, view.request.created_at)));
    views
}
