use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::location::{Address, GeoPoint};
use crate::models::shift::ShiftStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Urgent,
    Scheduled,
}

/// Urgency shown to operators, derived from status and time-to-schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayUrgency {
    Overdue,
    Urgent,
    Soon,
    Scheduled,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl MoveStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MoveStatus::Completed | MoveStatus::Cancelled)
    }

    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    Store,
    PickupOnly,
    Relocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposalAction {
    Retire,
    Store,
}

/// Who is responsible for carrying out a move. A request is bound to a
/// driver's route or to a single user, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assignment {
    #[default]
    None,
    Shift {
        shift_id: Uuid,
    },
    Manual {
        user_id: Uuid,
    },
}

impl Assignment {
    pub fn is_assigned(&self) -> bool {
        !matches!(self, Assignment::None)
    }

    pub fn shift_id(&self) -> Option<Uuid> {
        match self {
            Assignment::Shift { shift_id } => Some(*shift_id),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Assignment::Manual { user_id } => Some(*user_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub id: Uuid,
    pub bin_id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub urgency: Urgency,
    pub status: MoveStatus,
    pub move_type: MoveType,
    pub disposal_action: Option<DisposalAction>,
    pub original_location: Option<GeoPoint>,
    pub original_address: Address,
    pub new_location: Option<GeoPoint>,
    pub new_address: Option<Address>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub assignment: Assignment,
    pub created_by: Uuid,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MoveRequest {
    /// Checks the fields that depend on `move_type`.
    pub fn validate_shape(&self) -> Result<(), AppError> {
        check_shape(
            self.move_type,
            self.disposal_action,
            self.new_location,
            self.new_address.as_ref(),
        )
    }

    /// Location the driver is routed to first for this move.
    pub fn anchor_location(&self) -> Option<GeoPoint> {
        match self.move_type {
            MoveType::Relocation => self.new_location,
            MoveType::Store | MoveType::PickupOnly => self.original_location,
        }
    }
}

pub fn check_shape(
    move_type: MoveType,
    disposal_action: Option<DisposalAction>,
    new_location: Option<GeoPoint>,
    new_address: Option<&Address>,
) -> Result<(), AppError> {
    match move_type {
        MoveType::Relocation => {
            if new_location.is_none() {
                return Err(AppError::Validation(
                    "relocation requires new coordinates".to_string(),
                ));
            }
            if new_address.is_none_or(Address::is_blank) {
                return Err(AppError::Validation(
                    "relocation requires a new address".to_string(),
                ));
            }
        }
        MoveType::PickupOnly => {
            if disposal_action.is_none() {
                return Err(AppError::Validation(
                    "pickup_only requires a disposal_action".to_string(),
                ));
            }
        }
        MoveType::Store => {}
    }
    Ok(())
}

/// Status implied by an assignment and, for shift assignments, the shift's
/// own status.
pub fn derive_status(assignment: &Assignment, shift_status: Option<ShiftStatus>) -> MoveStatus {
    match assignment {
        Assignment::None => MoveStatus::Pending,
        Assignment::Shift { .. } if shift_status == Some(ShiftStatus::Active) => {
            MoveStatus::InProgress
        }
        Assignment::Shift { .. } | Assignment::Manual { .. } => MoveStatus::Assigned,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UrgencyWindows {
    pub urgent: Duration,
    pub soon: Duration,
}

impl Default for UrgencyWindows {
    fn default() -> Self {
        Self {
            urgent: Duration::hours(24),
            soon: Duration::hours(72),
        }
    }
}

pub fn display_urgency(
    request: &MoveRequest,
    now: DateTime<Utc>,
    windows: UrgencyWindows,
) -> DisplayUrgency {
    if request.status.is_terminal() {
        return DisplayUrgency::Resolved;
    }

    let until = request.scheduled_date - now;
    if until < Duration::zero() {
        DisplayUrgency::Overdue
    } else if request.urgency == Urgency::Urgent || until <= windows.urgent {
        DisplayUrgency::Urgent
    } else if until <= windows.soon {
        DisplayUrgency::Soon
    } else {
        DisplayUrgency::Scheduled
    }
}
