use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::history::{FieldChange, HistoryEntry, HistoryKind};
use crate::models::move_request::{Assignment, MoveRequest};
use crate::models::user::Actor;

const UNTRACKED_FIELDS: &[&str] = &["updated_at"];

fn as_object(request: Option<&MoveRequest>) -> Map<String, Value> {
    match request.map(serde_json::to_value) {
        Some(Ok(Value::Object(map))) => map,
        _ => Map::new(),
    }
}

/// Field-level changes between two snapshots of one request. With no
/// `before`, every field is reported against `null`.
pub fn diff(before: Option<&MoveRequest>, after: &MoveRequest) -> Vec<FieldChange> {
    let old = as_object(before);
    let new = as_object(Some(after));

    let mut changes: Vec<FieldChange> = new
        .into_iter()
        .filter(|(field, _)| !UNTRACKED_FIELDS.contains(&field.as_str()))
        .filter_map(|(field, new_value)| {
            let old_value = old.get(&field).cloned().unwrap_or(Value::Null);
            (old_value != new_value).then(|| FieldChange {
                field,
                old: old_value,
                new: new_value,
            })
        })
        .collect();
    changes.sort_by(|a, b| a.field.cmp(&b.field));
    changes
}

/// One classification per edit, from assignment presence before and after.
pub fn classify_edit(before: &Assignment, after: &Assignment) -> HistoryKind {
    match (before.is_assigned(), after.is_assigned()) {
        (false, true) => HistoryKind::Assigned,
        (true, false) => HistoryKind::Unassigned,
        (true, true) if before != after => HistoryKind::Reassigned,
        _ => HistoryKind::Updated,
    }
}

pub fn entry(
    actor: &Actor,
    kind: HistoryKind,
    before: Option<&MoveRequest>,
    after: &MoveRequest,
) -> HistoryEntry {
    HistoryEntry {
        id: Uuid::new_v4(),
        move_request_id: after.id,
        bin_id: after.bin_id,
        actor_id: actor.id,
        actor_name: actor.name.clone(),
        kind,
        changes: diff(before, after),
        created_at: Utc::now(),
    }
}
