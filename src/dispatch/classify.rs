//! Tolerant parsing and classification of inbound HRIS webhook payloads.
//! Field names and action verbs arrive in whatever casing and separator
//! style the sender's webhook config happens to use, so every lookup here
//! normalizes before comparing.

use serde_json::Value;

/// What an HRIS webhook payload turned out to mean, once normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HrisEventKind {
    JobCreate,
    JobUpdate,
    TimeoffCreate,
    TimeoffUpdate,
    TimeoffDelete,
    PersonCreate,
    PersonUpdate,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HrisEvent {
    pub kind: HrisEventKind,
    pub entity_id: String,
}

/// Lowercases and strips `.`/`_`/`-` so `"job.create"`, `"job_create"`,
/// and `"JobCreate"` all compare equal.
fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '.' && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn first_str<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| payload.get(k)).and_then(Value::as_str)
}

/// Extracts `(event_type, entity_type, entity_id)` from a payload whose
/// field names may appear in any of the casing/separator variants the
/// upstream sender happens to use, then classifies the combination.
pub fn classify_hris_event(payload: &Value) -> HrisEvent {
    let event_type = first_str(payload, &["type", "eventType", "event_type"]).unwrap_or("");
    let entity_type = first_str(payload, &["entityType", "entitytype", "entity_type"]).unwrap_or("");
    let entity_id = first_str(payload, &["entityId", "entityid", "entity_id"])
        .unwrap_or("")
        .to_string();

    let event_type = normalize(event_type);
    let entity_type = normalize(entity_type);

    let is_job = matches!(entity_type.as_str(), "job" | "jobs");
    let is_timeoff = matches!(entity_type.as_str(), "timeoff" | "timeoffs");
    let is_person = matches!(entity_type.as_str(), "person" | "people");

    let is_create = matches!(event_type.as_str(), "create" | "jobcreate" | "timeoffcreate" | "personcreate");
    let is_update = matches!(
        event_type.as_str(),
        "update" | "change" | "jobupdate" | "timeoffupdate" | "personupdate"
    );
    let is_delete = matches!(event_type.as_str(), "delete" | "remove" | "timeoffdelete");

    let kind = if is_job && is_create {
        HrisEventKind::JobCreate
    } else if is_job && is_update {
        HrisEventKind::JobUpdate
    } else if is_timeoff && is_delete {
        HrisEventKind::TimeoffDelete
    } else if is_timeoff && is_create {
        HrisEventKind::TimeoffCreate
    } else if is_timeoff && is_update {
        HrisEventKind::TimeoffUpdate
    } else if is_person && is_create {
        HrisEventKind::PersonCreate
    } else if is_person && is_update {
        HrisEventKind::PersonUpdate
    } else {
        HrisEventKind::Unknown
    };

    HrisEvent { kind, entity_id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_event_type_is_recognized() {
        let event = classify_hris_event(&json!({"type": "job.create", "entityType": "job", "entityId": "j1"}));
        assert_eq!(event.kind, HrisEventKind::JobCreate);
        assert_eq!(event.entity_id, "j1");
    }

    #[test]
    fn underscored_and_camel_cased_variants_match_too() {
        let event = classify_hris_event(&json!({"event_type": "TimeOff_Delete", "entity_type": "TimeOffs", "entity_id": "t1"}));
        assert_eq!(event.kind, HrisEventKind::TimeoffDelete);
    }

    #[test]
    fn unknown_entity_types_fall_through() {
        let event = classify_hris_event(&json!({"type": "create", "entityType": "widget"}));
        assert_eq!(event.kind, HrisEventKind::Unknown);
    }

    #[test]
    fn person_update_is_classified() {
        let event = classify_hris_event(&json!({"eventType": "update", "entitytype": "people", "entityid": "p9"}));
        assert_eq!(event.kind, HrisEventKind::PersonUpdate);
        assert_eq!(event.entity_id, "p9");
    }
}
