//! Mirrors every Runn collection into the warehouse on a rolling
//! checkpoint, so downstream BI tooling can query planner data without
//! hitting Runn's API directly.

use crate::canonical::content_hash;
use crate::logging::log_info;
use crate::remote::{RunnClient, WarehouseClient};
use crate::state::{StateStore, WarehouseCheckpoint};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// One mirrored collection: its warehouse table name, Runn path, and the
/// catalog entries the fetch, normalize, and MERGE steps key off of.
struct Collection {
    table: &'static str,
    path: &'static str,
    fixed_params: &'static [(&'static str, &'static str)],
    /// Field synthesized as `SHA-256(canonical_json(row))` when absent,
    /// and the column the MERGE keys on.
    pk_field: &'static str,
    /// Column the MERGE's UPDATE guard compares; `None` skips the guard
    /// and updates unconditionally on match.
    ts_field: Option<&'static str>,
    /// Column the target table is day-partitioned on when first created.
    partition_field: Option<&'static str>,
    /// `/me`-style endpoint that returns a single object, not a page.
    single_object: bool,
}

const COLLECTIONS: &[Collection] = &[
    Collection {
        table: "runn_me",
        path: "/me",
        fixed_params: &[],
        pk_field: "id",
        ts_field: None,
        partition_field: None,
        single_object: true,
    },
    Collection { table: "runn_people", path: "/people/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_projects", path: "/projects/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_clients", path: "/clients/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_roles", path: "/roles/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_teams", path: "/teams/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_skills", path: "/skills/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_people_tags", path: "/people-tags/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_project_tags", path: "/project-tags/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_rate_cards", path: "/rate-cards/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_workstreams", path: "/workstreams/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_assignments", path: "/assignments/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: Some("date"), single_object: false },
    Collection { table: "runn_actuals", path: "/actuals/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: Some("date"), single_object: false },
    Collection { table: "runn_timeoffs_leave", path: "/time-offs/leave/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_timeoffs_rostered", path: "/time-offs/rostered/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_timeoffs_holidays", path: "/time-offs/holidays/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_holiday_groups", path: "/holiday-groups/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_placeholders", path: "/placeholders/", fixed_params: &[], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection { table: "runn_contracts", path: "/contracts/", fixed_params: &[("sortBy", "id")], pk_field: "id", ts_field: Some("updatedAt"), partition_field: None, single_object: false },
    Collection {
        table: "runn_custom_fields_checkbox_person",
        path: "/custom-fields/checkbox/",
        fixed_params: &[("model", "PERSON")],
        pk_field: "id",
        ts_field: Some("updatedAt"),
        partition_field: None,
        single_object: false,
    },
    Collection {
        table: "runn_custom_fields_checkbox_project",
        path: "/custom-fields/checkbox/",
        fixed_params: &[("model", "PROJECT")],
        pk_field: "id",
        ts_field: Some("updatedAt"),
        partition_field: None,
        single_object: false,
    },
];

/// A collection supports `modifiedAfter` filtering server-side; the rest
/// must be fetched in full every run.
fn supports_modified_after(path: &str) -> bool {
    matches!(path.trim_end_matches('/'), "/actuals" | "/assignments" | "/contracts" | "/placeholders")
}

/// A collection accepts an explicit `dateFrom`/`dateTo` window, which
/// doubles as the delta-mode default when no checkpoint exists yet.
fn accepts_date_window(path: &str) -> bool {
    matches!(path.trim_end_matches('/'), "/actuals" | "/assignments")
}

/// A caller-provided backfill window for `actuals`/`assignments`. When
/// set, it overrides the checkpoint-derived window for those two
/// collections and purges the target's matching rows first, so the
/// window stays authoritative instead of merging on top of whatever a
/// checkpoint-driven run already wrote for that range.
#[derive(Debug, Clone)]
pub struct BackfillScope {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub person_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct MirrorSummary {
    pub loaded: HashMap<String, u64>,
    pub errors: HashMap<String, String>,
}

/// Mirrors every collection once. Each collection's fetch window is its
/// own checkpoint plus an overlap to re-read rows that may have settled
/// after the previous run's cutoff; the checkpoint only ever advances
/// forward, from the newest `updatedAt` seen in that run's rows.
pub async fn mirror_all(
    runn: &RunnClient,
    warehouse: &WarehouseClient,
    store: &StateStore,
    window_days: i64,
    overlap_days: i64,
    holiday_group_id: Option<&str>,
    backfill: Option<&BackfillScope>,
) -> MirrorSummary {
    let mut checkpoint = match WarehouseCheckpoint::load(store).await {
        Ok(cp) => cp,
        Err(e) => {
            let mut summary = MirrorSummary::default();
            summary.errors.insert("checkpoint".to_string(), e.to_string());
            return summary;
        }
    };

    let now = Utc::now();
    let window_days = window_days.max(0);
    let overlap_days = overlap_days.max(0);
    let mut summary = MirrorSummary::default();

    for collection in COLLECTIONS {
        let is_backfill_target = backfill.is_some() && accepts_date_window(collection.path);
        let mut params: Vec<(&str, String)> = collection
            .fixed_params
            .iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect();
        if collection.table == "runn_timeoffs_holidays" {
            if let Some(group) = holiday_group_id {
                params.push(("holidayGroupId", group.to_string()));
            }
        }

        let last_checkpoint = checkpoint.last_success(collection.table);
        let mut used_modified_after = false;

        if let (true, Some(scope)) = (is_backfill_target, backfill) {
            params.push(("dateFrom", scope.date_from.to_string()));
            params.push(("dateTo", scope.date_to.to_string()));
            if let Some(person) = &scope.person_id {
                params.push(("personId", person.clone()));
            }
        } else if accepts_date_window(collection.path) {
            let start = match last_checkpoint {
                Some(last) => last - chrono::Duration::days(overlap_days),
                None => now - chrono::Duration::days(window_days.max(overlap_days)),
            };
            params.push(("dateFrom", start.date_naive().to_string()));
            params.push(("dateTo", now.date_naive().to_string()));
        } else if supports_modified_after(collection.path) {
            let since = match last_checkpoint {
                Some(last) => last - chrono::Duration::days(overlap_days),
                None => now - chrono::Duration::days(window_days),
            };
            params.push(("modifiedAfter", since.to_rfc3339()));
            used_modified_after = true;
        }

        let fetch_params = params.clone();
        let mut rows = match runn.fetch_collection(collection.path, &fetch_params, collection.single_object).await {
            Ok(rows) => rows,
            Err(e) => {
                summary.errors.insert(collection.table.to_string(), e.to_string());
                continue;
            }
        };

        // A tenant without reliable updatedAt timestamps can make a
        // delta-enabled, non-windowed collection look permanently empty;
        // retry once without modifiedAfter before accepting that.
        if rows.is_empty() && used_modified_after {
            let retry_params: Vec<(&str, String)> = params.iter().filter(|(k, _)| *k != "modifiedAfter").cloned().collect();
            rows = match runn.fetch_collection(collection.path, &retry_params, collection.single_object).await {
                Ok(rows) => rows,
                Err(e) => {
                    summary.errors.insert(collection.table.to_string(), e.to_string());
                    continue;
                }
            };
        }

        let rows = normalize_rows(rows, collection.pk_field);

        if let (true, Some(scope)) = (is_backfill_target, backfill) {
            if let Err(e) = warehouse
                .purge_scope(collection.table, &scope.date_from.to_string(), &scope.date_to.to_string(), scope.person_id.as_deref())
                .await
            {
                summary.errors.insert(collection.table.to_string(), e.to_string());
                continue;
            }
        }

        match warehouse
            .load_merge(collection.table, &rows, collection.pk_field, collection.ts_field, collection.partition_field)
            .await
        {
            Ok(count) => {
                summary.loaded.insert(collection.table.to_string(), count);
            }
            Err(e) => {
                summary.errors.insert(collection.table.to_string(), e.to_string());
                continue;
            }
        }

        if let Some(mark) = newest_updated_at(&rows) {
            checkpoint.advance(collection.table, mark);
        } else if last_checkpoint.is_none() {
            checkpoint.advance(collection.table, now);
        }
    }

    if let Err(e) = checkpoint.save(store).await {
        summary.errors.insert("checkpoint".to_string(), e.to_string());
    }

    log_info!(
        loaded = summary.loaded.len(),
        errors = summary.errors.len(),
        "warehouse mirror run complete"
    );
    summary
}

/// Attaches the raw object under `raw`, synthesizes `pk_field` from a
/// content hash when the row doesn't carry one, and falls back
/// `updatedAt` to `createdAt` so every row carries a usable MERGE
/// timestamp even when the source collection only stamps creation time.
fn normalize_rows(rows: Vec<Value>, pk_field: &str) -> Vec<Value> {
    rows.into_iter().map(|row| normalize_row(row, pk_field)).collect()
}

fn normalize_row(row: Value, pk_field: &str) -> Value {
    let Value::Object(mut map) = row else {
        return row;
    };
    let raw = Value::Object(map.clone());

    let has_pk = map.get(pk_field).is_some_and(|v| !v.is_null());
    if !has_pk {
        let synthesized = content_hash(&raw).unwrap_or_default();
        map.insert(pk_field.to_string(), Value::String(synthesized));
    }

    let has_updated_at = map.get("updatedAt").is_some_and(|v| !v.is_null());
    if !has_updated_at {
        if let Some(created_at) = map.get("createdAt").cloned() {
            map.insert("updatedAt".to_string(), created_at);
        }
    }

    map.insert("raw".to_string(), raw);
    Value::Object(map)
}

fn newest_updated_at(rows: &[Value]) -> Option<DateTime<Utc>> {
    rows.iter()
        .filter_map(|row| {
            row.get("updatedAt")
                .or_else(|| row.get("updated_at"))
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
        })
        .max()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(&raw[..raw.len().min(10)], "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_after_support_matches_known_collections() {
        assert!(supports_modified_after("/actuals/"));
        assert!(supports_modified_after("/contracts/"));
        assert!(!supports_modified_after("/people/"));
    }

    #[test]
    fn date_window_support_is_narrower_than_modified_after() {
        assert!(accepts_date_window("/actuals/"));
        assert!(!accepts_date_window("/contracts/"));
    }

    #[test]
    fn newest_updated_at_picks_the_latest_row() {
        let rows = vec![
            serde_json::json!({"updatedAt": "2026-01-01T00:00:00Z"}),
            serde_json::json!({"updatedAt": "2026-02-01T00:00:00Z"}),
        ];
        let newest = newest_updated_at(&rows).unwrap();
        assert_eq!(newest.date_naive().to_string(), "2026-02-01");
    }

    #[test]
    fn normalize_synthesizes_pk_when_missing() {
        let row = serde_json::json!({"email": "ann@acme.com"});
        let normalized = normalize_row(row, "id");
        let pk = normalized.get("id").and_then(Value::as_str).unwrap();
        assert_eq!(pk.len(), 64);
        assert!(normalized.get("raw").is_some());
    }

    #[test]
    fn normalize_leaves_existing_pk_untouched() {
        let row = serde_json::json!({"id": 7, "email": "ann@acme.com"});
        let normalized = normalize_row(row, "id");
        assert_eq!(normalized.get("id").and_then(Value::as_u64), Some(7));
    }

    #[test]
    fn normalize_falls_back_updated_at_to_created_at() {
        let row = serde_json::json!({"id": 7, "createdAt": "2026-01-01T00:00:00Z"});
        let normalized = normalize_row(row, "id");
        assert_eq!(normalized.get("updatedAt").and_then(Value::as_str), Some("2026-01-01T00:00:00Z"));
    }
}
