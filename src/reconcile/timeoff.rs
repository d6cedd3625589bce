//! HRIS-to-planner time-off reconciliation: every ChartHop time-off entry
//! becomes a Runn time-off of the matching category, tracked through a
//! persistent id mapping so later updates and deletes land on the same row.

use crate::logging::{log_info, log_warn};
use crate::model::{TimeOff, TimeOffCategory};
use crate::remote::{ChartHopClient, RunnClient};
use crate::state::{StateStore, SyncMetrics, TimeOffMapping};

/// Outcome of reconciling a single ChartHop time-off entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoffOutcome {
    Synced,
    Updated,
    Skipped(String),
    Error(String),
}

#[derive(Debug, Default)]
pub struct TimeoffSyncSummary {
    pub processed: usize,
    pub synced: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl TimeoffSyncSummary {
    fn record(&mut self, outcome: &TimeoffOutcome) {
        self.processed += 1;
        match outcome {
            TimeoffOutcome::Synced => self.synced += 1,
            TimeoffOutcome::Updated => self.updated += 1,
            TimeoffOutcome::Skipped(_) => self.skipped += 1,
            TimeoffOutcome::Error(_) => self.errors += 1,
        }
    }
}

/// Reconciles every entry in `entries`, updating the mapping and metrics
/// in place and returning a roll-up summary.
pub async fn sync_entries(
    charthop: &ChartHopClient,
    runn: &RunnClient,
    mapping: &mut TimeOffMapping,
    store: &StateStore,
    metrics: &mut SyncMetrics,
    entries: &[TimeOff],
) -> TimeoffSyncSummary {
    let mut summary = TimeoffSyncSummary::default();
    for entry in entries {
        let outcome = sync_entry(charthop, runn, mapping, store, entry).await;
        match &outcome {
            TimeoffOutcome::Synced => metrics.increment("timeoff_synced"),
            TimeoffOutcome::Updated => metrics.increment("timeoff_updated"),
            TimeoffOutcome::Skipped(_) => metrics.increment("timeoff_skipped"),
            TimeoffOutcome::Error(reason) => {
                metrics.increment("timeoff_errors");
                metrics.record_error("timeoff", reason.clone(), entry.id.clone());
            }
        }
        summary.record(&outcome);
    }
    metrics.record_sync("timeoff_batch");
    summary
}

/// Reconciles one ChartHop time-off entry: resolves its Runn person,
/// picks the endpoint category, and either updates the previously mapped
/// row or creates a new one.
pub async fn sync_entry(
    charthop: &ChartHopClient,
    runn: &RunnClient,
    mapping: &mut TimeOffMapping,
    store: &StateStore,
    entry: &TimeOff,
) -> TimeoffOutcome {
    if let Some(reason) = entry.should_skip() {
        log_info!(entry_id = %entry.id, reason = %reason, "timeoff skipped");
        return TimeoffOutcome::Skipped(reason);
    }

    let email = match resolve_email(charthop, entry).await {
        Some(email) => email,
        None => return TimeoffOutcome::Skipped("missing email".to_string()),
    };

    let person = match runn.find_person_by_email(&email).await {
        Ok(Some(person)) => person,
        Ok(None) => return TimeoffOutcome::Skipped("person not found in runn".to_string()),
        Err(e) => return TimeoffOutcome::Error(e.to_string()),
    };

    let Some(start_date) = entry.start_date.clone() else {
        return TimeoffOutcome::Skipped("missing start date".to_string());
    };
    let end_date = entry.end_date.clone().unwrap_or_else(|| start_date.clone());
    let category = TimeOffCategory::classify(&entry.classification_text());
    let note = entry.derive_note();

    if let Some(existing) = mapping.get_runn(&entry.id) {
        let runn_id = existing.runn_id;
        let existing_category = existing.category;
        return match runn.update_timeoff(runn_id, existing_category, &start_date, &end_date).await {
            Ok(()) => {
                log_info!(entry_id = %entry.id, runn_id, "timeoff updated");
                TimeoffOutcome::Updated
            }
            Err(e) => TimeoffOutcome::Error(e.to_string()),
        };
    }

    if let Ok(existing) = runn.list_person_timeoffs(person.id, category).await {
        if overlaps(&existing, &start_date, &end_date) {
            log_info!(email = %email, start_date = %start_date, end_date = %end_date, "timeoff overlaps an existing entry, runn will merge");
        }
    }

    match runn
        .create_timeoff(person.id, &start_date, &end_date, 480, &note, category)
        .await
    {
        Ok(runn_id) => {
            if let Err(e) = mapping.add(store, &entry.id, runn_id, category, &email).await {
                log_warn!(entry_id = %entry.id, error = %e, "timeoff synced but mapping persist failed");
            }
            TimeoffOutcome::Synced
        }
        Err(e) => TimeoffOutcome::Error(e.to_string()),
    }
}

/// Removes a ChartHop time-off's mapped Runn counterpart. A missing
/// mapping means the entry was never synced, which is a no-op rather
/// than an error.
pub async fn delete_entry(
    runn: &RunnClient,
    mapping: &mut TimeOffMapping,
    store: &StateStore,
    metrics: &mut SyncMetrics,
    charthop_id: &str,
) -> TimeoffOutcome {
    let Some(existing) = mapping.get_runn(charthop_id) else {
        metrics.increment("timeoff_skipped");
        return TimeoffOutcome::Skipped("no mapping found".to_string());
    };
    let runn_id = existing.runn_id;
    let category = existing.category;

    match runn.delete_timeoff(runn_id, category).await {
        Ok(()) => {
            let _ = mapping.remove(store, charthop_id).await;
            metrics.increment("timeoff_deleted");
            metrics.record_sync("timeoff_delete");
            TimeoffOutcome::Synced
        }
        Err(e) => {
            metrics.increment("timeoff_errors");
            metrics.record_error("timeoff_delete", e.to_string(), charthop_id.to_string());
            TimeoffOutcome::Error(e.to_string())
        }
    }
}

async fn resolve_email(charthop: &ChartHopClient, entry: &TimeOff) -> Option<String> {
    if let Some(email) = &entry.person_email {
        if !email.trim().is_empty() {
            return Some(email.trim().to_string());
        }
    }
    let person_id = entry.person_id.as_ref()?;
    let person = charthop.find_person(person_id).await.ok().flatten()?;
    person.primary_email().map(str::to_string)
}

fn overlaps(existing: &[serde_json::Value], start_date: &str, end_date: &str) -> bool {
    existing.iter().any(|entry| {
        let to_start = entry.get("startDate").and_then(serde_json::Value::as_str).unwrap_or("");
        let to_end = entry.get("endDate").and_then(serde_json::Value::as_str).unwrap_or("");
        to_start <= end_date && to_end >= start_date
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlap_detects_intersecting_ranges() {
        let existing = vec![json!({"startDate": "2026-01-05", "endDate": "2026-01-10"})];
        assert!(overlaps(&existing, "2026-01-08", "2026-01-12"));
        assert!(!overlaps(&existing, "2026-01-11", "2026-01-12"));
    }
}
