use crate::canonical::content_hash;
use crate::error::SyncResult;
use crate::state::StateStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MANIFEST_KEY: &str = "culture_amp/manifest.json";

/// Column order of the Culture Amp roster export. Both the `Full` and
/// `Delta` export modes write this exact header row.
pub const SNAPSHOT_COLUMNS: [&str; 15] = [
    "Employee Id",
    "Email",
    "Name",
    "Preferred Name",
    "Manager Email",
    "Manager",
    "Location",
    "Job Title",
    "Seniority",
    "Start Date",
    "End Date",
    "Department",
    "Country",
    "Employment Type",
    "Gender",
];

/// One flattened row of the Culture Amp roster export, derived from an
/// active [`crate::model::Person`]. Rows without a work email are dropped
/// upstream of this type: Culture Amp is addressed by corporate email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub employee_id: String,
    pub email: String,
    pub name: String,
    pub preferred_name: String,
    pub manager_email: String,
    pub manager: String,
    pub location: String,
    pub job_title: String,
    pub seniority: String,
    pub start_date: String,
    pub end_date: String,
    pub department: String,
    pub country: String,
    pub employment_type: String,
    pub gender: String,
}

impl SnapshotRow {
    pub fn to_csv_record(&self) -> [String; 15] {
        [
            self.employee_id.clone(),
            self.email.clone(),
            self.name.clone(),
            self.preferred_name.clone(),
            self.manager_email.clone(),
            self.manager.clone(),
            self.location.clone(),
            self.job_title.clone(),
            self.seniority.clone(),
            self.start_date.clone(),
            self.end_date.clone(),
            self.department.clone(),
            self.country.clone(),
            self.employment_type.clone(),
            self.gender.clone(),
        ]
    }

    /// Content hash of every column except the id, so the manifest diff
    /// catches any field change without the id itself needing to move.
    pub fn content_hash(&self) -> serde_json::Result<String> {
        let mut without_id = self.clone();
        without_id.employee_id.clear();
        content_hash(&without_id)
    }
}

/// One tracked row in the persisted snapshot manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifestEntry {
    pub content_hash: String,
    pub hris_person_id: String,
    pub last_row: SnapshotRow,
}

/// Persisted record of the last full/delta export, keyed by Employee Id,
/// used to compute which rows changed, were added, or were removed since
/// the previous run. A missing manifest (first run, or one that failed to
/// load) is treated as an empty one: `previous \ current` is then empty,
/// so nothing is reported as removed on a cold start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub entries: HashMap<String, SnapshotManifestEntry>,
}

/// Outcome of diffing a freshly computed row set against a manifest.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDelta {
    pub added: Vec<SnapshotRow>,
    pub changed: Vec<SnapshotRow>,
    pub removed: Vec<String>,
}

impl SnapshotManifest {
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn load(store: &StateStore) -> SyncResult<Self> {
        Ok(store.get_json(MANIFEST_KEY).await?.unwrap_or_default())
    }

    pub async fn save(&self, store: &StateStore) -> SyncResult<()> {
        store.put_json(MANIFEST_KEY, self).await
    }

    /// Computes the delta between the current row set and this manifest,
    /// and returns the manifest that should be persisted afterward.
    /// `current` pairs each row with the HRIS person id it was derived
    /// from, since the manifest tracks that linkage for termination
    /// lookups independent of the Employee Id formatting.
    pub fn diff(&self, current: &[(SnapshotRow, String)]) -> (SnapshotDelta, SnapshotManifest) {
        let mut delta = SnapshotDelta::default();
        let mut next = SnapshotManifest::empty();
        let mut seen = std::collections::HashSet::new();

        for (row, hris_person_id) in current {
            seen.insert(row.employee_id.clone());
            let hash = row.content_hash().unwrap_or_default();
            match self.entries.get(&row.employee_id) {
                Some(prev) if prev.content_hash == hash => {}
                Some(_) => delta.changed.push(row.clone()),
                None => delta.added.push(row.clone()),
            }
            next.entries.insert(
                row.employee_id.clone(),
                SnapshotManifestEntry {
                    content_hash: hash,
                    hris_person_id: hris_person_id.clone(),
                    last_row: row.clone(),
                },
            );
        }

        for employee_id in self.entries.keys() {
            if !seen.contains(employee_id) {
                delta.removed.push(employee_id.clone());
            }
        }

        (delta, next)
    }

    /// Looks up the HRIS person id behind a removed Employee Id, for the
    /// termination-date lookup a delta export performs before writing a
    /// tombstone row.
    pub fn hris_person_id_for(&self, employee_id: &str) -> Option<&str> {
        self.entries
            .get(employee_id)
            .map(|e| e.hris_person_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, title: &str) -> SnapshotRow {
        SnapshotRow {
            employee_id: id.to_string(),
            email: "a@x.com".to_string(),
            name: "A B".to_string(),
            preferred_name: String::new(),
            manager_email: String::new(),
            manager: String::new(),
            location: String::new(),
            job_title: title.to_string(),
            seniority: String::new(),
            start_date: "2024-01-01".to_string(),
            end_date: String::new(),
            department: "Eng".to_string(),
            country: "AR".to_string(),
            employment_type: "employee".to_string(),
            gender: String::new(),
        }
    }

    #[test]
    fn missing_manifest_reports_everything_as_added() {
        let manifest = SnapshotManifest::empty();
        let current = vec![(row("e1", "Engineer"), "p1".to_string())];
        let (delta, _) = manifest.diff(&current);
        assert_eq!(delta.added.len(), 1);
        assert!(delta.changed.is_empty());
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn unchanged_row_produces_no_delta() {
        let r = row("e1", "Engineer");
        let manifest = SnapshotManifest::empty();
        let current = vec![(r.clone(), "p1".to_string())];
        let (_, next) = manifest.diff(&current);
        let (delta2, _) = next.diff(&current);
        assert!(delta2.added.is_empty());
        assert!(delta2.changed.is_empty());
        assert!(delta2.removed.is_empty());
    }

    #[test]
    fn changed_field_is_reported_once() {
        let r1 = row("e1", "Engineer");
        let manifest = SnapshotManifest::empty();
        let (_, next) = manifest.diff(&[(r1, "p1".to_string())]);
        let r2 = row("e1", "Senior Engineer");
        let (delta, _) = next.diff(&[(r2, "p1".to_string())]);
        assert_eq!(delta.changed.len(), 1);
        assert!(delta.added.is_empty());
    }

    #[test]
    fn row_absent_from_current_is_removed() {
        let r = row("e1", "Engineer");
        let manifest = SnapshotManifest::empty();
        let (_, next) = manifest.diff(&[(r, "p1".to_string())]);
        let (delta, _) = next.diff(&[]);
        assert_eq!(delta.removed, vec!["e1".to_string()]);
        assert_eq!(next.hris_person_id_for("e1"), Some("p1"));
    }
}
