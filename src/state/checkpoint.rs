use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::store::StateStore;
use crate::error::SyncResult;

const CHECKPOINT_KEY: &str = "warehouse/checkpoints.json";

/// Per-collection high-water mark for the warehouse mirror, keyed by
/// collection name (e.g. `runn_actuals`, `runn_assignments`). Each value
/// is the latest `updatedAt` seen across that collection's last load,
/// used to compute the next run's `since` filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarehouseCheckpoint {
    marks: HashMap<String, DateTime<Utc>>,
}

impl WarehouseCheckpoint {
    pub async fn load(store: &StateStore) -> SyncResult<Self> {
        Ok(store.get_json(CHECKPOINT_KEY).await?.unwrap_or_default())
    }

    pub async fn save(&self, store: &StateStore) -> SyncResult<()> {
        store.put_json(CHECKPOINT_KEY, self).await
    }

    pub fn last_success(&self, collection: &str) -> Option<DateTime<Utc>> {
        self.marks.get(collection).copied()
    }

    /// Advances the checkpoint for `collection` to `candidate`, but only
    /// forward: a candidate older than the current mark (e.g. derived
    /// from a short or empty page) never moves it backward.
    pub fn advance(&mut self, collection: &str, candidate: DateTime<Utc>) {
        let entry = self.marks.entry(collection.to_string()).or_insert(candidate);
        if candidate > *entry {
            *entry = candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn advance_never_moves_backward() {
        let mut cp = WarehouseCheckpoint::default();
        let t1 = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        cp.advance("runn_actuals", t1);
        cp.advance("runn_actuals", t0);
        assert_eq!(cp.last_success("runn_actuals"), Some(t1));
    }

    #[test]
    fn unknown_collection_has_no_checkpoint() {
        let cp = WarehouseCheckpoint::default();
        assert_eq!(cp.last_success("runn_actuals"), None);
    }
}
