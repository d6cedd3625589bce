use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::store::StateStore;
use crate::error::SyncResult;

const METRICS_KEY: &str = "sync_metrics.json";
const MAX_RECENT_ERRORS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    pub entity_id: String,
}

/// Rolling counters and a bounded error log, persisted alongside the rest
/// of the process state. Exposed at the dispatcher's `/health` route so an
/// operator can see recent throughput and failures without a log search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncMetrics {
    pub last_sync: HashMap<String, DateTime<Utc>>,
    pub counters: HashMap<String, u64>,
    pub last_errors: Vec<ErrorRecord>,
}

impl SyncMetrics {
    pub async fn load(store: &StateStore) -> SyncResult<Self> {
        Ok(store.get_json(METRICS_KEY).await?.unwrap_or_default())
    }

    pub async fn save(&self, store: &StateStore) -> SyncResult<()> {
        store.put_json(METRICS_KEY, self).await
    }

    pub fn increment(&mut self, counter: &str) {
        self.increment_by(counter, 1);
    }

    pub fn increment_by(&mut self, counter: &str, amount: u64) {
        *self.counters.entry(counter.to_string()).or_insert(0) += amount;
    }

    pub fn record_sync(&mut self, sync_type: &str) {
        self.last_sync.insert(sync_type.to_string(), Utc::now());
    }

    /// Appends an error, keeping only the most recent [`MAX_RECENT_ERRORS`]
    /// so the metrics object doesn't grow without bound across long-lived
    /// deployments.
    pub fn record_error(&mut self, kind: &str, message: impl Into<String>, entity_id: impl Into<String>) {
        self.last_errors.push(ErrorRecord {
            timestamp: Utc::now(),
            kind: kind.to_string(),
            message: message.into(),
            entity_id: entity_id.into(),
        });
        if self.last_errors.len() > MAX_RECENT_ERRORS {
            let overflow = self.last_errors.len() - MAX_RECENT_ERRORS;
            self.last_errors.drain(0..overflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_log_is_capped() {
        let mut metrics = SyncMetrics::default();
        for i in 0..(MAX_RECENT_ERRORS + 10) {
            metrics.record_error("timeoff", "boom", i.to_string());
        }
        assert_eq!(metrics.last_errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(metrics.last_errors.last().unwrap().entity_id, (MAX_RECENT_ERRORS + 9).to_string());
    }

    #[test]
    fn counters_increment_independently() {
        let mut metrics = SyncMetrics::default();
        metrics.increment("timeoff_synced");
        metrics.increment("timeoff_synced");
        metrics.increment("timeoff_errors");
        assert_eq!(metrics.counters["timeoff_synced"], 2);
        assert_eq!(metrics.counters["timeoff_errors"], 1);
    }
}
