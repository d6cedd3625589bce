use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::store::StateStore;
use crate::error::SyncResult;
use crate::logging::log_info;
use crate::model::TimeOffCategory;

const MAPPING_KEY: &str = "timeoff_mapping.json";

/// One ChartHop time-off entry's mapping into its created Runn counterpart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeOffMappingEntry {
    pub runn_id: u64,
    pub category: TimeOffCategory,
    pub person_email: String,
    pub created_at: DateTime<Utc>,
}

/// Bidirectional ChartHop id <-> Runn id mapping, persisted as a single
/// JSON object. Needed because updates and deletes in ChartHop must be
/// applied to the matching Runn time-off row, and Runn has no concept of
/// a ChartHop id to look the row up by.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeOffMapping {
    ch_to_runn: HashMap<String, TimeOffMappingEntry>,
    runn_to_ch: HashMap<String, String>,
}

impl TimeOffMapping {
    pub async fn load(store: &StateStore) -> SyncResult<Self> {
        Ok(store.get_json(MAPPING_KEY).await?.unwrap_or_default())
    }

    async fn save(&self, store: &StateStore) -> SyncResult<()> {
        store.put_json(MAPPING_KEY, self).await
    }

    pub async fn add(
        &mut self,
        store: &StateStore,
        charthop_id: &str,
        runn_id: u64,
        category: TimeOffCategory,
        person_email: &str,
    ) -> SyncResult<()> {
        let entry = TimeOffMappingEntry {
            runn_id,
            category,
            person_email: person_email.to_string(),
            created_at: Utc::now(),
        };
        self.ch_to_runn.insert(charthop_id.to_string(), entry);
        self.runn_to_ch
            .insert(runn_id.to_string(), charthop_id.to_string());
        self.save(store).await?;
        log_info!(charthop_id = %charthop_id, runn_id, "timeoff mapping added");
        Ok(())
    }

    pub fn get_runn(&self, charthop_id: &str) -> Option<&TimeOffMappingEntry> {
        self.ch_to_runn.get(charthop_id)
    }

    pub fn get_charthop_id(&self, runn_id: u64) -> Option<&str> {
        self.runn_to_ch.get(&runn_id.to_string()).map(String::as_str)
    }

    pub async fn remove(&mut self, store: &StateStore, charthop_id: &str) -> SyncResult<bool> {
        let Some(entry) = self.ch_to_runn.remove(charthop_id) else {
            return Ok(false);
        };
        self.runn_to_ch.remove(&entry.runn_id.to_string());
        self.save(store).await?;
        log_info!(charthop_id = %charthop_id, "timeoff mapping removed");
        Ok(true)
    }

    /// Drops mappings whose `created_at` is older than `days`. Runn
    /// creates have no natural expiry, but a time-off entry that old has
    /// long since passed and the mapping is just dead weight.
    pub async fn cleanup_old(&mut self, store: &StateStore, days: i64) -> SyncResult<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let stale: Vec<String> = self
            .ch_to_runn
            .iter()
            .filter(|(_, entry)| entry.created_at < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            if let Some(entry) = self.ch_to_runn.remove(id) {
                self.runn_to_ch.remove(&entry.runn_id.to_string());
            }
        }
        if !stale.is_empty() {
            self.save(store).await?;
            log_info!(count = stale.len(), "cleaned up stale timeoff mappings");
        }
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bidirectional_lookup_is_consistent() {
        let mut mapping = TimeOffMapping::default();
        mapping.ch_to_runn.insert(
            "ch-1".to_string(),
            TimeOffMappingEntry {
                runn_id: 42,
                category: TimeOffCategory::Leave,
                person_email: "a@x.com".to_string(),
                created_at: Utc::now(),
            },
        );
        mapping
            .runn_to_ch
            .insert("42".to_string(), "ch-1".to_string());
        assert_eq!(mapping.get_runn("ch-1").unwrap().runn_id, 42);
        assert_eq!(mapping.get_charthop_id(42), Some("ch-1"));
    }
}
