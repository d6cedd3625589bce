use crate::error::{SyncError, SyncResult};
use crate::logging::{log_debug, log_warn};
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Thin wrapper over a GCS bucket used as the durable key-value store for
/// everything this process needs to remember between runs: the snapshot
/// manifest, the time-off id mapping, the warehouse checkpoint, and sync
/// metrics. A missing object is not an error — callers treat it as "no
/// prior state" and fall back to an empty default.
pub struct StateStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl StateStore {
    pub fn new(bucket: impl Into<String>) -> SyncResult<Self> {
        let bucket = bucket.into();
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&bucket)
            .build()
            .map_err(|e| SyncError::state_store(&bucket, format!("failed to init GCS client: {e}")))?;
        Ok(Self {
            store: Arc::new(store),
            bucket,
        })
    }

    /// Wraps an already-constructed store, for tests and for callers that
    /// need a local or in-memory backend instead of GCS.
    pub fn from_object_store(bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> SyncResult<Option<T>> {
        let path = ObjectPath::from(key);
        match self.store.get(&path).await {
            Ok(result) => {
                let bytes = result
                    .bytes()
                    .await
                    .map_err(|e| SyncError::state_store(key, format!("failed to read body: {e}")))?;
                match serde_json::from_slice(&bytes) {
                    Ok(value) => Ok(Some(value)),
                    Err(e) => {
                        log_warn!(key = %key, error = %e, "state object failed to parse, treating as absent");
                        Ok(None)
                    }
                }
            }
            Err(object_store::Error::NotFound { .. }) => {
                log_debug!(bucket = %self.bucket, key = %key, "no prior state object");
                Ok(None)
            }
            Err(e) => Err(SyncError::state_store(key, format!("GCS get failed: {e}"))),
        }
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> SyncResult<()> {
        let json = crate::canonical::canonical_json(value)
            .map_err(|e| SyncError::state_store(key, format!("failed to serialize: {e}")))?;
        let path = ObjectPath::from(key);
        self.store
            .put(&path, json.into_bytes().into())
            .await
            .map_err(|e| SyncError::state_store(key, format!("GCS put failed: {e}")))?;
        Ok(())
    }
}
