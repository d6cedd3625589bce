//! Persisted state: the blob-backed object store, the snapshot manifest,
//! the time-off id mapping, the warehouse checkpoint, and rolling sync
//! metrics. Everything here round-trips through canonical JSON so writes
//! are deterministic and diffable.

mod checkpoint;
mod metrics;
mod store;
mod timeoff_mapping;

pub use checkpoint::WarehouseCheckpoint;
pub use metrics::SyncMetrics;
pub use store::StateStore;
pub use timeoff_mapping::{TimeOffMapping, TimeOffMappingEntry};
