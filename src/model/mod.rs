//! Core data model shared across remote adapters, reconciliation, and
//! batch export.
//!
//! These are fixed record structs rather than dynamic field dictionaries:
//! a typed struct per entity plus a small reflective serializer for the
//! flattened CSV row ([`SnapshotRow::to_csv_record`]).

mod hire_event;
mod job;
mod person;
mod snapshot;
mod timeoff;

pub use hire_event::HireEvent;
pub use job::Job;
pub use person::{HiringScheme, Person};
pub use snapshot::{SnapshotManifest, SnapshotManifestEntry, SnapshotRow, SNAPSHOT_COLUMNS};
pub use timeoff::{TimeOff, TimeOffCategory, TimeOffStatus};
