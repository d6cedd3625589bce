//! Reconciliation logic that turns fetched remote state into the writes
//! that keep the HRIS, ATS, planner, and engagement platform consistent.
//! Each submodule owns one concern and takes adapter references rather
//! than a shared context, so it can be exercised directly in tests.

pub mod compensation;
pub mod ctc;
pub mod hire;
pub mod person;
pub mod timeoff;
