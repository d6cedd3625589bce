//! Event ingestion and dispatch: webhook authentication, event
//! classification, durable task enqueue, and the worker endpoint that
//! drains the queue into the reconciler.

pub mod classify;
pub mod http;
pub mod tasks;
pub mod webhook;

pub use classify::{HrisEvent, HrisEventKind};
pub use tasks::{TaskKind, TaskPayload};
