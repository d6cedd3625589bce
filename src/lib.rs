//! # hrsync
//!
//! A multi-tenant HR data integration hub that keeps an HRIS, an ATS, a
//! resource planner, an engagement platform, and a BigQuery-style
//! warehouse mutually consistent.
//!
//! ## Components
//!
//! - [`remote`] — typed HTTP adapters for every remote system (C1)
//! - [`state`] — durable key/value state backed by object storage (C2)
//! - [`reconcile`] — pure(-ish) translation handlers (C3)
//! - [`dispatch`] — webhook ingestion, task enqueue, worker routing (C4)
//! - [`batch`] — the Culture Amp snapshot export and warehouse mirror (C5)
//!
//! ## Example
//!
//! ```rust,no_run
//! use hrsync::config::AppConfig;
//! use hrsync::context::AppContext;
//! use hrsync::state::StateStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AppConfig::from_env()?;
//! let store = StateStore::new(config.state_bucket.clone())?;
//! let ctx = AppContext::new(config, store);
//! let _ = ctx.charthop.list_active_people().await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod canonical;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod remote;
pub mod state;

pub(crate) mod internals;
pub(crate) mod logging;

pub use config::AppConfig;
pub use context::AppContext;
pub use error::{SyncError, SyncResult};
