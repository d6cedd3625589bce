//! Error types for the sync engine.
//!
//! Every remote adapter, reconciler handler, dispatcher route and batch job
//! returns [`SyncResult`]. Errors are categorized so callers can decide
//! whether to retry, skip, or surface a failure without inspecting variants
//! directly.

use crate::logging::{log_error, log_warn};
use thiserror::Error;

/// High-level categorization of errors, used for retry/skip routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Upstream entity absent or in a state that does not warrant a write.
    BusinessLogic,
    /// Remote system failure (network, 5xx, unexpected payload shape).
    External,
    /// Bug or invariant violation in this process.
    Internal,
    /// Caller/config mistake (missing env var, bad signature, bad request).
    Client,
    /// Should be retried with backoff (429, timeout, network blip).
    Transient,
}

/// Severity for logging/alerting decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Critical,
    Error,
    Warning,
    Info,
}

/// Convenient result type used throughout the crate.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while synchronizing HR data across systems.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Startup/env configuration is missing or malformed. Fatal.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A remote HTTP call failed (network, TLS, or non-retryable status).
    #[error("request to {remote} failed: {message}")]
    RequestFailed {
        remote: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A remote returned a body this process could not parse.
    #[error("could not parse {remote} response: {message}")]
    ResponseParsing {
        remote: &'static str,
        message: String,
    },

    /// Rate limit hit; retry after the given number of seconds.
    #[error("rate limited by {remote}, retry after {retry_after_seconds}s")]
    RateLimited {
        remote: &'static str,
        retry_after_seconds: u64,
    },

    /// Request exceeded its deadline.
    #[error("request to {remote} timed out after {timeout_seconds}s")]
    Timeout {
        remote: &'static str,
        timeout_seconds: u64,
    },

    /// Inbound signature verification failed (ATS webhook HMAC).
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// State store (object storage) read/write failure.
    #[error("state store error on key {key}: {message}")]
    StateStore { key: String, message: String },

    /// SFTP transport/auth failure while uploading a snapshot.
    #[error("sftp error: {message}")]
    Sftp { message: String },

    /// Warehouse load/MERGE failure.
    #[error("warehouse error on {collection}: {message}")]
    Warehouse { collection: String, message: String },
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Client,
            Self::RequestFailed { .. } => ErrorCategory::External,
            Self::ResponseParsing { .. } => ErrorCategory::External,
            Self::RateLimited { .. } => ErrorCategory::Transient,
            Self::Timeout { .. } => ErrorCategory::Transient,
            Self::AuthenticationFailed { .. } => ErrorCategory::Client,
            Self::StateStore { .. } => ErrorCategory::External,
            Self::Sftp { .. } => ErrorCategory::External,
            Self::Warehouse { .. } => ErrorCategory::External,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Configuration { .. } => ErrorSeverity::Critical,
            Self::RequestFailed { .. } => ErrorSeverity::Error,
            Self::ResponseParsing { .. } => ErrorSeverity::Warning,
            Self::RateLimited { .. } => ErrorSeverity::Warning,
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::AuthenticationFailed { .. } => ErrorSeverity::Warning,
            Self::StateStore { .. } => ErrorSeverity::Error,
            Self::Sftp { .. } => ErrorSeverity::Error,
            Self::Warehouse { .. } => ErrorSeverity::Error,
        }
    }

    /// Whether C1's retry executor should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::RequestFailed { .. }
        )
    }

    // -- constructors, logging as they're created (mirrors the old LlmError pattern) --

    pub fn configuration(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(error_type = "configuration", message = %message, "configuration invalid");
        Self::Configuration { message }
    }

    pub fn request_failed(
        remote: &'static str,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let message = message.into();
        log_error!(remote = remote, message = %message, "remote request failed");
        Self::RequestFailed {
            remote,
            message,
            source,
        }
    }

    pub fn response_parsing(remote: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(remote = remote, message = %message, "could not parse remote response");
        Self::ResponseParsing { remote, message }
    }

    pub fn rate_limited(remote: &'static str, retry_after_seconds: u64) -> Self {
        log_warn!(remote = remote, retry_after_seconds, "rate limited");
        Self::RateLimited {
            remote,
            retry_after_seconds,
        }
    }

    pub fn timeout(remote: &'static str, timeout_seconds: u64) -> Self {
        log_warn!(remote = remote, timeout_seconds, "request timed out");
        Self::Timeout {
            remote,
            timeout_seconds,
        }
    }

    pub fn authentication_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(message = %message, "authentication failed");
        Self::AuthenticationFailed { message }
    }

    pub fn state_store(key: impl Into<String>, message: impl Into<String>) -> Self {
        let key = key.into();
        let message = message.into();
        log_error!(key = %key, message = %message, "state store operation failed");
        Self::StateStore { key, message }
    }

    pub fn sftp(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(message = %message, "sftp operation failed");
        Self::Sftp { message }
    }

    pub fn warehouse(collection: impl Into<String>, message: impl Into<String>) -> Self {
        let collection = collection.into();
        let message = message.into();
        log_error!(collection = %collection, message = %message, "warehouse operation failed");
        Self::Warehouse { collection, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_retryable() {
        let err = SyncError::rate_limited("runn", 30);
        assert!(err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Transient);
    }

    #[test]
    fn configuration_is_not_retryable() {
        let err = SyncError::configuration("missing CHARTHOP_API_TOKEN");
        assert!(!err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn authentication_is_client_category() {
        let err = SyncError::authentication_failed("bad hmac");
        assert_eq!(err.category(), ErrorCategory::Client);
        assert!(!err.is_retryable());
    }
}
