//! Retry logic with exponential backoff and a circuit breaker.
//!
//! Every C1 adapter call goes through a [`RetryExecutor`] configured by a
//! [`RetryPolicy`]:
//! - Exponential backoff: `min(2^(n-1), 30)` seconds, honoring `Retry-After`
//!   when the remote supplies one (callers fold that into the error before
//!   it reaches here via [`crate::error::SyncError::RateLimited`]).
//! - Max 5 attempts by default.
//! - Circuit breaker: 5 consecutive failures opens the circuit for 30s.

use crate::error::{SyncError, SyncResult};
use crate::logging::{log_debug, log_error, log_warn};

use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Retry policy configuration for a single remote adapter.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling for the exponential backoff delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt (2.0 => doubling).
    pub backoff_multiplier: f64,
    /// Hard ceiling on the whole retry loop, independent of attempt count.
    pub total_timeout: Duration,
    /// Per-attempt deadline.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            total_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy for warehouse loads, which need a longer per-attempt
    /// deadline (45-60s) than the default 30s.
    pub fn warehouse() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            ..Self::default()
        }
    }
}

/// Circuit breaker states.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker shared by a single adapter's retry executor.
#[derive(Debug)]
pub(crate) struct CircuitBreaker {
    pub(crate) state: CircuitState,
    pub(crate) failure_count: u32,
    pub(crate) last_failure_time: Option<Instant>,
    pub(crate) failure_threshold: u32,
    pub(crate) recovery_timeout: Duration,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreaker {
    pub fn should_allow_request(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.check_recovery_timeout(),
            CircuitState::HalfOpen => true,
        }
    }

    fn check_recovery_timeout(&mut self) -> bool {
        let Some(last_failure) = self.last_failure_time else {
            return false;
        };

        if last_failure.elapsed() >= self.recovery_timeout {
            log_debug!(
                circuit_breaker = "transitioning_to_half_open",
                recovery_timeout_seconds = self.recovery_timeout.as_secs(),
                "circuit breaker attempting recovery"
            );
            self.state = CircuitState::HalfOpen;
            true
        } else {
            false
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::HalfOpen => {
                log_debug!(circuit_breaker = "recovered", "circuit breaker closed again");
                self.state = CircuitState::Closed;
                self.failure_count = 0;
                self.last_failure_time = None;
            }
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::Open => {
                self.failure_count = 0;
                self.last_failure_time = None;
            }
        }
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_time = Some(Instant::now());

        if self.failure_count >= self.failure_threshold && self.state != CircuitState::Open {
            log_warn!(
                circuit_breaker = "opened",
                failure_count = self.failure_count,
                failure_threshold = self.failure_threshold,
                "circuit breaker opened due to repeated failures"
            );
        }
        if self.failure_count >= self.failure_threshold {
            self.state = CircuitState::Open;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.clone()
    }
}

/// Executes a fallible async operation with retry, backoff, and circuit
/// breaking applied. One instance is owned per adapter (behind a
/// `tokio::sync::Mutex` since adapters are shared across requests).
#[derive(Debug)]
pub struct RetryExecutor {
    pub(crate) policy: RetryPolicy,
    pub(crate) circuit_breaker: CircuitBreaker,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            circuit_breaker: CircuitBreaker::default(),
        }
    }

    /// Run `operation`, retrying on retryable [`SyncError`]s per policy.
    ///
    /// `operation` is re-invoked from scratch on each attempt - it must be
    /// safe to call more than once (the adapters it wraps issue a fresh
    /// HTTP request per call, which is idempotent by construction here:
    /// GETs are naturally idempotent, and writes are retried only when the
    /// remote never received/committed the prior attempt).
    pub async fn execute<F, Fut, T>(&mut self, operation: F) -> SyncResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = SyncResult<T>>,
    {
        let start_time = Instant::now();
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.policy.max_attempts {
            self.check_circuit_breaker()?;
            self.check_total_timeout(&start_time)?;

            attempt += 1;

            match self
                .execute_single_attempt(&operation, attempt, &mut last_error)
                .await
            {
                Ok(response) => return Ok(response),
                Err(should_continue) => {
                    if !should_continue {
                        break;
                    }
                }
            }
        }

        self.handle_exhausted_retries(attempt, last_error, &start_time)
    }

    async fn execute_single_attempt<F, Fut, T>(
        &mut self,
        operation: &F,
        attempt: u32,
        last_error: &mut Option<SyncError>,
    ) -> Result<T, bool>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = SyncResult<T>>,
    {
        log_debug!(
            attempt = attempt,
            max_attempts = self.policy.max_attempts,
            circuit_state = ?self.circuit_breaker.state(),
            "executing request with retry logic"
        );

        let operation_start = Instant::now();
        let result = tokio::time::timeout(self.policy.request_timeout, operation()).await;

        match result {
            Ok(Ok(response)) => {
                self.circuit_breaker.record_success();
                log_debug!(
                    attempt = attempt,
                    duration_ms = operation_start.elapsed().as_millis(),
                    "request succeeded"
                );
                Ok(response)
            }
            Ok(Err(error)) => Err(self.handle_error(error, attempt, last_error).await),
            Err(_timeout) => Err(self.handle_timeout(attempt, last_error).await),
        }
    }

    fn check_circuit_breaker(&mut self) -> SyncResult<()> {
        if !self.circuit_breaker.should_allow_request() {
            return Err(SyncError::request_failed(
                "circuit_breaker",
                "circuit breaker is open - remote temporarily unavailable",
                None,
            ));
        }
        Ok(())
    }

    fn check_total_timeout(&mut self, start_time: &Instant) -> SyncResult<()> {
        if start_time.elapsed() >= self.policy.total_timeout {
            return Err(SyncError::timeout(
                "retry_executor",
                self.policy.total_timeout.as_secs(),
            ));
        }
        Ok(())
    }

    async fn handle_error(
        &mut self,
        error: SyncError,
        attempt: u32,
        last_error: &mut Option<SyncError>,
    ) -> bool {
        let should_retry = error.is_retryable();
        // Honor Retry-After exactly when the remote gave us one.
        let explicit_delay = match &error {
            SyncError::RateLimited {
                retry_after_seconds,
                ..
            } => Some(Duration::from_secs(*retry_after_seconds)),
            _ => None,
        };
        *last_error = Some(error);

        if should_retry && attempt < self.policy.max_attempts {
            self.circuit_breaker.record_failure();
            let delay = explicit_delay.unwrap_or_else(|| self.calculate_delay(attempt));
            log_debug!(
                attempt = attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis(),
                error = ?last_error.as_ref(),
                "request failed, retrying after delay"
            );
            sleep(delay).await;
            true
        } else {
            self.circuit_breaker.record_failure();
            false
        }
    }

    async fn handle_timeout(&mut self, attempt: u32, last_error: &mut Option<SyncError>) -> bool {
        let timeout_error = SyncError::timeout("retry_executor", self.policy.request_timeout.as_secs());
        *last_error = Some(timeout_error);

        if attempt < self.policy.max_attempts {
            self.circuit_breaker.record_failure();
            let delay = self.calculate_delay(attempt);
            log_debug!(
                attempt = attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis(),
                "request timed out, retrying after delay"
            );
            sleep(delay).await;
            true
        } else {
            self.circuit_breaker.record_failure();
            false
        }
    }

    fn handle_exhausted_retries<T>(
        &mut self,
        attempt: u32,
        last_error: Option<SyncError>,
        start_time: &Instant,
    ) -> SyncResult<T> {
        let final_error = last_error.unwrap_or_else(|| {
            SyncError::request_failed("retry_executor", "maximum retry attempts exceeded", None)
        });

        log_error!(
            attempts = attempt,
            total_duration_ms = start_time.elapsed().as_millis(),
            circuit_state = ?self.circuit_breaker.state(),
            error = %final_error,
            "request failed after all retry attempts"
        );

        Err(final_error)
    }

    /// `min(initial_delay * multiplier^(attempt-1), max_delay)`, plus up to
    /// 10% jitter to avoid synchronized retries across workers.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_seconds = self.policy.initial_delay.as_secs_f64()
            * self.policy.backoff_multiplier.powi((attempt - 1) as i32);

        let delay = Duration::from_secs_f64(delay_seconds.min(self.policy.max_delay.as_secs_f64()));

        let jitter = fastrand::f64() * 0.1;
        Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_caps_at_max() {
        let executor = RetryExecutor::new(RetryPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            ..RetryPolicy::default()
        });
        let delay = executor.calculate_delay(10);
        assert!(delay <= Duration::from_secs_f64(33.0));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let mut executor = RetryExecutor::new(RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            request_timeout: Duration::from_secs(1),
            ..RetryPolicy::default()
        });
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = executor
            .execute(|| {
                let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(SyncError::timeout("test", 1))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let mut executor = RetryExecutor::default();
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: SyncResult<()> = executor
            .execute(|| {
                attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move { Err(SyncError::authentication_failed("bad key")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
