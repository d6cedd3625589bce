//! Token-bucket rate limiting for the planner adapter.
//!
//! A 100 req / 60s token bucket protects the planner adapter, with a
//! `wait_if_needed` that blocks the calling handler before each call.
//! Built on `governor`, already part of the dependency stack this crate
//! inherited.

use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type Limiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A cloneable token-bucket limiter. Clones share the same bucket.
#[derive(Clone)]
pub struct TokenBucket {
    limiter: Arc<Limiter>,
}

impl TokenBucket {
    /// `max_requests` tokens are available per `per` duration.
    pub fn new(max_requests: u32, per: Duration) -> Self {
        let one = NonZeroU32::new(1).expect("1 is nonzero");
        let per_secs = per.as_secs().max(1);
        let period = Duration::from_secs_f64(per_secs as f64 / max_requests.max(1) as f64);
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(one))
            .allow_burst(NonZeroU32::new(max_requests).unwrap_or(one));
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Matches the spec's `wait_if_needed` naming: blocks the caller until a
    /// token is available, then returns.
    pub async fn wait_if_needed(&self) {
        self.limiter.until_ready().await;
    }
}

/// The planner adapter runs under a 100 req / 60s bucket.
pub fn planner_default() -> TokenBucket {
    TokenBucket::new(100, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_burst_up_to_capacity() {
        let bucket = TokenBucket::new(5, Duration::from_secs(60));
        for _ in 0..5 {
            bucket.wait_if_needed().await;
        }
    }
}
