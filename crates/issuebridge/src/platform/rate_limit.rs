use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default rate limits per remote (requests per second).
pub mod rate_limits {
    /// Airtable: 5 requests per second per base.
    pub const AIRTABLE_DEFAULT_RPS: u32 = 5;
    /// Jira Cloud does not publish a fixed quota; stay polite.
    pub const JIRA_DEFAULT_RPS: u32 = 10;
}

/// A shared API rate limiter using the governor crate.
///
/// Clients call [`ApiRateLimiter::wait`] before every request. Clones share
/// the same quota.
///
/// # Example
///
/// ```ignore
/// use issuebridge::platform::{ApiRateLimiter, rate_limits};
///
/// let limiter = ApiRateLimiter::new(rate_limits::AIRTABLE_DEFAULT_RPS);
/// limiter.wait().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter with the specified requests per second.
    ///
    /// A value of 0 is treated as 1.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rps));

        Self {
            inner: Arc::new(rate_limiter),
        }
    }

    /// Wait until a request is allowed by the rate limiter.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}
