//! Request rate cap
//!
//! Token bucket with a bucket of one, so requests are spaced evenly instead
//! of bursting. Off unless `api.requests_per_second` is set; the per-page
//! throttle is separate and lives in the downloader.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Caps outgoing requests per second
#[derive(Clone)]
pub struct RateLimiter {
    per_second: NonZeroU32,
    limiter: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Allow at most `requests` per second; zero is raised to one
    pub fn per_second(requests: u32) -> Self {
        let per_second = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(NonZeroU32::MIN);

        Self {
            per_second,
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Requests allowed per second
    pub fn requests_per_second(&self) -> u32 {
        self.per_second.get()
    }

    /// Wait for the next request slot
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a slot if one is free right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("per_second", &self.per_second)
            .finish_non_exhaustive()
    }
}
