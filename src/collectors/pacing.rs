//! Per-collector outbound pacing.
//!
//! Wraps a governor token bucket. Every collector acquires a permit before
//! each outbound call, so spacing holds after failed calls too.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Clone)]
pub struct Pacer {
    limiter: Arc<DirectRateLimiter>,
}

impl Pacer {
    /// One permit per `interval`, no bursting.
    pub fn steady(interval: Duration) -> Self {
        Self::with_burst(interval, 1)
    }

    /// `size` permits available at once, refilled evenly over `pause`.
    pub fn grouped(size: u32, pause: Duration) -> Self {
        let size = size.max(1);
        Self::with_burst(pause / size, size)
    }

    fn with_burst(period: Duration, burst: u32) -> Self {
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(burst);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wait until the next outbound call is allowed.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}
