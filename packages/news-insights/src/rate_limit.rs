//! Rate limiter implementations.
//!
//! - `FixedDelay`: minimum spacing between calls, plus optional random jitter
//! - `GovernorLimiter`: token bucket using the governor crate
//! - `Unlimited`: no pacing

use async_trait::async_trait;
use governor::{Quota, RateLimiter as Governor};
use rand::Rng;
use std::num::NonZeroU32;
use std::ops::Range;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::traits::rate_limit::RateLimiter;

type DirectGovernor = Governor<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Spaces calls at least `delay` (plus jitter) apart. The first call goes
/// through immediately.
///
/// Concurrent callers queue on the limiter and are released one at a time.
pub struct FixedDelay {
    delay: Duration,
    jitter: Option<Range<u64>>,
    next_slot: Mutex<Option<Instant>>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: None,
            next_slot: Mutex::new(None),
        }
    }

    /// Add a uniformly random extra wait drawn from `jitter_ms`.
    pub fn with_jitter(mut self, jitter_ms: Range<u64>) -> Self {
        self.jitter = (!jitter_ms.is_empty()).then_some(jitter_ms);
        self
    }

    /// Politeness delay for page downloads: 5 s plus 2 to 4.9 s of jitter.
    pub fn for_downloads(base: Duration) -> Self {
        Self::new(base).with_jitter(2_000..4_900)
    }

    fn spacing(&self) -> Duration {
        let extra = match &self.jitter {
            Some(range) => rand::rng().random_range(range.clone()),
            None => 0,
        };
        self.delay + Duration::from_millis(extra)
    }
}

#[async_trait]
impl RateLimiter for FixedDelay {
    async fn acquire(&self) {
        let mut next_slot = self.next_slot.lock().await;
        if let Some(at) = *next_slot {
            tokio::time::sleep_until(at).await;
        }
        let spacing = self.spacing();
        *next_slot = Some(Instant::now() + spacing);
    }
}

/// Token-bucket limiter.
pub struct GovernorLimiter {
    limiter: DirectGovernor,
}

impl GovernorLimiter {
    /// `requests_per_second` of zero is treated as one.
    pub fn per_second(requests_per_second: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(Quota::per_second(rate))
    }

    pub fn with_quota(quota: Quota) -> Self {
        Self {
            limiter: Governor::direct(quota),
        }
    }
}

#[async_trait]
impl RateLimiter for GovernorLimiter {
    async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

/// No pacing at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn acquire(&self) {}
}
