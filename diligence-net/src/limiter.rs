//! Per-host request spacing
//!
//! The limiter keeps the time of the latest reserved request for each host.
//! A caller reserves the next free slot under the map's shard lock and then
//! sleeps outside it, so concurrent callers to one host queue up in order
//! while other hosts are never delayed.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
pub struct RateLimiter {
    min_spacing: Duration,
    slots: DashMap<String, Instant>,
}

impl RateLimiter {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            slots: DashMap::new(),
        }
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Reserve the next slot for `host` and return how long to wait for it
    pub fn reserve(&self, host: &str) -> Duration {
        let now = Instant::now();
        match self.slots.entry(host.to_string()) {
            Entry::Occupied(mut slot) => {
                let next = (*slot.get() + self.min_spacing).max(now);
                slot.insert(next);
                next - now
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                Duration::ZERO
            }
        }
    }

    /// Wait until a request to `host` is allowed
    pub async fn acquire(&self, host: &str) {
        let wait = self.reserve(host);
        if !wait.is_zero() {
            debug!("Rate limiting {} for {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Time of the latest reserved request for `host`
    pub fn last_request(&self, host: &str) -> Option<Instant> {
        self.slots.get(host).map(|slot| *slot)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
