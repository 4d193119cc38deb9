//! Shared request limiter for all provider clients.
//!
//! Every worker thread goes through one limiter, so the provider's
//! requests-per-second budget holds no matter how many workers run. The
//! limiter hands out evenly spaced time slots: each `acquire` reserves the
//! next free slot under the lock and then sleeps outside it.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Limiter for `requests_per_second`. Returns `None` for zero, negative
    /// or non-finite rates, which mean "unlimited".
    pub fn per_second(requests_per_second: f64) -> Option<Self> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return None;
        }
        Some(Self::new(Duration::from_secs_f64(1.0 / requests_per_second)))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Blocks until the caller may send one request. Returns how long it waited.
    pub fn acquire(&self) -> Duration {
        let wait = {
            let mut next = self.next_slot.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            thread::sleep(wait);
        }
        wait
    }
}
