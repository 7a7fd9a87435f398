//! Time sources
//!
//! Every deadline the engine checks (expiry, oracle staleness) is compared
//! against a [`Clock`] so that identical state and inputs always produce
//! identical results.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Seconds in a year (365.25 days)
pub const SECONDS_PER_YEAR: f64 = 31_557_600.0;

/// Source of the current unix time in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Manually driven clock for simulations and tests
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicU64,
}

impl FixedClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::Release);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::AcqRel);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

/// Time between `now` and `expiration` in years (negative once expired)
#[inline]
pub fn years_until(expiration: u64, now: u64) -> f64 {
    (expiration as f64 - now as f64) / SECONDS_PER_YEAR
}

/// Monotonic nanoseconds since the first call in this process
///
/// Only used for latency bookkeeping, never for pricing.
#[inline]
pub fn get_timestamp_ns() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}
