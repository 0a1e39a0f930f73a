//! Time sources for `lastUpdate` and instance timestamps.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of wall-clock milliseconds
pub trait TimeSource: Send + Sync + std::fmt::Debug {
    /// Current time as Unix milliseconds
    fn now_ms(&self) -> u64;
}

/// The system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A clock that only moves when told to
///
/// Useful for exercising same-millisecond writes.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    /// Start at `ms`
    #[must_use]
    pub fn new(ms: u64) -> Self {
        Self(AtomicU64::new(ms))
    }

    /// Jump to `ms` (may go backwards)
    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::SeqCst);
    }

    /// Move forward by `ms`
    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Next value of a strictly increasing timestamp
///
/// Follows the clock when it moves forward and falls back to `previous + 1`
/// when it stalls or goes backwards.
#[must_use]
pub fn next_timestamp(previous: u64, now: u64) -> u64 {
    now.max(previous.saturating_add(1))
}
