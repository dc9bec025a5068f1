use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::ClockError;

/// 2000-01-01T00:00:00Z. Readings before this are treated as unsynchronized.
pub const PLAUSIBLE_AFTER: i64 = 946_684_800;

/// Source of the current Unix time in seconds.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now_unix(&self) -> i64;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock that only moves when told to. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    /// Creates a clock reading `now`.
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self(Arc::new(AtomicI64::new(now)))
    }

    /// Sets the reading.
    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    /// Moves the reading forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Returns `now` unchanged if it is late enough to date a token.
///
/// # Errors
///
/// [`ClockError::Implausible`] for readings before [`PLAUSIBLE_AFTER`].
pub const fn check_plausible(now: i64) -> Result<i64, ClockError> {
    if now < PLAUSIBLE_AFTER {
        Err(ClockError::Implausible { now })
    } else {
        Ok(now)
    }
}
