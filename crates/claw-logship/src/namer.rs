//! Monthly collection naming and the clock it reads.

use chrono::{DateTime, Datelike, Utc};
use parking_lot::Mutex;

/// Source of wall-clock time for collection naming.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock fixed at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Returns `<prefix>-<YYYY>-<MM>` for the month containing `now`.
#[must_use]
pub fn collection_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}-{:04}-{:02}", now.year(), now.month())
}
