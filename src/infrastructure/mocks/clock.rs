//! Mock clock for testing.

use crate::application::ports::Clock;
use chrono::{DateTime, Local, TimeZone};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, which makes dated
/// file names and summary intervals deterministic.
///
/// # Examples
///
/// ```
/// use tracing_router::infrastructure::mocks::MockClock;
/// use tracing_router::application::ports::Clock;
/// use std::time::Duration;
///
/// let clock = MockClock::new();
/// let start = clock.now();
///
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now(), start + chrono::Duration::seconds(10));
/// ```
///
/// All clones share the same underlying time value.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<DateTime<Local>>>,
}

impl MockClock {
    /// Create a mock clock starting at 2026-01-15 10:00:00 local time.
    pub fn new() -> Self {
        let start = Local
            .with_ymd_and_hms(2026, 1, 15, 10, 0, 0)
            .earliest()
            .unwrap_or_else(Local::now);
        Self::at(start)
    }

    /// Create a mock clock starting at a specific time.
    pub fn at(start: DateTime<Local>) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time = *time + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }

    /// Current mock time.
    pub fn now(&self) -> DateTime<Local> {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }

    /// Set the clock to a specific time.
    pub fn set(&self, time: DateTime<Local>) {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock") =
            time;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Local> {
        MockClock::now(self)
    }
}
