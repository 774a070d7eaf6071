//! Clock adapters for time operations.
//!
//! Provides `SystemClock` for production use.
//!
//! # Testing
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a controllable test clock.
//! Available with the `test-helpers` feature or in test builds:
//!
//! ```toml
//! [dev-dependencies]
//! tracing-router = { version = "*", features = ["test-helpers"] }
//! ```

use crate::application::ports::Clock;
use chrono::{DateTime, Local};

/// System clock reading local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
