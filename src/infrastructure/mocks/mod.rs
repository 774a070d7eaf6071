//! Mock implementations for testing.
//!
//! This module provides test doubles for the clock and for every pluggable
//! collaborator of the routing core.

pub mod capture;
pub mod clock;

pub use capture::{CaptureMessageRouter, CaptureSink, CaptureTraceRouter, MemoryWriter, RouterBehavior};
pub use clock::MockClock;
