//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)
//! - Storage and eviction for the incident registry
//! - Rolling log files, console output and captured print streams
//! - Tracing integration (Layer trait)

pub mod clock;
pub mod eviction;
pub mod file_log_set;
pub mod layer;
pub mod raw;
pub mod storage;
pub mod tee;
pub(crate) mod visitor;
pub mod writer;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides a controllable clock plus routers,
/// sinks and writers that record what the routing core hands them.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// tracing-router = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
