//! Domain layer - pure logic with no I/O.
//!
//! This layer contains the core concepts of the routing pipeline:
//! - Severity levels and the event model
//! - Message resolution and layout rendering
//! - Trace specifications
//! - Incident deduplication and summary policy
//!
//! All types in this layer are pure and easily testable.

pub mod event;
pub mod format;
pub mod incident;
pub mod introspect;
pub mod level;
pub mod message;
pub mod natural;
pub mod summary;
pub mod trace_spec;
