//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Routing core (message and trace delivery)
//! - Incident registry and FFDC capture
//! - Configuration, early buffering and reentrancy limits
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters and embedders implement. Routers, sinks, writers and the
//! clock all plug in through them.

pub mod buffer;
pub mod circuit_breaker;
pub mod config;
pub mod ffdc;
pub mod guard;
pub mod housekeeping;
pub mod metrics;
pub mod ports;
pub mod registry;
pub mod service;
