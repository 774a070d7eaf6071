//! # tracing-router
//!
//! Log and trace routing, rolling log files and first-failure data capture
//! for the `tracing` ecosystem.
//!
//! The crate is built around a single routing core, [`TraceService`]. Every
//! record enters it once and is fanned out to:
//!
//! - **message routers** that can observe or veto normal delivery,
//! - a **structured log sink** and a **structured trace sink**,
//! - the **console**, filtered by a minimum severity,
//! - a rolling **message log** and a rolling **trace log**.
//!
//! Exceptions handed to [`TraceService::process_exception`] are deduplicated
//! into incidents; the first occurrence of each distinct failure writes an
//! FFDC (first-failure data capture) file and a periodic summary table lists
//! every incident seen.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tracing_router::{LogConfig, TraceService, TraceServiceLayer};
//! use tracing_subscriber::prelude::*;
//!
//! let config = LogConfig::builder()
//!     .with_log_directory("logs")
//!     .with_trace_specification("*=info:my_app::db=all")
//!     .build()
//!     .unwrap();
//! let service = TraceService::new(config).unwrap();
//!
//! tracing_subscriber::registry()
//!     .with(TraceServiceLayer::new(service.clone()))
//!     .init();
//!
//! tracing::info!("server started");          // console (if >= console level), messages.log
//! tracing::debug!(target: "my_app::db", "query plan"); // trace.log only
//! ```
//!
//! ## Severities
//!
//! Records carry one of the [`Level`]s FINEST, FINER, FINE, EVENT, DETAIL,
//! CONFIG, INFO, AUDIT, WARNING, ERROR and FATAL, plus the `SystemOut` and
//! `SystemErr` pseudo-levels used for captured print streams. INFO and above
//! are *messages*; anything finer is trace-only.
//!
//! The tracing layer maps `ERROR`, `WARN`, `INFO`, `DEBUG` and `TRACE` to
//! ERROR, WARNING, INFO, FINE and FINEST respectively.
//!
//! ## Trace Specifications
//!
//! A trace specification is a colon-separated list of `component=level`
//! clauses, for example `*=info:my_app::db=all:noisy=off`. The longest
//! matching component prefix wins; `*` (or an empty component) is the
//! default clause. Levels are the severity names above plus `all` and `off`.
//!
//! ## Routing Order
//!
//! For each message the service:
//!
//! 1. formats it once (placeholders like `{0}` are filled from parameters),
//! 2. calls the external, then the internal message router; if either returns
//!    `false` the message is not delivered further,
//! 3. sends messages whose id is listed in `hide_message_ids` to the trace
//!    path only,
//! 4. publishes to the log sink, the console and the message log,
//! 5. forwards to the trace path if the trace specification enables it.
//!
//! Until the first router is registered, records are kept in a small early
//! buffer and handed to that router. Unadopted records are dropped five
//! minutes after start-up.
//!
//! Routers and sinks run behind per-path reentrancy limits, so a router that
//! logs cannot recurse without bound. A router that fails or panics is treated
//! as if it let the message through and is bypassed by a circuit breaker
//! after repeated failures.
//!
//! ## Rolling Files
//!
//! The message and trace logs roll on start-up and when they reach
//! `max_file_size_mb`. Rolled files are named
//! `<base>_<yy.MM.dd_HH.mm.ss>.<n><ext>` and at most `max_files` of them are
//! kept. Setting `trace_file_name` to `stdout` sends trace output to the
//! console instead.
//!
//! ## First-Failure Data Capture
//!
//! ```rust,no_run
//! # use tracing_router::{LogConfig, TraceService, Throwable};
//! # let service = TraceService::new(LogConfig::default()).unwrap();
//! let failure = Throwable::new("PoolExhausted", "no connections left")
//!     .with_frames(["db::pool::acquire", "api::handler"]);
//! if let Some(file) = service.process_exception(&failure, "db::pool", "42", None, &[]) {
//!     eprintln!("incident written to {}", file.display());
//! }
//! ```
//!
//! Incidents are keyed by exception type, source id and probe id. Repeats of
//! the same failure only bump the incident's counter. At most 500 incidents
//! are tracked; the least recently seen are evicted at the daily roll.
//! Objects implementing [`Introspect`] can be passed to add their state to the
//! incident file, and [`DiagnosticModule`]s registered for a source-id prefix
//! contribute component-specific detail.
//!
//! ## Observability
//!
//! [`TraceService::metrics`] exposes counters for routed, vetoed and hidden
//! messages, reentrancy drops, router and sink failures and FFDC activity.
//! The crate's own diagnostics are emitted on the
//! `tracing_router::internal` target, which the provided layer ignores.
//!
//! ## Periodic Maintenance
//!
//! With the `async` feature, `Housekeeper::start` runs summary checks,
//! early-buffer expiry and the daily FFDC roll on a tokio interval. Without
//! it, call [`TraceService::housekeep`] from your own scheduler.

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    event::{LogEvent, Param, ResourceBundle, RoutedMessage, Throwable, Traceable},
    format::{ConsoleFormat, Formatter, MessageFormat, TraceFormat},
    incident::{IncidentKey, IncidentSnapshot},
    introspect::{Introspect, Introspector, Sensitive},
    level::{Level, ParseLevelError},
    natural::natural_cmp,
    summary::{SummaryPolicy, SummaryPolicyError},
    trace_spec::{TraceSpec, TraceSpecError},
};

pub use application::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, Guarded},
    config::{ConfigError, HeaderInfo, LogConfig, LogConfigBuilder},
    ffdc::FfdcService,
    housekeeping::{Housekeeper, HousekeepingConfig, HousekeepingConfigError, ShutdownError},
    metrics::{Metrics, MetricsSnapshot},
    ports::{
        Clock, DiagnosticModule, EvictionCandidate, EvictionPolicy, LogPublisher, LogSink,
        LogWriter, MessageRouter, RouterError, SinkError, Storage, TraceRouter, TraceSink,
    },
    registry::IncidentRegistry,
    service::{TraceService, TraceServiceBuilder},
};

#[cfg(feature = "async")]
pub use application::housekeeping::HousekeepingHandle;

pub use infrastructure::{
    clock::SystemClock,
    eviction::LruEviction,
    file_log_set::FileLogSet,
    layer::{TraceServiceLayer, TraceServiceLayerBuilder},
    storage::ShardedStorage,
    tee::TeeStream,
    writer::{ConsoleWriter, FileLogWriter},
};
