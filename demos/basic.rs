//! Basic example routing `tracing` events into rolling log files.
//!
//! Messages at INFO and above land in `messages.log`, while a trace
//! specification enables fine-grained tracing for the `app::db` component
//! only. Everything is written under a temporary directory that is printed
//! at the end.

use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use tracing_subscriber::prelude::*;
use tracing_router::{LogConfig, TraceFormat, TraceService, TraceServiceLayer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;

    let config = LogConfig::builder()
        .with_log_directory(dir.path())
        .with_trace_specification("*=info:app::db=all")
        .with_trace_format(TraceFormat::Enhanced)
        .build()?;
    let service = TraceService::new(config)?;

    tracing_subscriber::registry()
        .with(TraceServiceLayer::new(Arc::clone(&service)))
        .init();

    println!("=== Basic Routing Example ===\n");

    info!(target: "app::web", "Server listening on port {}", 8080);
    debug!(target: "app::web", "Not traced: app::web stays at info");
    debug!(target: "app::db", "Connection pool warmed up");
    trace!(target: "app::db", rows = 3, "Query finished");

    let span = tracing::info_span!("request", correlation_id = "uow-42");
    span.in_scope(|| {
        warn!(target: "app::web", "Slow request");
    });

    service.close();

    for name in ["messages.log", "trace.log"] {
        let path = dir.path().join(name);
        println!("--- {} ---", path.display());
        print!("{}", std::fs::read_to_string(&path)?);
        println!();
    }

    let metrics = service.metrics().snapshot();
    println!("Messages routed: {}", metrics.messages_routed);
    println!("Traces written:  {}", metrics.traces_written);

    println!("\n=== Example Complete ===");
    Ok(())
}
