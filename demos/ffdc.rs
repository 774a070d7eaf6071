//! First-failure data capture example.
//!
//! The same failure is reported several times from one source and probe,
//! but only the first occurrence produces an incident file. Application
//! state is captured through the `Introspect` trait, with secrets masked.

use std::sync::Arc;
use tracing_router::{
    DiagnosticModule, Introspect, Introspector, LogConfig, Sensitive, Throwable, TraceService,
};

struct Session {
    user: String,
    token: Sensitive<String>,
    retries: u32,
}

impl Introspect for Session {
    fn type_name(&self) -> &str {
        "Session"
    }

    fn introspect(&self, out: &mut Introspector) {
        out.field("user", &self.user);
        out.sensitive("token", "String");
        out.field("retries", &self.retries);
    }
}

struct CacheModule;

impl DiagnosticModule for CacheModule {
    fn name(&self) -> &str {
        "cache-stats"
    }

    fn dump(&self, _throwable: &Throwable, _caller: Option<&dyn Introspect>, out: &mut Introspector) {
        out.field("entries", &1024);
        out.field("hit_ratio", &0.93);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = LogConfig::builder()
        .with_log_directory(dir.path())
        .with_copy_system_streams(false)
        .build()?;
    let service = TraceService::new(config)?;
    service
        .ffdc()
        .register_diagnostic_module("app::cache", Arc::new(CacheModule));

    println!("=== FFDC Example ===\n");

    let session = Session {
        user: "alice".into(),
        token: Sensitive::new("s3cr3t".into()),
        retries: 2,
    };
    let failure = Throwable::new("CacheMiss", "key not found: user:alice")
        .with_frames(["app::cache::get", "app::web::profile"]);

    for attempt in 1..=5 {
        let file = service.process_exception(&failure, "app::cache::get", "17", Some(&session), &[]);
        match file {
            Some(path) => println!("attempt {}: incident written to {}", attempt, path.display()),
            None => println!("attempt {}: duplicate, counted only", attempt),
        }
    }
    assert_eq!(session.token.expose(), "s3cr3t");

    for incident in service.ffdc().incidents() {
        println!("\n{} seen {} time(s)", incident.key, incident.count);
        if let Some(path) = incident.files.first() {
            println!("--- {} ---", path.display());
            print!("{}", std::fs::read_to_string(path)?);
        }
    }

    if let Some(summary) = service.ffdc().log_summary(true) {
        println!("\n--- {} ---", summary.display());
        print!("{}", std::fs::read_to_string(summary)?);
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
