//! Raw diagnostics that bypass the routing pipeline.
//!
//! Failures inside the logging machinery cannot be logged through it without
//! risking recursion, so they are written straight to the process stderr.

use std::fmt::Display;
use std::io::Write;

/// Target of the crate's own `tracing` diagnostics. The provided layer ignores it.
pub const INTERNAL_TARGET: &str = "tracing_router::internal";

/// Write a one-line diagnostic to the real stderr. Never fails.
pub fn report(context: &str, error: &dyn Display) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle, "[tracing-router] {}: {}", context, error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_never_panics() {
        report("test", &std::io::Error::new(std::io::ErrorKind::Other, "ignored"));
    }
}
