//! Rolling file example.
//!
//! A small size limit forces the message log to roll several times. Only
//! `max_files` files are kept: the active file plus the newest dated ones.

use std::sync::Arc;
use tracing_router::infrastructure::writer::FileWriterSettings;
use tracing_router::{FileLogWriter, Level, LogWriter, SystemClock};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let writer = FileLogWriter::open(
        dir.path(),
        "messages.log",
        FileWriterSettings {
            max_files: 3,
            max_size: Some(256),
            header: Some("*** rolling example ***\n".to_string()),
        },
        Arc::new(SystemClock::new()),
    );

    println!("=== Rolling Files Example ===\n");

    for i in 0..40 {
        writer.write_record(Level::Info, &format!("record {:03} with some padding text", i))?;
    }
    writer.close()?;

    let mut names: Vec<String> = std::fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort_by(|a, b| tracing_router::natural_cmp(a, b));

    println!("Files on disk:");
    for name in &names {
        println!("  {}", name);
    }
    println!("\nRolled files tracked: {}", writer.rolled_files().len());
    println!("Active file: {}", writer.path().display());

    println!("\n=== Example Complete ===");
    Ok(())
}
