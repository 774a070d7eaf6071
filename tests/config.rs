//! Configuration parsing and live reconfiguration of a running service.

use std::fs;
use std::sync::Arc;
use tracing_router::infrastructure::mocks::{MemoryWriter, MockClock};
use tracing_router::{
    ConfigError, ConsoleFormat, Level, LogConfig, LogEvent, MessageFormat, TraceFormat,
    TraceService,
};

#[test]
fn test_json_config_with_defaults() {
    let config = LogConfig::from_json(
        r#"{
            "log_directory": "/var/log/app",
            "trace_specification": "*=info:db=finest",
            "trace_format": "ADVANCED",
            "console_level": "WARNING",
            "hide_message_ids": ["CWWKF0012I"],
            "message_format": "JSON"
        }"#,
    )
    .unwrap();

    assert_eq!(config.trace_format, TraceFormat::Advanced);
    assert_eq!(config.console_level, Level::Warning);
    assert_eq!(config.message_format, MessageFormat::Json);
    assert_eq!(config.console_format, ConsoleFormat::default());
    assert!(config.is_hidden("CWWKF0012I"));
    assert_eq!(config.max_files, 2);
    assert_eq!(config.message_file_name, "messages.log");
    assert!(config.trace_spec().is_loggable("db", Level::Finest));
    assert_eq!(config.ffdc_directory(), std::path::Path::new("/var/log/app/ffdc"));
}

#[test]
fn test_json_config_errors() {
    assert!(matches!(
        LogConfig::from_json("{ not json"),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        LogConfig::from_json(r#"{"trace_specification": "*=shout"}"#),
        Err(ConfigError::TraceSpec(_))
    ));
    assert!(matches!(
        LogConfig::from_json(r#"{"message_file_name": "../escape.log"}"#),
        Err(ConfigError::FileNameHasSeparator(_))
    ));
}

#[test]
fn test_update_moves_log_directory() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let config = |dir: &std::path::Path| {
        LogConfig::builder()
            .with_log_directory(dir)
            .with_copy_system_streams(false)
            .build()
            .unwrap()
    };
    let service = TraceService::builder()
        .with_config(config(first.path()))
        .with_clock(Arc::new(MockClock::new()))
        .with_console_writer(Arc::new(MemoryWriter::new()))
        .build()
        .unwrap();

    service.publish_log_record(LogEvent::new(Level::Info, "app", "before move", service.clock().now()));
    service.update_config(config(second.path())).unwrap();
    service.publish_log_record(LogEvent::new(Level::Info, "app", "after move", service.clock().now()));
    service.close();

    let old = fs::read_to_string(first.path().join("messages.log")).unwrap();
    let new = fs::read_to_string(second.path().join("messages.log")).unwrap();
    assert!(old.contains("before move") && !old.contains("after move"));
    assert!(new.contains("after move") && !new.contains("before move"));
}

#[test]
fn test_update_changes_trace_spec_and_format() {
    let dir = tempfile::tempdir().unwrap();
    let trace = MemoryWriter::new();
    let service = TraceService::builder()
        .with_config(
            LogConfig::builder()
                .with_log_directory(dir.path())
                .with_copy_system_streams(false)
                .build()
                .unwrap(),
        )
        .with_console_writer(Arc::new(MemoryWriter::new()))
        .with_message_writer(Arc::new(MemoryWriter::new()))
        .with_trace_writer(Arc::new(trace.clone()))
        .build()
        .unwrap();

    service.publish_log_record(LogEvent::new(Level::Fine, "db", "first", service.clock().now()));
    assert!(trace.lines().is_empty());

    let updated = LogConfig::builder()
        .with_log_directory(dir.path())
        .with_trace_specification("db=fine")
        .with_trace_format(TraceFormat::Advanced)
        .with_copy_system_streams(false)
        .build()
        .unwrap();
    service.update_config(updated).unwrap();
    assert!(service.is_trace_enabled("db", Level::Fine));
    service.publish_log_record(
        LogEvent::new(Level::Fine, "db", "second", service.clock().now())
            .with_correlation_id("uow-1"),
    );

    let lines = trace.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("UOW=uow-1"));
    assert!(lines[0].contains("\n          second"));
}
