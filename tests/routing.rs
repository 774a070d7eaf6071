//! End-to-end routing through the service, the tracing layer and real files.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, warn};
use tracing_router::infrastructure::mocks::{
    CaptureMessageRouter, CaptureSink, MemoryWriter, MockClock, RouterBehavior,
};
use tracing_router::{
    Formatter, Level, LogConfig, LogEvent, MessageRouter, RoutedMessage, RouterError,
    TraceFormat, TraceService, TraceServiceLayer,
};
use tracing_subscriber::layer::SubscriberExt;

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

fn file_service(dir: &Path, spec: &str) -> Arc<TraceService> {
    let config = LogConfig::builder()
        .with_log_directory(dir)
        .with_trace_specification(spec)
        .with_copy_system_streams(false)
        .build()
        .unwrap();
    TraceService::builder()
        .with_config(config)
        .with_clock(Arc::new(MockClock::new()))
        .with_console_writer(Arc::new(MemoryWriter::new()))
        .build()
        .unwrap()
}

#[test]
fn test_layer_writes_message_and_trace_files() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_service(dir.path(), "*=info:routing=all");
    let subscriber = tracing_subscriber::registry().with(TraceServiceLayer::new(service.clone()));

    tracing::subscriber::with_default(subscriber, || {
        info!("server started");
        debug!(rows = 12, "cache warmed");
        warn!(target: "other", "disk slow");
        debug!(target: "other", "other detail");
    });
    service.close();

    let messages = read(dir.path().join("messages.log"));
    assert!(messages.starts_with("****"));
    assert!(messages.contains("product = "));
    assert!(messages.contains(" I server started"));
    assert!(messages.contains(" W disk slow"));
    assert!(!messages.contains("cache warmed"));

    let trace = read(dir.path().join("trace.log"));
    assert!(trace.contains("trace.specification = *=info:routing=all"));
    assert!(trace.contains(" I server started"));
    assert!(trace.contains(" 1 cache warmed"));
    assert!(trace.contains(" W disk slow"));
    assert!(!trace.contains("other detail"));
}

#[test]
fn test_restart_rolls_previous_logs() {
    let dir = tempfile::tempdir().unwrap();
    let first = file_service(dir.path(), "*=info");
    first.publish_log_record(LogEvent::new(
        Level::Info,
        "app",
        "first run",
        first.clock().now(),
    ));
    first.close();

    let second = file_service(dir.path(), "*=info");
    second.publish_log_record(LogEvent::new(
        Level::Info,
        "app",
        "second run",
        second.clock().now(),
    ));
    second.close();

    let active = read(dir.path().join("messages.log"));
    assert!(active.contains("second run"));
    assert!(!active.contains("first run"));

    let rolled: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("messages_"))
        .collect();
    assert_eq!(rolled.len(), 1);
    assert!(read(dir.path().join(&rolled[0])).contains("first run"));
}

#[test]
fn test_hidden_message_reaches_trace_file_only() {
    let dir = tempfile::tempdir().unwrap();
    let config = LogConfig::builder()
        .with_log_directory(dir.path())
        .with_hidden_message_ids(["CWWKF0012I"])
        .with_copy_system_streams(false)
        .build()
        .unwrap();
    let console = MemoryWriter::new();
    let service = TraceService::builder()
        .with_config(config)
        .with_console_writer(Arc::new(console.clone()))
        .build()
        .unwrap();
    let sink = CaptureSink::new();
    service.set_log_sink(Some(Arc::new(sink.clone())));

    service.publish_log_record(LogEvent::new(
        Level::Audit,
        "feature",
        "CWWKF0012I: installed features",
        service.clock().now(),
    ));
    service.publish_log_record(LogEvent::new(
        Level::Audit,
        "feature",
        "CWWKF0011I: server ready",
        service.clock().now(),
    ));
    service.close();

    assert_eq!(console.lines().len(), 1);
    assert_eq!(sink.published(), vec!["CWWKF0011I: server ready"]);
    let messages = read(dir.path().join("messages.log"));
    assert!(!messages.contains("CWWKF0012I"));
    assert!(messages.contains("CWWKF0011I"));
    assert!(read(dir.path().join("trace.log")).contains("CWWKF0012I: installed features"));
}

#[test]
fn test_trace_to_stdout_alias() {
    let dir = tempfile::tempdir().unwrap();
    let config = LogConfig::builder()
        .with_log_directory(dir.path())
        .with_trace_file_name("stdout")
        .with_copy_system_streams(false)
        .build()
        .unwrap();
    let service = TraceService::builder()
        .with_config(config)
        .with_console_writer(Arc::new(MemoryWriter::new()))
        .build()
        .unwrap();
    service.publish_log_record(LogEvent::new(
        Level::Info,
        "app",
        "to the console",
        service.clock().now(),
    ));
    service.close();

    assert!(!dir.path().join("stdout").exists());
    assert!(!dir.path().join("trace.log").exists());
    assert!(dir.path().join("messages.log").exists());
}

#[test]
fn test_routers_called_in_order_and_veto() {
    let service = TraceService::builder()
        .with_config(LogConfig::builder().with_copy_system_streams(false).build().unwrap())
        .with_console_writer(Arc::new(MemoryWriter::new()))
        .with_message_writer(Arc::new(MemoryWriter::new()))
        .with_trace_writer(Arc::new(MemoryWriter::new()))
        .build()
        .unwrap();

    struct Ordered {
        name: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }
    impl MessageRouter for Ordered {
        fn route(&self, _message: &RoutedMessage) -> Result<bool, RouterError> {
            self.seen.lock().unwrap().push(self.name);
            Ok(true)
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    service.set_internal_message_router(Arc::new(Ordered {
        name: "internal",
        seen: seen.clone(),
    }));
    service.set_message_router(Arc::new(Ordered {
        name: "external",
        seen: seen.clone(),
    }));
    service.publish_log_record(LogEvent::new(Level::Info, "app", "one", service.clock().now()));
    assert_eq!(*seen.lock().unwrap(), vec!["external", "internal"]);

    let veto = CaptureMessageRouter::new();
    veto.set_behavior(RouterBehavior::Veto);
    service.set_message_router(Arc::new(veto.clone()));
    service.publish_log_record(LogEvent::new(Level::Info, "app", "two", service.clock().now()));
    assert_eq!(veto.routed(), vec!["two"]);
    assert_eq!(service.metrics().messages_vetoed(), 1);
    assert_eq!(service.metrics().messages_routed(), 1);
}

/// Router that logs every message it sees back into the service.
struct EchoRouter {
    service: Weak<TraceService>,
    calls: Mutex<usize>,
}

impl MessageRouter for EchoRouter {
    fn route(&self, message: &RoutedMessage) -> Result<bool, RouterError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(service) = self.service.upgrade() {
            service.publish_log_record(LogEvent::new(
                Level::Info,
                "echo",
                format!("echo of {}", message.formatted),
                service.clock().now(),
            ));
        }
        Ok(true)
    }
}

#[test]
fn test_reentrant_router_is_bounded() {
    let messages = MemoryWriter::new();
    let service = TraceService::builder()
        .with_config(LogConfig::builder().with_copy_system_streams(false).build().unwrap())
        .with_console_writer(Arc::new(MemoryWriter::new()))
        .with_message_writer(Arc::new(messages.clone()))
        .with_trace_writer(Arc::new(MemoryWriter::new()))
        .build()
        .unwrap();
    let router = Arc::new(EchoRouter {
        service: Arc::downgrade(&service),
        calls: Mutex::new(0),
    });
    service.set_message_router(router.clone());

    service.publish_log_record(LogEvent::new(Level::Info, "app", "start", service.clock().now()));

    assert_eq!(*router.calls.lock().unwrap(), 2);
    assert_eq!(messages.lines().len(), 3);
    assert!(messages.contains("echo of echo of start"));
    assert_eq!(service.metrics().reentrant_dropped(), 1);
}

#[test]
fn test_enhanced_layout_with_parameters() {
    let clock = MockClock::new();
    let event = LogEvent::new(Level::Info, "com.acme.Greeter", "Hello {0}", clock.now())
        .with_param("World")
        .with_object_id(0xabc);
    let formatter = Formatter::new(TraceFormat::Enhanced, false);
    let routed = formatter.route(Arc::new(event));
    let line = formatter.trace_line(&routed);

    assert!(line.starts_with('['));
    let expected = format!(
        "] {:08x} id=00000abc {:<60} I Hello World",
        routed.event.thread_id, "com.acme.Greeter"
    );
    assert!(line.contains(&expected), "{}", line);
    assert_eq!(formatter.trace_line(&routed), line);
}

#[test]
fn test_print_stream_capture() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_service(dir.path(), "*=info");
    let out = service.system_out();
    let err = service.system_err();
    out.println("plain output");
    err.println("error output");
    service.close();

    let messages = read(dir.path().join("messages.log"));
    assert!(messages.contains(" O plain output"));
    assert!(messages.contains(" R error output"));
}
