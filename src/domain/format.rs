//! Textual layouts for log and trace records.
//!
//! A [`Formatter`] is a pure function of the event, the selected
//! [`TraceFormat`] and the ISO-date flag. The routing core owns one formatter
//! per configuration generation and swaps it atomically on reconfiguration, so
//! concurrent publishers always see a consistent layout.

use crate::domain::event::{LogEvent, Param, RoutedMessage};
use crate::domain::level::Level;
use crate::domain::message::{self, RenderLimits};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Width of the abbreviated name field in BASIC layouts.
pub const BASIC_NAME_WIDTH: usize = 13;
/// Width of the padded name field in ENHANCED layouts.
pub const ENHANCED_NAME_WIDTH: usize = 60;

/// Layout of trace-file records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceFormat {
    Basic,
    #[default]
    Enhanced,
    Advanced,
    Tbasic,
}

/// Layout of console records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsoleFormat {
    #[default]
    Simple,
    Basic,
    Json,
}

/// Layout of message-log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageFormat {
    #[default]
    Basic,
    Json,
}

/// Renders events into the configured layouts.
#[derive(Debug, Clone)]
pub struct Formatter {
    trace_format: TraceFormat,
    iso_dates: bool,
    limits: RenderLimits,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(TraceFormat::default(), false)
    }
}

impl Formatter {
    pub fn new(trace_format: TraceFormat, iso_dates: bool) -> Self {
        Self {
            trace_format,
            iso_dates,
            limits: RenderLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: RenderLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn trace_format(&self) -> TraceFormat {
        self.trace_format
    }

    pub fn iso_dates(&self) -> bool {
        self.iso_dates
    }

    /// Resolve the message with truncated throwables.
    pub fn format_message(&self, event: &LogEvent) -> String {
        message::resolve(event, false, &self.limits)
    }

    /// Resolve the message without truncation.
    ///
    /// `formatted` is the plain rendering already computed for this event; it
    /// is reused when no parameter renders differently in verbose mode.
    pub fn format_verbose(&self, event: &LogEvent, formatted: &str) -> String {
        let differs = event
            .params
            .iter()
            .any(|p| matches!(p, Param::Throwable(_) | Param::Array(_) | Param::Collection(_)));
        if differs {
            message::resolve(event, true, &self.limits)
        } else {
            formatted.to_string()
        }
    }

    /// Build the shared projection of an event.
    pub fn route(&self, event: Arc<LogEvent>) -> RoutedMessage {
        let formatted = self.format_message(&event);
        let verbose = self.format_verbose(&event, &formatted);
        RoutedMessage::new(event, formatted, verbose)
    }

    pub fn format_time(&self, timestamp: &DateTime<Local>) -> String {
        if self.iso_dates {
            timestamp.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()
        } else {
            timestamp.format("%-m/%-d/%y %-H:%M:%S:%3f %Z").to_string()
        }
    }

    /// Render a trace-file record in the configured layout.
    pub fn trace_line(&self, routed: &RoutedMessage) -> String {
        let event = routed.event.as_ref();
        let marker = marker_for(event, &routed.verbose);
        let mut sb = String::with_capacity(160 + routed.verbose.len());

        sb.push('[');
        sb.push_str(&self.format_time(&event.timestamp));
        sb.push_str("] ");
        sb.push_str(&format!("{:08x} ", event.thread_id));

        match self.trace_format {
            TraceFormat::Basic => {
                push_fixed(&mut sb, short_name(&event.logger), BASIC_NAME_WIDTH, true);
                sb.push_str(marker);
                push_entry_method(&mut sb, event, marker);
                sb.push_str(&routed.verbose);
            }
            TraceFormat::Tbasic => {
                push_fixed(&mut sb, short_name(&event.logger), BASIC_NAME_WIDTH, true);
                sb.push_str(marker);
                if let Some(class) = &event.source_class {
                    sb.push_str(class);
                    sb.push(' ');
                }
                if let Some(method) = &event.source_method {
                    sb.push_str(method);
                    sb.push(' ');
                }
                sb.push_str(&routed.verbose);
            }
            TraceFormat::Enhanced => {
                sb.push_str(&format!("id={:08x} ", event.object_id.unwrap_or(0)));
                push_fixed(&mut sb, &event.logger, ENHANCED_NAME_WIDTH, false);
                sb.push_str(marker);
                if let Some(method) = &event.source_method {
                    sb.push_str(method);
                    sb.push(' ');
                }
                sb.push_str(&routed.verbose);
            }
            TraceFormat::Advanced => {
                sb.push_str(&format!("id={:08x} ", event.object_id.unwrap_or(0)));
                sb.push_str(&event.logger);
                sb.push_str(marker);
                push_pair(&mut sb, "UOW", event.correlation_id.as_deref());
                push_pair(&mut sb, "source", event.source_class.as_deref());
                push_pair(&mut sb, "method", event.source_method.as_deref());
                push_pair(&mut sb, "org", event.org.as_deref());
                push_pair(&mut sb, "prod", event.product.as_deref());
                push_pair(&mut sb, "component", event.component.as_deref());
                sb.push_str("thread=[");
                sb.push_str(event.thread_name.as_deref().unwrap_or(""));
                sb.push(']');
                for (key, value) in &event.extensions {
                    sb.push(' ');
                    push_pair(&mut sb, key, Some(value));
                }
                sb.push_str("\n          ");
                sb.push_str(&routed.verbose);
            }
        }

        if let Some(thrown) = &event.thrown {
            sb.push('\n');
            sb.push_str(&thrown.full_trace());
        }
        sb
    }

    /// Render a message-log record.
    pub fn message_log_line(&self, routed: &RoutedMessage, format: MessageFormat) -> String {
        match format {
            MessageFormat::Json => self.json(routed, "message"),
            MessageFormat::Basic => self.basic_message(routed),
        }
    }

    /// Render a console record.
    pub fn console_line(&self, routed: &RoutedMessage, format: ConsoleFormat) -> String {
        match format {
            ConsoleFormat::Json => self.json(routed, "message"),
            ConsoleFormat::Basic => self.basic_message(routed),
            ConsoleFormat::Simple => {
                let event = routed.event.as_ref();
                let mut sb = match event.level {
                    Level::SystemOut => routed.formatted.clone(),
                    Level::SystemErr => format!("[err] {}", routed.formatted),
                    level => format!("[{:<8}] {}", level.as_str(), routed.formatted),
                };
                if let Some(thrown) = &event.thrown {
                    sb.push('\n');
                    sb.push_str(&thrown.truncated_trace(self.limits.max_frames));
                }
                sb
            }
        }
    }

    fn basic_message(&self, routed: &RoutedMessage) -> String {
        let event = routed.event.as_ref();
        let mut sb = String::with_capacity(96 + routed.formatted.len());
        sb.push('[');
        sb.push_str(&self.format_time(&event.timestamp));
        sb.push_str("] ");
        sb.push_str(&format!("{:08x} ", event.thread_id));
        push_fixed(&mut sb, short_name(&event.logger), BASIC_NAME_WIDTH, true);
        sb.push_str(event.level.marker());
        sb.push_str(&routed.formatted);
        if let Some(thrown) = &event.thrown {
            sb.push('\n');
            sb.push_str(&thrown.truncated_trace(self.limits.max_frames));
        }
        sb
    }

    /// Render a record as a single JSON object.
    ///
    /// `kind` is `"message"` or `"trace"`.
    pub fn json(&self, routed: &RoutedMessage, kind: &str) -> String {
        let event = routed.event.as_ref();
        let mut map = Map::new();
        map.insert("type".into(), Value::from(kind));
        map.insert(
            "datetime".into(),
            Value::from(event.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()),
        );
        map.insert("loglevel".into(), Value::from(event.level.as_str()));
        map.insert("module".into(), Value::from(event.logger.as_str()));
        map.insert(
            "threadId".into(),
            Value::from(format!("{:08x}", event.thread_id)),
        );
        if let Some(name) = &event.thread_name {
            map.insert("threadName".into(), Value::from(name.as_str()));
        }
        if let Some(id) = &routed.message_id {
            map.insert("messageId".into(), Value::from(id.as_str()));
        }
        map.insert("message".into(), Value::from(routed.formatted.as_str()));
        if let Some(class) = &event.source_class {
            map.insert("className".into(), Value::from(class.as_str()));
        }
        if let Some(method) = &event.source_method {
            map.insert("methodName".into(), Value::from(method.as_str()));
        }
        if let Some(correlation) = &event.correlation_id {
            map.insert("correlationId".into(), Value::from(correlation.as_str()));
        }
        if let Some(thrown) = &event.thrown {
            map.insert("throwable".into(), Value::from(thrown.full_trace()));
        }
        for (key, value) in &event.extensions {
            map.insert(format!("ext_{}", key), Value::from(value.as_str()));
        }
        Value::Object(map).to_string()
    }
}

/// Level marker, with method entry/exit markers for FINER records.
fn marker_for(event: &LogEvent, text: &str) -> &'static str {
    if event.level == Level::Finer {
        if text.starts_with("ENTRY") {
            return " > ";
        }
        if text.starts_with("RETURN") {
            return " < ";
        }
    }
    event.level.marker()
}

fn push_entry_method(sb: &mut String, event: &LogEvent, marker: &str) {
    if marker == " > " || marker == " < " {
        if let Some(method) = &event.source_method {
            sb.push_str(method);
            sb.push(' ');
        }
    }
}

fn push_pair(sb: &mut String, key: &str, value: Option<&str>) {
    sb.push_str(key);
    sb.push('=');
    sb.push_str(value.unwrap_or(""));
    sb.push(' ');
}

/// Append `value` padded with spaces to `width`; optionally cut longer values.
fn push_fixed(sb: &mut String, value: &str, width: usize, truncate: bool) {
    let len = value.chars().count();
    if len > width && truncate {
        sb.extend(value.chars().take(width));
    } else {
        sb.push_str(value);
        for _ in len..width {
            sb.push(' ');
        }
    }
}

/// Last segment of a dotted or `::`-separated name.
pub fn short_name(name: &str) -> &str {
    let after_colons = name.rsplit("::").next().unwrap_or(name);
    after_colons.rsplit('.').next().unwrap_or(after_colons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::Throwable;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 18, 21, 48, 5).unwrap()
    }

    fn routed(formatter: &Formatter, event: LogEvent) -> RoutedMessage {
        formatter.route(Arc::new(event))
    }

    #[test]
    fn test_enhanced_layout() {
        let formatter = Formatter::new(TraceFormat::Enhanced, false);
        let event = LogEvent::new(Level::Info, "com.example.Greeter", "Hello {0}", fixed_time())
            .with_param("World")
            .with_thread(0x2a, None)
            .with_object_id(0xbeef);
        let line = formatter.trace_line(&routed(&formatter, event));

        assert!(line.starts_with('['));
        assert!(line.contains("] 0000002a id=0000beef com.example.Greeter"));
        let name_field = format!("{:<60}", "com.example.Greeter");
        assert!(line.contains(&format!("{} I Hello World", name_field)));
        assert!(line.ends_with("Hello World"));
    }

    #[test]
    fn test_basic_layout_abbreviates() {
        let formatter = Formatter::new(TraceFormat::Basic, false);
        let event = LogEvent::new(
            Level::Warning,
            "com.example.really.LongComponentName",
            "careful",
            fixed_time(),
        )
        .with_thread(1, None);
        let line = formatter.trace_line(&routed(&formatter, event));
        assert!(line.contains("] 00000001 LongComponent W careful"));
    }

    #[test]
    fn test_entry_exit_markers() {
        let formatter = Formatter::new(TraceFormat::Basic, false);
        let entry = LogEvent::new(Level::Finer, "svc", "ENTRY", fixed_time())
            .with_source("svc::Handler", "handle");
        let line = formatter.trace_line(&routed(&formatter, entry));
        assert!(line.contains(" > handle ENTRY"));

        let exit = LogEvent::new(Level::Finer, "svc", "RETURN 5", fixed_time())
            .with_source("svc::Handler", "handle");
        let line = formatter.trace_line(&routed(&formatter, exit));
        assert!(line.contains(" < handle RETURN 5"));

        let plain = LogEvent::new(Level::Finer, "svc", "midway", fixed_time());
        assert!(formatter
            .trace_line(&routed(&formatter, plain))
            .contains(" 2 midway"));
    }

    #[test]
    fn test_advanced_layout() {
        let formatter = Formatter::new(TraceFormat::Advanced, false);
        let event = LogEvent::new(Level::Fine, "db.pool", "acquired", fixed_time())
            .with_source("db::Pool", "acquire")
            .with_correlation_id("req-9")
            .with_product("acme", "shop", "db")
            .with_thread(3, Some("worker-1".to_string()))
            .with_extension("tenant", "t1");
        let line = formatter.trace_line(&routed(&formatter, event));
        assert!(line.contains("db.pool 1 UOW=req-9 source=db::Pool method=acquire"));
        assert!(line.contains("org=acme prod=shop component=db thread=[worker-1]"));
        assert!(line.contains("tenant=t1"));
        assert!(line.ends_with("\n          acquired"));
    }

    #[test]
    fn test_tbasic_layout() {
        let formatter = Formatter::new(TraceFormat::Tbasic, false);
        let event = LogEvent::new(Level::Finest, "db.pool", "dump", fixed_time())
            .with_source("db::Pool", "scan");
        let line = formatter.trace_line(&routed(&formatter, event));
        assert!(line.contains("pool          3 db::Pool scan dump"));
    }

    #[test]
    fn test_trace_line_includes_full_thrown() {
        let formatter = Formatter::default();
        let thrown = Throwable::new("Boom", "x").with_frames((0..40).map(|i| format!("f{}", i)));
        let event = LogEvent::new(Level::Error, "a", "failed", fixed_time()).with_thrown(thrown);
        let line = formatter.trace_line(&routed(&formatter, event));
        assert!(line.contains("Boom: x"));
        assert!(line.contains("\tat f39"));
    }

    #[test]
    fn test_console_simple() {
        let formatter = Formatter::default();
        let audit = LogEvent::new(Level::Audit, "k", "CWWKE0001I: launched", fixed_time());
        assert_eq!(
            formatter.console_line(&routed(&formatter, audit), ConsoleFormat::Simple),
            "[AUDIT   ] CWWKE0001I: launched"
        );

        let out = LogEvent::new(Level::SystemOut, "SystemOut", "printed", fixed_time());
        assert_eq!(
            formatter.console_line(&routed(&formatter, out), ConsoleFormat::Simple),
            "printed"
        );

        let err = LogEvent::new(Level::SystemErr, "SystemErr", "oops", fixed_time());
        assert_eq!(
            formatter.console_line(&routed(&formatter, err), ConsoleFormat::Simple),
            "[err] oops"
        );
    }

    #[test]
    fn test_message_log_basic() {
        let formatter = Formatter::default();
        let event = LogEvent::new(Level::Info, "app::server", "started", fixed_time())
            .with_thread(7, None);
        let line = formatter.message_log_line(&routed(&formatter, event), MessageFormat::Basic);
        assert!(line.contains("] 00000007 server        I started"));
    }

    #[test]
    fn test_json_rendering() {
        let formatter = Formatter::default();
        let event = LogEvent::new(Level::Warning, "app", "CWWKZ0014W: bad {0}", fixed_time())
            .with_param("thing")
            .with_extension("tenant", "t1");
        let json = formatter.message_log_line(&routed(&formatter, event), MessageFormat::Json);
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["loglevel"], "WARNING");
        assert_eq!(value["messageId"], "CWWKZ0014W");
        assert_eq!(value["message"], "CWWKZ0014W: bad thing");
        assert_eq!(value["ext_tenant"], "t1");
    }

    #[test]
    fn test_date_formats() {
        let t = fixed_time();
        assert!(Formatter::new(TraceFormat::Basic, true)
            .format_time(&t)
            .starts_with("2026-10-18T21:48:05.000"));
        assert!(Formatter::new(TraceFormat::Basic, false)
            .format_time(&t)
            .starts_with("10/18/26 21:48:05:000"));
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let formatter = Formatter::new(TraceFormat::Advanced, true);
        let event = Arc::new(
            LogEvent::new(Level::Info, "x", "Hello {0}", fixed_time()).with_param("again"),
        );
        let a = formatter.trace_line(&formatter.route(event.clone()));
        let b = formatter.trace_line(&formatter.route(event));
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("com.example.Foo"), "Foo");
        assert_eq!(short_name("crate::module::Bar"), "Bar");
        assert_eq!(short_name("plain"), "plain");
    }
}
