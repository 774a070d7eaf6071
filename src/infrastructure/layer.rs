//! Tracing integration layer.
//!
//! Provides a `tracing::Layer` that turns every event into a [`LogEvent`] and
//! publishes it through a [`TraceService`].

use crate::application::service::TraceService;
use crate::domain::event::LogEvent;
use crate::domain::level::Level;
use crate::infrastructure::raw::INTERNAL_TARGET;
use crate::infrastructure::visitor::{FieldVisitor, SpanFields};

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::subscriber::Interest;
use tracing::{Metadata, Subscriber};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::Context, Layer};

/// Field that sets the correlation (unit of work) id of a record.
pub const CORRELATION_FIELD: &str = "correlation_id";
/// Field that sets the object id shown as `id=` in trace output.
pub const OBJECT_ID_FIELD: &str = "object_id";

/// Builder for constructing a `TraceServiceLayer`.
pub struct TraceServiceLayerBuilder {
    service: Arc<TraceService>,
    ignored_targets: BTreeSet<String>,
    span_fields: bool,
    excluded_fields: BTreeSet<String>,
}

impl TraceServiceLayerBuilder {
    /// Skip events whose target starts with any of these prefixes.
    ///
    /// The crate's own diagnostic target is always ignored so that the
    /// service never logs into itself.
    pub fn with_ignored_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_targets.extend(targets.into_iter().map(Into::into));
        self
    }

    /// Copy the fields of enclosing spans onto each event (default: on).
    pub fn with_span_fields(mut self, enabled: bool) -> Self {
        self.span_fields = enabled;
        self
    }

    /// Drop these fields instead of attaching them as extensions.
    ///
    /// Useful for high-cardinality values that would clutter the trace log.
    pub fn with_excluded_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> TraceServiceLayer {
        TraceServiceLayer {
            service: self.service,
            ignored_targets: Arc::new(self.ignored_targets),
            span_fields: self.span_fields,
            excluded_fields: Arc::new(self.excluded_fields),
        }
    }
}

/// Tracing layer feeding a [`TraceService`].
///
/// `tracing` levels map onto severities as ERROR to ERROR, WARN to WARNING,
/// INFO to INFO, DEBUG to FINE and TRACE to FINEST. The event target becomes
/// the logger name, so the trace specification filters on module paths.
#[derive(Clone)]
pub struct TraceServiceLayer {
    service: Arc<TraceService>,
    ignored_targets: Arc<BTreeSet<String>>,
    span_fields: bool,
    excluded_fields: Arc<BTreeSet<String>>,
}

impl TraceServiceLayer {
    /// Create a layer with default settings.
    pub fn new(service: Arc<TraceService>) -> Self {
        Self::builder(service).build()
    }

    /// Create a builder for configuring the layer.
    pub fn builder(service: Arc<TraceService>) -> TraceServiceLayerBuilder {
        TraceServiceLayerBuilder {
            service,
            ignored_targets: BTreeSet::from([INTERNAL_TARGET.to_string()]),
            span_fields: true,
            excluded_fields: BTreeSet::new(),
        }
    }

    pub fn service(&self) -> &Arc<TraceService> {
        &self.service
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored_targets
            .iter()
            .any(|prefix| target.starts_with(prefix.as_str()))
    }

    fn wants(&self, metadata: &Metadata<'_>) -> bool {
        if self.is_ignored(metadata.target()) || self.service.is_closed() {
            return false;
        }
        let level = Level::from_tracing(metadata.level());
        level.is_message() || self.service.is_trace_enabled(metadata.target(), level)
    }

    /// Convert an event into a log record.
    fn to_log_event<Sub>(&self, event: &tracing::Event<'_>, cx: &Context<'_, Sub>) -> LogEvent
    where
        Sub: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);
        let (message, thrown, mut fields) = visitor.into_parts();

        if self.span_fields {
            if let Some(span) = cx.event_span(event) {
                // Innermost span first; event fields win over span fields.
                for span_ref in span.scope() {
                    let extensions = span_ref.extensions();
                    if let Some(stored) = extensions.get::<SpanFields>() {
                        for (key, value) in &stored.0 {
                            fields.entry(key.clone()).or_insert_with(|| value.clone());
                        }
                    }
                }
            }
        }

        let level = Level::from_tracing(metadata.level());
        let text = message.unwrap_or_else(|| metadata.name().to_string());
        let mut record = LogEvent::new(level, metadata.target(), text, self.service.clock().now());
        if let Some(module) = metadata.module_path() {
            record.source_class = Some(module.to_string());
        }
        if let Some(thrown) = thrown {
            record = record.with_thrown(thrown);
        }
        for (key, value) in fields {
            if self.excluded_fields.contains(&key) {
                continue;
            }
            match key.as_str() {
                CORRELATION_FIELD => record.correlation_id = Some(value),
                OBJECT_ID_FIELD => match value.parse::<u32>() {
                    Ok(id) => record.object_id = Some(id),
                    Err(_) => {
                        record.extensions.insert(key, value);
                    }
                },
                _ => {
                    record.extensions.insert(key, value);
                }
            }
        }
        record
    }
}

impl std::fmt::Debug for TraceServiceLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceServiceLayer")
            .field("ignored_targets", &self.ignored_targets)
            .field("span_fields", &self.span_fields)
            .finish_non_exhaustive()
    }
}

impl<Sub> Layer<Sub> for TraceServiceLayer
where
    Sub: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn register_callsite(&self, metadata: &'static Metadata<'static>) -> Interest {
        // The trace specification can change at runtime, so never cache.
        if self.is_ignored(metadata.target()) {
            Interest::never()
        } else {
            Interest::sometimes()
        }
    }

    fn enabled(&self, metadata: &Metadata<'_>, _cx: Context<'_, Sub>) -> bool {
        metadata.is_span() || self.wants(metadata)
    }

    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: Context<'_, Sub>,
    ) {
        if !self.span_fields {
            return;
        }

        let mut visitor = FieldVisitor::new();
        attrs.record(&mut visitor);
        let fields = visitor.into_fields();
        if fields.is_empty() {
            return;
        }

        if let Some(span) = ctx.span(id) {
            let mut extensions = span.extensions_mut();
            extensions.insert(SpanFields(fields));
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, cx: Context<'_, Sub>) {
        if !self.wants(event.metadata()) {
            return;
        }
        let record = self.to_log_event(event, &cx);
        self.service.publish_log_record(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::LogConfig;
    use crate::infrastructure::mocks::{MemoryWriter, MockClock};
    use tracing::{debug, error, info, info_span, warn};
    use tracing_subscriber::layer::SubscriberExt;

    struct Fixture {
        service: Arc<TraceService>,
        messages: MemoryWriter,
        trace: MemoryWriter,
        _dir: tempfile::TempDir,
    }

    fn fixture(spec: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig::builder()
            .with_log_directory(dir.path())
            .with_trace_specification(spec)
            .with_copy_system_streams(false)
            .build()
            .unwrap();
        let messages = MemoryWriter::new();
        let trace = MemoryWriter::new();
        let service = TraceService::builder()
            .with_config(config)
            .with_clock(Arc::new(MockClock::new()))
            .with_console_writer(Arc::new(MemoryWriter::new()))
            .with_message_writer(Arc::new(messages.clone()))
            .with_trace_writer(Arc::new(trace.clone()))
            .build()
            .unwrap();
        Fixture {
            service,
            messages,
            trace,
            _dir: dir,
        }
    }

    #[test]
    fn test_levels_are_mapped() {
        let f = fixture("*=info");
        let subscriber = tracing_subscriber::registry().with(TraceServiceLayer::new(f.service.clone()));
        tracing::subscriber::with_default(subscriber, || {
            error!("broken");
            warn!("careful");
            info!("hello");
            debug!("not traced");
        });

        assert_eq!(
            f.messages.levels(),
            vec![Level::Error, Level::Warning, Level::Info]
        );
        assert!(f.trace.lines().is_empty());
    }

    #[test]
    fn test_debug_reaches_trace_when_enabled() {
        let f = fixture("tracing_router=all");
        let subscriber = tracing_subscriber::registry().with(TraceServiceLayer::new(f.service.clone()));
        tracing::subscriber::with_default(subscriber, || {
            debug!(rows = 3, "query done");
        });

        assert!(f.messages.lines().is_empty());
        assert_eq!(f.trace.levels(), vec![Level::Fine]);
        assert!(f.trace.contains("query done"));
    }

    #[test]
    fn test_internal_target_is_ignored() {
        let f = fixture("*=all");
        let subscriber = tracing_subscriber::registry().with(TraceServiceLayer::new(f.service.clone()));
        tracing::subscriber::with_default(subscriber, || {
            info!(target: INTERNAL_TARGET, "diagnostic");
            info!(target: "noisy::dep", "dependency chatter");
        });
        assert_eq!(f.messages.lines().len(), 1);
        assert!(f.messages.contains("dependency chatter"));

        let f = fixture("*=all");
        let layer = TraceServiceLayer::builder(f.service.clone())
            .with_ignored_targets(["noisy"])
            .build();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            info!(target: "noisy::dep", "dependency chatter");
        });
        assert!(f.messages.lines().is_empty());
    }

    #[test]
    fn test_span_and_event_fields_become_extensions() {
        let f = fixture("*=all");
        let records = crate::infrastructure::mocks::CaptureSink::new();
        f.service.set_log_sink(Some(Arc::new(records.clone())));
        let layer = TraceServiceLayer::builder(f.service.clone())
            .with_excluded_fields(["secret"])
            .build();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            let span = info_span!("request", tenant = "acme", user = 1);
            let _entered = span.enter();
            info!(user = 7, secret = "x", correlation_id = "uow-9", object_id = 255u32, "handled");
        });

        let records = records.records();
        assert_eq!(records.len(), 1);
        let event = &records[0].event;
        assert_eq!(event.message, "handled");
        assert_eq!(event.extensions.get("tenant").map(String::as_str), Some("acme"));
        assert_eq!(event.extensions.get("user").map(String::as_str), Some("7"));
        assert!(!event.extensions.contains_key("secret"));
        assert_eq!(event.correlation_id.as_deref(), Some("uow-9"));
        assert_eq!(event.object_id, Some(255));
    }

    #[test]
    fn test_error_field_becomes_throwable() {
        let f = fixture("*=info");
        let subscriber = tracing_subscriber::registry().with(TraceServiceLayer::new(f.service.clone()));
        let failure = std::io::Error::new(std::io::ErrorKind::NotFound, "config missing");
        tracing::subscriber::with_default(subscriber, || {
            error!(error = &failure as &(dyn std::error::Error + 'static), "startup failed");
        });
        assert!(f.messages.contains("startup failed"));
        assert!(f.messages.contains("config missing"));
    }
}
