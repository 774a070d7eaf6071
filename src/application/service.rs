//! The routing core.
//!
//! [`TraceService`] is the single entry point for every log and trace record.
//! For each message it:
//!
//! 1. formats the message once into a shared [`RoutedMessage`];
//! 2. offers it to the external, then the internal message router, either of
//!    which may veto normal delivery;
//! 3. redirects hidden message ids to the trace path only;
//! 4. publishes to the structured log sink, the console and the message log;
//! 5. forwards to the trace path when tracing is enabled for the logger.
//!
//! The trace path notifies the trace routers and the trace sink, then writes
//! to the trace writer. Each of these delivery paths is protected by its own
//! reentrancy counter, and routers are isolated by circuit breakers.

use crate::application::buffer::{EarlyBuffer, EARLY_MESSAGE_CAPACITY, EARLY_TRACE_CAPACITY};
use crate::application::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, Guarded};
use crate::application::config::{ConfigError, LogConfig};
use crate::application::ffdc::FfdcService;
use crate::application::guard::{PathGuards, ReentrancyGuard};
use crate::application::metrics::Metrics;
use crate::application::ports::{
    Clock, LogPublisher, LogSink, LogWriter, MessageRouter, TraceRouter, TraceSink,
};
use crate::domain::event::{LogEvent, RoutedMessage, Throwable};
use crate::domain::format::Formatter;
use crate::domain::introspect::Introspect;
use crate::domain::level::Level;
use crate::domain::trace_spec::TraceSpec;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::raw::{self, INTERNAL_TARGET};
use crate::infrastructure::tee::TeeStream;
use crate::infrastructure::writer::{
    render_header, ConsoleWriter, FileLogWriter, FileWriterSettings,
};
use chrono::{DateTime, Duration, Local, NaiveDate};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

/// Time after construction at which unadopted early records are dropped.
pub const EARLY_BUFFER_TTL: Duration = Duration::minutes(5);

/// A router plus the breaker isolating it.
struct RouterSlot<R: ?Sized> {
    router: Arc<R>,
    breaker: CircuitBreaker,
}

/// A writer and, when the service opened it, the file behind it.
struct WriterSlot {
    writer: Arc<dyn LogWriter>,
    file: Option<Arc<FileLogWriter>>,
    // Supplied by the caller; configuration updates leave it alone.
    pinned: bool,
}

impl WriterSlot {
    fn pinned(writer: Arc<dyn LogWriter>) -> Self {
        Self {
            writer,
            file: None,
            pinned: true,
        }
    }

    fn file(file: Arc<FileLogWriter>) -> Self {
        Self {
            writer: file.clone(),
            file: Some(file),
            pinned: false,
        }
    }

    fn console_alias() -> Self {
        Self {
            writer: Arc::new(ConsoleWriter::stdout_alias()),
            file: None,
            pinned: false,
        }
    }
}

/// Everything derived from one configuration generation.
struct Generation {
    config: Arc<LogConfig>,
    formatter: Arc<Formatter>,
    spec: Arc<TraceSpec>,
}

impl Generation {
    fn new(config: LogConfig) -> Self {
        let formatter = Formatter::new(config.trace_format, config.iso_date_format);
        let spec = config.trace_spec();
        Self {
            config: Arc::new(config),
            formatter: Arc::new(formatter),
            spec: Arc::new(spec),
        }
    }
}

/// Central event bus of the logging pipeline.
pub struct TraceService {
    generation: RwLock<Generation>,
    clock: Arc<dyn Clock>,
    created: DateTime<Local>,
    breaker_config: CircuitBreakerConfig,

    external_message_router: RwLock<Option<Arc<RouterSlot<dyn MessageRouter>>>>,
    internal_message_router: RwLock<Option<Arc<RouterSlot<dyn MessageRouter>>>>,
    external_trace_router: RwLock<Option<Arc<RouterSlot<dyn TraceRouter>>>>,
    internal_trace_router: RwLock<Option<Arc<RouterSlot<dyn TraceRouter>>>>,
    log_sink: RwLock<Option<Arc<dyn LogSink>>>,
    trace_sink: RwLock<Option<Arc<dyn TraceSink>>>,

    console: RwLock<Arc<dyn LogWriter>>,
    message_writer: RwLock<WriterSlot>,
    trace_writer: RwLock<WriterSlot>,

    early_messages: EarlyBuffer<RoutedMessage>,
    early_traces: EarlyBuffer<RoutedMessage>,
    early_pending: AtomicBool,

    guards: PathGuards,
    metrics: Metrics,
    ffdc: FfdcService,
    last_roll_day: Mutex<NaiveDate>,
    closed: AtomicBool,
}

impl TraceService {
    /// Create a builder.
    pub fn builder() -> TraceServiceBuilder {
        TraceServiceBuilder::default()
    }

    /// Build a service with default settings writing under `config.log_directory`.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(config: LogConfig) -> Result<Arc<Self>, ConfigError> {
        Self::builder().with_config(config).build()
    }

    /// Publish a log record.
    ///
    /// Message levels (INFO and above) go through the message routers and
    /// the console/message-log path; every record reaches the trace path if
    /// tracing is enabled for its logger.
    pub fn publish_log_record(&self, event: LogEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.expire_early_buffers();

        let (config, formatter, spec) = self.snapshot();
        let event = Arc::new(event);
        let level = event.level;
        let mut routed = None;

        if level.is_message() {
            let message = formatter.route(Arc::clone(&event));
            let log_line = formatter.message_log_line(&message, config.message_format);
            let message = message.with_message_log(log_line);

            if !self.invoke_message_routers(&message) {
                self.metrics.record_message_vetoed();
                return;
            }

            let hidden = message
                .message_id
                .as_deref()
                .is_some_and(|id| config.is_hidden(id));
            if hidden {
                self.metrics.record_message_hidden();
                self.deliver_trace(&formatter, &message);
                return;
            }

            self.metrics.record_message_routed();
            self.publish_to_log_sink(&message);

            // Stream records already reached the console through the tee.
            if !level.is_stream() && level.at_least(config.console_level) {
                let line = formatter.console_line(&message, config.console_format);
                let console = Arc::clone(&*read(&self.console));
                if let Err(e) = console.write_record(level, &line) {
                    raw::report("unable to write to console", &e);
                }
            }

            let writer = Arc::clone(&read(&self.message_writer).writer);
            let text = message.message_log.as_deref().unwrap_or(&message.formatted);
            if let Err(e) = writer.write_record(level, text) {
                raw::report("unable to write to message log", &e);
            }
            routed = Some(message);
        }

        if spec.any_enabled() && spec.is_loggable(&event.logger, level) {
            self.trace_record(&formatter, &event, routed.as_ref());
        }
    }

    /// Publish a trace record.
    ///
    /// The record is dropped unless the trace specification enables its
    /// logger at its level.
    pub fn publish_trace_log_record(&self, event: LogEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let (_, formatter, spec) = self.snapshot();
        if !spec.is_loggable(&event.logger, event.level) {
            return;
        }
        self.trace_record(&formatter, &Arc::new(event), None);
    }

    /// Whether a trace record from `logger` at `level` would be written.
    pub fn is_trace_enabled(&self, logger: &str, level: Level) -> bool {
        read(&self.generation).spec.is_loggable(logger, level)
    }

    fn trace_record(
        &self,
        formatter: &Formatter,
        event: &Arc<LogEvent>,
        routed: Option<&RoutedMessage>,
    ) {
        match routed {
            Some(message) => self.deliver_trace(formatter, message),
            None => {
                let message = formatter.route(Arc::clone(event));
                self.deliver_trace(formatter, &message);
            }
        }
    }

    fn deliver_trace(&self, formatter: &Formatter, record: &RoutedMessage) {
        let level = record.level();
        self.invoke_trace_routers(record);

        if !level.is_stream() {
            self.publish_to_trace_sink(record);
        }

        let writer = Arc::clone(&read(&self.trace_writer).writer);
        if level.is_stream() && writer.is_console_alias() {
            return;
        }
        let Some(_entered) = self.enter(&self.guards.trace_writer) else {
            return;
        };
        if let Err(e) = writer.write_record(level, &formatter.trace_line(record)) {
            raw::report("unable to write to trace log", &e);
            return;
        }
        self.metrics.record_trace_written();
    }

    /// Run the message routers. Returns false if any router vetoed.
    fn invoke_message_routers(&self, message: &RoutedMessage) -> bool {
        let Some(_entered) = self.enter(&self.guards.message_router) else {
            return true;
        };
        let external = read(&self.external_message_router).clone();
        let internal = read(&self.internal_message_router).clone();
        if external.is_none() && internal.is_none() {
            self.early_messages.push(message.clone());
            return true;
        }

        let mut deliver = true;
        for slot in [external, internal].into_iter().flatten() {
            deliver &= self.call_router(&slot.breaker, "message router", || {
                slot.router.route(message)
            })
            .unwrap_or(true);
        }
        deliver
    }

    fn invoke_trace_routers(&self, record: &RoutedMessage) {
        let Some(_entered) = self.enter(&self.guards.trace_router) else {
            return;
        };
        let external = read(&self.external_trace_router).clone();
        let internal = read(&self.internal_trace_router).clone();
        if external.is_none() && internal.is_none() {
            self.early_traces.push(record.clone());
            return;
        }
        for slot in [external, internal].into_iter().flatten() {
            self.call_router(&slot.breaker, "trace router", || slot.router.route(record));
        }
    }

    /// Call a router behind its breaker. `None` means the router was skipped or failed.
    fn call_router<T, E, F>(&self, breaker: &CircuitBreaker, what: &str, call: F) -> Option<T>
    where
        E: std::fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        match breaker.call(call) {
            Guarded::Failed(reason) => {
                self.metrics.record_router_failure();
                raw::report(&format!("{} failed", what), &reason);
                None
            }
            outcome => outcome.answer(),
        }
    }

    fn publish_to_log_sink(&self, message: &RoutedMessage) {
        let Some(sink) = read(&self.log_sink).clone() else {
            return;
        };
        let Some(_entered) = self.enter(&self.guards.log_sink) else {
            return;
        };
        self.sink_result(catch_unwind(AssertUnwindSafe(|| sink.publish(message))));
    }

    fn publish_to_trace_sink(&self, record: &RoutedMessage) {
        let Some(sink) = read(&self.trace_sink).clone() else {
            return;
        };
        let Some(_entered) = self.enter(&self.guards.trace_sink) else {
            return;
        };
        self.sink_result(catch_unwind(AssertUnwindSafe(|| sink.publish(record))));
    }

    fn sink_result<E: std::fmt::Display>(&self, result: std::thread::Result<Result<(), E>>) {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.metrics.record_sink_failure();
                raw::report("structured consumer failed", &e);
            }
            Err(_) => {
                self.metrics.record_sink_failure();
                raw::report("structured consumer panicked", &"panic while publishing");
            }
        }
    }

    fn enter<'a>(
        &self,
        guard: &'a ReentrancyGuard,
    ) -> Option<crate::application::guard::Entered<'a>> {
        let entered = guard.enter();
        if entered.is_none() {
            self.metrics.record_reentrant_dropped();
        }
        entered
    }

    fn snapshot(&self) -> (Arc<LogConfig>, Arc<Formatter>, Arc<TraceSpec>) {
        let generation = read(&self.generation);
        (
            Arc::clone(&generation.config),
            Arc::clone(&generation.formatter),
            Arc::clone(&generation.spec),
        )
    }

    // --- routers and consumers -------------------------------------------

    /// Install the external message router. It adopts any early messages.
    pub fn set_message_router(&self, router: Arc<dyn MessageRouter>) {
        self.install_message_router(&self.external_message_router, router);
    }

    /// Install the internal message router, called after the external one.
    pub fn set_internal_message_router(&self, router: Arc<dyn MessageRouter>) {
        self.install_message_router(&self.internal_message_router, router);
    }

    fn install_message_router(
        &self,
        slot: &RwLock<Option<Arc<RouterSlot<dyn MessageRouter>>>>,
        router: Arc<dyn MessageRouter>,
    ) {
        if let Some(early) = self.early_messages.adopt() {
            router.adopt_early_messages(early);
        }
        *write(slot) = Some(Arc::new(RouterSlot {
            router,
            breaker: CircuitBreaker::with_config(self.breaker_config.clone(), Arc::clone(&self.clock)),
        }));
        self.refresh_early_pending();
    }

    /// Install the external trace router. It adopts any early trace records.
    pub fn set_trace_router(&self, router: Arc<dyn TraceRouter>) {
        self.install_trace_router(&self.external_trace_router, router);
    }

    /// Install the internal trace router, called after the external one.
    pub fn set_internal_trace_router(&self, router: Arc<dyn TraceRouter>) {
        self.install_trace_router(&self.internal_trace_router, router);
    }

    fn install_trace_router(
        &self,
        slot: &RwLock<Option<Arc<RouterSlot<dyn TraceRouter>>>>,
        router: Arc<dyn TraceRouter>,
    ) {
        if let Some(early) = self.early_traces.adopt() {
            router.adopt_early_traces(early);
        }
        *write(slot) = Some(Arc::new(RouterSlot {
            router,
            breaker: CircuitBreaker::with_config(self.breaker_config.clone(), Arc::clone(&self.clock)),
        }));
        self.refresh_early_pending();
    }

    /// Remove both message routers.
    pub fn clear_message_routers(&self) {
        *write(&self.external_message_router) = None;
        *write(&self.internal_message_router) = None;
    }

    /// Remove both trace routers.
    pub fn clear_trace_routers(&self) {
        *write(&self.external_trace_router) = None;
        *write(&self.internal_trace_router) = None;
    }

    pub fn set_log_sink(&self, sink: Option<Arc<dyn LogSink>>) {
        *write(&self.log_sink) = sink;
    }

    pub fn set_trace_sink(&self, sink: Option<Arc<dyn TraceSink>>) {
        *write(&self.trace_sink) = sink;
    }

    // --- early buffers -----------------------------------------------------

    /// Drop unadopted early records once the grace period has passed.
    pub fn expire_early_buffers(&self) {
        if !self.early_pending.load(Ordering::Acquire) {
            return;
        }
        if self.clock.now() - self.created > EARLY_BUFFER_TTL {
            self.discard_early_buffers();
        }
    }

    /// Drop unadopted early records now. Returns how many were dropped.
    pub fn discard_early_buffers(&self) -> usize {
        let dropped = self.early_messages.discard() + self.early_traces.discard();
        for _ in 0..dropped {
            self.metrics.record_early_discarded();
        }
        self.early_pending.store(false, Ordering::Release);
        if dropped > 0 {
            debug!(target: INTERNAL_TARGET, dropped, "discarded unadopted early records");
        }
        dropped
    }

    fn refresh_early_pending(&self) {
        if !self.early_messages.is_open() && !self.early_traces.is_open() {
            self.early_pending.store(false, Ordering::Release);
        }
    }

    // --- configuration and writers ------------------------------------------

    /// Apply a new configuration.
    ///
    /// Writers are reopened only when their location changes.
    ///
    /// # Errors
    /// Returns `ConfigError` and leaves the current configuration in place if
    /// the new one is invalid.
    pub fn update_config(&self, config: LogConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.initialize_writers(&config);
        self.ffdc.update_config(&config);
        *write(&self.generation) = Generation::new(config);
        debug!(target: INTERNAL_TARGET, "applied logging configuration");
        Ok(())
    }

    /// Open, keep or replace the message and trace writers for `config`.
    pub fn initialize_writers(&self, config: &LogConfig) {
        let message_settings = FileWriterSettings {
            max_files: config.max_files,
            max_size: config.max_file_size_bytes(),
            header: (config.message_format != crate::domain::format::MessageFormat::Json)
                .then(|| render_header(&config.header, None)),
        };
        self.replace_writer(&self.message_writer, Some(config.message_log_path()), message_settings, config);

        let trace_settings = FileWriterSettings {
            max_files: config.max_files,
            max_size: config.max_file_size_bytes(),
            header: Some(render_header(&config.header, Some(&config.trace_specification))),
        };
        self.replace_writer(&self.trace_writer, config.trace_log_path(), trace_settings, config);
    }

    fn replace_writer(
        &self,
        slot: &RwLock<WriterSlot>,
        path: Option<PathBuf>,
        settings: FileWriterSettings,
        config: &LogConfig,
    ) {
        let old = {
            let mut current = write(slot);
            if current.pinned {
                return;
            }
            let same_file = match (&current.file, &path) {
                (Some(file), Some(path)) => file.path() == path.as_path(),
                _ => false,
            };
            if same_file {
                if let Some(file) = &current.file {
                    file.reconfigure(settings);
                }
                return;
            }
            if path.is_none() && current.writer.is_console_alias() {
                return;
            }
            let replacement = match path {
                Some(path) => {
                    let file_name = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or_default()
                        .to_string();
                    WriterSlot::file(Arc::new(FileLogWriter::open(
                        &config.log_directory,
                        &file_name,
                        settings,
                        Arc::clone(&self.clock),
                    )))
                }
                None => WriterSlot::console_alias(),
            };
            std::mem::replace(&mut *current, replacement)
        };
        if let Err(e) = old.writer.close() {
            raw::report("unable to close log writer", &e);
        }
    }

    /// Replace the console writer.
    pub fn set_console_writer(&self, writer: Arc<dyn LogWriter>) {
        *write(&self.console) = writer;
    }

    pub fn config(&self) -> Arc<LogConfig> {
        Arc::clone(&read(&self.generation).config)
    }

    pub fn formatter(&self) -> Arc<Formatter> {
        Arc::clone(&read(&self.generation).formatter)
    }

    // --- FFDC, streams and lifecycle -----------------------------------------

    pub fn ffdc(&self) -> &FfdcService {
        &self.ffdc
    }

    /// Record an exception with the FFDC service.
    pub fn process_exception(
        &self,
        throwable: &Throwable,
        source_id: &str,
        probe_id: &str,
        caller: Option<&dyn Introspect>,
        objects: &[&dyn Introspect],
    ) -> Option<PathBuf> {
        self.ffdc
            .process_exception(throwable, source_id, probe_id, caller, objects)
    }

    /// A print stream standing in for stdout.
    pub fn system_out(self: &Arc<Self>) -> TeeStream {
        let copy = self.config().copy_system_streams;
        TeeStream::stdout(self.clone(), Arc::clone(&self.clock), copy)
    }

    /// A print stream standing in for stderr.
    pub fn system_err(self: &Arc<Self>) -> TeeStream {
        let copy = self.config().copy_system_streams;
        TeeStream::stderr(self.clone(), Arc::clone(&self.clock), copy)
    }

    /// Periodic maintenance: summary check, early-buffer expiry and, once per
    /// day, the FFDC roll.
    pub fn housekeep(&self) {
        self.expire_early_buffers();
        self.ffdc.log_summary(false);
        let today = self.clock.now().date_naive();
        let roll = {
            let mut last = self
                .last_roll_day
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            let roll = *last != today;
            *last = today;
            roll
        };
        if roll {
            self.ffdc.roll_logs();
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The clock stamping records created by the service and its adapters.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting records and close both writers. Errors are reported, not returned.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for slot in [&self.message_writer, &self.trace_writer] {
            let writer = Arc::clone(&read(slot).writer);
            if let Err(e) = writer.flush().and_then(|_| writer.close()) {
                raw::report("unable to close log writer", &e);
            }
        }
    }
}

impl LogPublisher for TraceService {
    fn publish_log_record(&self, event: LogEvent) {
        TraceService::publish_log_record(self, event);
    }
}

impl std::fmt::Debug for TraceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceService")
            .field("config", &self.config())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Builder for [`TraceService`].
#[derive(Default)]
pub struct TraceServiceBuilder {
    config: Option<LogConfig>,
    clock: Option<Arc<dyn Clock>>,
    console: Option<Arc<dyn LogWriter>>,
    message_writer: Option<Arc<dyn LogWriter>>,
    trace_writer: Option<Arc<dyn LogWriter>>,
    breaker_config: Option<CircuitBreakerConfig>,
    metrics: Option<Metrics>,
}

impl TraceServiceBuilder {
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the console writer (defaults to the real stdout/stderr).
    pub fn with_console_writer(mut self, writer: Arc<dyn LogWriter>) -> Self {
        self.console = Some(writer);
        self
    }

    /// Use this writer for the message log instead of a file.
    ///
    /// Configuration updates never replace a writer supplied here.
    pub fn with_message_writer(mut self, writer: Arc<dyn LogWriter>) -> Self {
        self.message_writer = Some(writer);
        self
    }

    /// Use this writer for the trace log instead of a file.
    pub fn with_trace_writer(mut self, writer: Arc<dyn LogWriter>) -> Self {
        self.trace_writer = Some(writer);
        self
    }

    /// Configure the breaker isolating each router.
    pub fn with_router_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = Some(config);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and open the writers.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn build(self) -> Result<Arc<TraceService>, ConfigError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let metrics = self.metrics.unwrap_or_default();
        let now = clock.now();

        let placeholder = || WriterSlot {
            writer: Arc::new(ConsoleWriter::stdout_alias()) as Arc<dyn LogWriter>,
            file: None,
            pinned: false,
        };
        let service = TraceService {
            ffdc: FfdcService::new(&config, Arc::clone(&clock), metrics.clone()),
            created: now,
            last_roll_day: Mutex::new(now.date_naive()),
            breaker_config: self.breaker_config.unwrap_or_default(),
            external_message_router: RwLock::new(None),
            internal_message_router: RwLock::new(None),
            external_trace_router: RwLock::new(None),
            internal_trace_router: RwLock::new(None),
            log_sink: RwLock::new(None),
            trace_sink: RwLock::new(None),
            console: RwLock::new(
                self.console
                    .unwrap_or_else(|| Arc::new(ConsoleWriter::new())),
            ),
            message_writer: RwLock::new(
                self.message_writer
                    .map(WriterSlot::pinned)
                    .unwrap_or_else(placeholder),
            ),
            trace_writer: RwLock::new(
                self.trace_writer
                    .map(WriterSlot::pinned)
                    .unwrap_or_else(placeholder),
            ),
            early_messages: EarlyBuffer::new(EARLY_MESSAGE_CAPACITY),
            early_traces: EarlyBuffer::new(EARLY_TRACE_CAPACITY),
            early_pending: AtomicBool::new(true),
            guards: PathGuards::default(),
            metrics,
            clock,
            generation: RwLock::new(Generation::new(config.clone())),
            closed: AtomicBool::new(false),
        };
        service.initialize_writers(&config);
        Ok(Arc::new(service))
    }
}
