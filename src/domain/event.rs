//! Log events and their rendered projections.
//!
//! A [`LogEvent`] is built at the call site and handed by reference through
//! formatting and routing. Only its rendered forms outlive the publish call:
//! the [`RoutedMessage`] produced once per event is shared by every router and
//! sink so no consumer has to format the event again.

use crate::domain::level::Level;
use chrono::{DateTime, Local};
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Lookup table used to translate message keys.
pub trait ResourceBundle: Send + Sync {
    /// Return the template registered for `key`, if any.
    fn lookup(&self, key: &str) -> Option<String>;
}

impl ResourceBundle for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ResourceBundle for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Failure raised by a [`Traceable`] while rendering itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceableError(pub String);

impl fmt::Display for TraceableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TraceableError {}

/// Objects that supply their own string form for trace output.
pub trait Traceable: Send + Sync {
    /// Name shown in diagnostics when rendering fails.
    fn type_name(&self) -> &str;

    /// Render the object for trace output.
    fn to_trace_string(&self) -> Result<String, TraceableError>;
}

/// Error raised when a shared collection is being mutated while we try to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrentModification;

/// A collection parameter that may be mutated concurrently by other threads.
pub trait SharedCollection: Send + Sync {
    /// Take a consistent copy of the elements, or fail if a writer holds the collection.
    fn try_snapshot(&self) -> Result<Vec<Param>, ConcurrentModification>;
}

impl<T> SharedCollection for RwLock<Vec<T>>
where
    T: Clone + Into<Param> + Send + Sync,
{
    fn try_snapshot(&self) -> Result<Vec<Param>, ConcurrentModification> {
        match self.try_read() {
            Ok(items) => Ok(items.iter().cloned().map(Into::into).collect()),
            Err(_) => Err(ConcurrentModification),
        }
    }
}

/// One captured exception with its cause chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throwable {
    pub class_name: String,
    pub message: Option<String>,
    pub frames: Vec<String>,
    pub cause: Option<Box<Throwable>>,
}

impl Throwable {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: Some(message.into()),
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Build a throwable without a message.
    pub fn bare(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: None,
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Capture a Rust error and its `source()` chain.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut throwable = Throwable::new(short_type_name(error), error.to_string());
        if let Some(source) = error.source() {
            throwable.cause = Some(Box::new(Throwable::from_error(source)));
        }
        throwable
    }

    pub fn with_frames<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.frames = frames.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cause(mut self, cause: Throwable) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// `class: message` header line.
    pub fn headline(&self) -> String {
        match &self.message {
            Some(message) => format!("{}: {}", self.class_name, message),
            None => self.class_name.clone(),
        }
    }

    /// Full stack trace, never truncated.
    pub fn full_trace(&self) -> String {
        self.render(None)
    }

    /// Stack trace with at most `max_frames` frames per throwable in the chain.
    pub fn truncated_trace(&self, max_frames: usize) -> String {
        self.render(Some(max_frames))
    }

    fn render(&self, max_frames: Option<usize>) -> String {
        let mut out = String::new();
        let mut current = Some(self);
        let mut first = true;
        while let Some(t) = current {
            if !first {
                out.push_str("\nCaused by: ");
            }
            first = false;
            out.push_str(&t.headline());
            let limit = max_frames.unwrap_or(usize::MAX).min(t.frames.len());
            for frame in &t.frames[..limit] {
                out.push_str("\n\tat ");
                out.push_str(frame);
            }
            if limit < t.frames.len() {
                out.push_str(&format!("\n\t... {} more", t.frames.len() - limit));
            }
            current = t.cause.as_deref();
        }
        out
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.headline())
    }
}

fn short_type_name(error: &dyn std::error::Error) -> String {
    let debug = format!("{:?}", error);
    let end = debug
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(debug.len());
    if end == 0 {
        "Error".to_string()
    } else {
        debug[..end].to_string()
    }
}

/// A positional message parameter.
#[derive(Clone)]
pub enum Param {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    Bytes(Vec<u8>),
    Chars(Vec<char>),
    Array(Vec<Param>),
    Throwable(Throwable),
    Traceable(Arc<dyn Traceable>),
    Collection(Arc<dyn SharedCollection>),
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Null => f.write_str("Null"),
            Param::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Param::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Param::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Param::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Param::Char(c) => f.debug_tuple("Char").field(c).finish(),
            Param::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Param::Chars(c) => f.debug_tuple("Chars").field(&c.len()).finish(),
            Param::Array(a) => f.debug_tuple("Array").field(a).finish(),
            Param::Throwable(t) => f.debug_tuple("Throwable").field(&t.class_name).finish(),
            Param::Traceable(t) => f.debug_tuple("Traceable").field(&t.type_name()).finish(),
            Param::Collection(_) => f.write_str("Collection(..)"),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Str(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Str(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Param::Int(value as i64)
    }
}

impl From<u32> for Param {
    fn from(value: u32) -> Self {
        Param::Int(value as i64)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Float(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

impl From<Throwable> for Param {
    fn from(value: Throwable) -> Self {
        Param::Throwable(value)
    }
}

impl From<Vec<u8>> for Param {
    fn from(value: Vec<u8>) -> Self {
        Param::Bytes(value)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Param::Null)
    }
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// Small stable numeric id for the calling thread.
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| {
        if id.get() == 0 {
            id.set(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed));
        }
        id.get()
    })
}

/// One emitted log or trace record.
#[derive(Clone)]
pub struct LogEvent {
    pub level: Level,
    /// Message key or raw text.
    pub message: String,
    pub params: Vec<Param>,
    pub bundle: Option<Arc<dyn ResourceBundle>>,
    /// Logger (component) name, usually a module path.
    pub logger: String,
    pub source_class: Option<String>,
    pub source_method: Option<String>,
    /// Object or correlation id rendered as the 8-digit `id=` field.
    pub object_id: Option<u32>,
    pub correlation_id: Option<String>,
    pub thread_id: u64,
    pub thread_name: Option<String>,
    pub timestamp: DateTime<Local>,
    pub thrown: Option<Throwable>,
    pub org: Option<String>,
    pub product: Option<String>,
    pub component: Option<String>,
    /// Extra structured key/value pairs.
    pub extensions: BTreeMap<String, String>,
}

impl LogEvent {
    /// Create an event stamped with the calling thread's identity.
    pub fn new(
        level: Level,
        logger: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Local>,
    ) -> Self {
        let current = std::thread::current();
        Self {
            level,
            message: message.into(),
            params: Vec::new(),
            bundle: None,
            logger: logger.into(),
            source_class: None,
            source_method: None,
            object_id: None,
            correlation_id: None,
            thread_id: current_thread_id(),
            thread_name: current.name().map(str::to_string),
            timestamp,
            thrown: None,
            org: None,
            product: None,
            component: None,
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn with_params(mut self, params: Vec<Param>) -> Self {
        self.params = params;
        self
    }

    pub fn with_bundle(mut self, bundle: Arc<dyn ResourceBundle>) -> Self {
        self.bundle = Some(bundle);
        self
    }

    pub fn with_source(mut self, class: impl Into<String>, method: impl Into<String>) -> Self {
        self.source_class = Some(class.into());
        self.source_method = Some(method.into());
        self
    }

    pub fn with_object_id(mut self, id: u32) -> Self {
        self.object_id = Some(id);
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_thrown(mut self, thrown: Throwable) -> Self {
        self.thrown = Some(thrown);
        self
    }

    pub fn with_thread(mut self, id: u64, name: Option<String>) -> Self {
        self.thread_id = id;
        self.thread_name = name;
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    pub fn with_product(
        mut self,
        org: impl Into<String>,
        product: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        self.org = Some(org.into());
        self.product = Some(product.into());
        self.component = Some(component.into());
        self
    }
}

impl fmt::Debug for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEvent")
            .field("level", &self.level)
            .field("logger", &self.logger)
            .field("message", &self.message)
            .field("params", &self.params)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Rendered projection of a [`LogEvent`] shared by routers and sinks.
#[derive(Debug, Clone)]
pub struct RoutedMessage {
    /// Resolved message text with truncated throwables.
    pub formatted: String,
    /// Resolved message text that never truncates.
    pub verbose: String,
    /// Rendering destined for the message log, when one was produced.
    pub message_log: Option<String>,
    /// Message id parsed from the formatted text.
    pub message_id: Option<String>,
    pub event: Arc<LogEvent>,
}

impl RoutedMessage {
    pub fn new(event: Arc<LogEvent>, formatted: String, verbose: String) -> Self {
        let message_id = crate::domain::message::message_id(&formatted).map(str::to_string);
        Self {
            formatted,
            verbose,
            message_log: None,
            message_id,
            event,
        }
    }

    pub fn with_message_log(mut self, rendering: String) -> Self {
        self.message_log = Some(rendering);
        self
    }

    pub fn level(&self) -> Level {
        self.event.level
    }
}
