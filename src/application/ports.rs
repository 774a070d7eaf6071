//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports, and external
//! collaborators (message routers, structured consumers) plug in through them.

use crate::domain::event::{LogEvent, RoutedMessage, Throwable};
use crate::domain::introspect::{Introspect, Introspector};
use crate::domain::level::Level;
use chrono::{DateTime, Local};
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::io;

/// Candidate entry for eviction consideration.
///
/// Values are cloned to avoid lifetime issues with concurrent maps.
pub struct EvictionCandidate<K, V> {
    /// The key of the entry
    pub key: K,
    /// The value of the entry (cloned)
    pub value: V,
    /// Last occurrence time for LRU-based strategies
    pub last_access: DateTime<Local>,
}

/// Port for eviction policy decisions.
///
/// The registry delegates the choice of which incident to drop to a
/// pluggable policy.
pub trait EvictionPolicy<K, V>: Send + Sync + Debug
where
    K: Clone,
    V: Clone,
{
    /// Select a victim from the given candidates, or `None` to keep everything.
    fn select_victim(&self, candidates: &[EvictionCandidate<K, V>]) -> Option<K>;

    /// Check if eviction should be triggered for the given entry count.
    fn should_evict(&self, current_entries: usize) -> bool;
}

/// Port for obtaining the current wall-clock time.
///
/// Wall-clock time is required because it appears in file names and log
/// lines. Infrastructure provides `SystemClock` and, for tests, `MockClock`.
pub trait Clock: Send + Sync + Debug {
    /// Get the current local time.
    fn now(&self) -> DateTime<Local>;
}

/// Port for concurrent key-value storage.
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Access an entry with mutable access, creating it if necessary.
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R;

    /// Remove an entry, returning its value.
    fn remove(&self, key: &K) -> Option<V>;

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;

    /// Clear all entries from the storage.
    fn clear(&self);

    /// Iterate over all entries, providing access to both key and value.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V);

    /// Remove entries for which the predicate returns false.
    fn retain<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool;
}

/// Error returned by router implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// The router could not forward the record.
    Unavailable(String),
    /// The router rejected the record as malformed.
    Rejected(String),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::Unavailable(reason) => write!(f, "router unavailable: {}", reason),
            RouterError::Rejected(reason) => write!(f, "router rejected record: {}", reason),
        }
    }
}

impl std::error::Error for RouterError {}

/// Error returned by structured consumers.
#[derive(Debug)]
pub enum SinkError {
    /// The consumer failed to accept the record.
    Publish(String),
    /// The consumer hit an I/O error.
    Io(io::Error),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Publish(reason) => write!(f, "failed to publish record: {}", reason),
            SinkError::Io(e) => write!(f, "sink I/O error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            SinkError::Publish(_) => None,
        }
    }
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        SinkError::Io(e)
    }
}

/// Pluggable component that sees every message before normal delivery.
///
/// Returning `Ok(false)` vetoes console and message-log delivery: the message
/// is considered handled elsewhere.
pub trait MessageRouter: Send + Sync {
    fn route(&self, message: &RoutedMessage) -> Result<bool, RouterError>;

    /// Receive messages published before this router was registered.
    fn adopt_early_messages(&self, _early: Vec<RoutedMessage>) {}
}

/// Pluggable component notified of every trace record.
pub trait TraceRouter: Send + Sync {
    fn route(&self, record: &RoutedMessage) -> Result<(), RouterError>;

    /// Receive trace records published before this router was registered.
    fn adopt_early_traces(&self, _early: Vec<RoutedMessage>) {}
}

/// Structured consumer of delivered messages.
pub trait LogSink: Send + Sync {
    fn publish(&self, message: &RoutedMessage) -> Result<(), SinkError>;
}

/// Structured consumer of trace records.
pub trait TraceSink: Send + Sync {
    fn publish(&self, record: &RoutedMessage) -> Result<(), SinkError>;
}

/// Destination for rendered text: a log file or a console stream.
pub trait LogWriter: Send + Sync {
    /// Write one rendered record. `level` lets console writers pick a stream.
    fn write_record(&self, level: Level, text: &str) -> io::Result<()>;

    /// Flush buffered output.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Release the underlying resource.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }

    /// True when this writer only forwards to the console stream.
    fn is_console_alias(&self) -> bool {
        false
    }
}

/// Anything that accepts log events, used by the tracing layer and the stream tee.
pub trait LogPublisher: Send + Sync {
    fn publish_log_record(&self, event: LogEvent);
}

/// Component-specific contributor to FFDC dumps.
///
/// Registered for a source-id prefix. When a module matches, the dump uses
/// the lightweight introspection depth and the module adds its own section.
pub trait DiagnosticModule: Send + Sync {
    /// Name shown in the dump section header.
    fn name(&self) -> &str;

    /// Contribute component state to the dump.
    fn dump(&self, throwable: &Throwable, caller: Option<&dyn Introspect>, out: &mut Introspector);
}
