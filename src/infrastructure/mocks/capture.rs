//! Capturing routers, sinks and writers for testing.

use crate::application::ports::{
    LogSink, LogWriter, MessageRouter, RouterError, SinkError, TraceRouter, TraceSink,
};
use crate::domain::event::RoutedMessage;
use crate::domain::level::Level;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// How a capture router answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouterBehavior {
    /// Let the message through.
    #[default]
    Pass,
    /// Veto normal delivery.
    Veto,
    /// Return an error.
    Fail,
    /// Panic inside `route`.
    Panic,
}

#[derive(Debug, Default)]
struct CaptureState {
    routed: Mutex<Vec<RoutedMessage>>,
    adopted: Mutex<Vec<RoutedMessage>>,
    behavior: Mutex<RouterBehavior>,
    calls: AtomicUsize,
}

impl CaptureState {
    fn answer(&self, record: &RoutedMessage) -> Result<bool, RouterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self
            .behavior
            .lock()
            .expect("capture mutex poisoned - a test thread panicked while holding the lock");
        match behavior {
            RouterBehavior::Panic => panic!("capture router asked to panic"),
            RouterBehavior::Fail => Err(RouterError::Unavailable("capture router failure".into())),
            RouterBehavior::Pass | RouterBehavior::Veto => {
                self.routed
                    .lock()
                    .expect("capture mutex poisoned - a test thread panicked while holding the lock")
                    .push(record.clone());
                Ok(behavior == RouterBehavior::Pass)
            }
        }
    }

    fn texts(list: &Mutex<Vec<RoutedMessage>>) -> Vec<String> {
        list.lock()
            .expect("capture mutex poisoned - a test thread panicked while holding the lock")
            .iter()
            .map(|m| m.formatted.clone())
            .collect()
    }
}

macro_rules! capture_accessors {
    () => {
        /// Create a capture that lets everything through.
        pub fn new() -> Self {
            Self::default()
        }

        /// Change how subsequent calls are answered.
        pub fn set_behavior(&self, behavior: RouterBehavior) {
            *self
                .state
                .behavior
                .lock()
                .expect("capture mutex poisoned - a test thread panicked while holding the lock") =
                behavior;
        }

        /// Formatted text of every record routed so far.
        pub fn routed(&self) -> Vec<String> {
            CaptureState::texts(&self.state.routed)
        }

        /// Full records routed so far.
        pub fn records(&self) -> Vec<RoutedMessage> {
            self.state
                .routed
                .lock()
                .expect("capture mutex poisoned - a test thread panicked while holding the lock")
                .clone()
        }

        /// Formatted text of every record adopted from the early buffer.
        pub fn adopted(&self) -> Vec<String> {
            CaptureState::texts(&self.state.adopted)
        }

        /// Number of `route` calls, including failed ones.
        pub fn calls(&self) -> usize {
            self.state.calls.load(Ordering::SeqCst)
        }
    };
}

/// Message router that records what it sees.
#[derive(Debug, Clone, Default)]
pub struct CaptureMessageRouter {
    state: Arc<CaptureState>,
}

impl CaptureMessageRouter {
    capture_accessors!();
}

impl MessageRouter for CaptureMessageRouter {
    fn route(&self, message: &RoutedMessage) -> Result<bool, RouterError> {
        self.state.answer(message)
    }

    fn adopt_early_messages(&self, early: Vec<RoutedMessage>) {
        self.state
            .adopted
            .lock()
            .expect("capture mutex poisoned - a test thread panicked while holding the lock")
            .extend(early);
    }
}

/// Trace router that records what it sees.
#[derive(Debug, Clone, Default)]
pub struct CaptureTraceRouter {
    state: Arc<CaptureState>,
}

impl CaptureTraceRouter {
    capture_accessors!();
}

impl TraceRouter for CaptureTraceRouter {
    fn route(&self, record: &RoutedMessage) -> Result<(), RouterError> {
        self.state.answer(record).map(|_| ())
    }

    fn adopt_early_traces(&self, early: Vec<RoutedMessage>) {
        self.state
            .adopted
            .lock()
            .expect("capture mutex poisoned - a test thread panicked while holding the lock")
            .extend(early);
    }
}

/// Structured consumer that records every published record.
///
/// Implements both [`LogSink`] and [`TraceSink`].
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    records: Arc<Mutex<Vec<RoutedMessage>>>,
    failing: Arc<AtomicBool>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Formatted text of every record published so far.
    pub fn published(&self) -> Vec<String> {
        CaptureState::texts(&self.records)
    }

    pub fn records(&self) -> Vec<RoutedMessage> {
        self.records
            .lock()
            .expect("capture mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }

    fn accept(&self, record: &RoutedMessage) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Publish("capture sink failure".into()));
        }
        self.records
            .lock()
            .expect("capture mutex poisoned - a test thread panicked while holding the lock")
            .push(record.clone());
        Ok(())
    }
}

impl LogSink for CaptureSink {
    fn publish(&self, message: &RoutedMessage) -> Result<(), SinkError> {
        self.accept(message)
    }
}

impl TraceSink for CaptureSink {
    fn publish(&self, record: &RoutedMessage) -> Result<(), SinkError> {
        self.accept(record)
    }
}

/// Writer that keeps rendered records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
    closed: Arc<AtomicBool>,
    console_alias: bool,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer that reports itself as forwarding to the console.
    pub fn console_alias() -> Self {
        Self {
            console_alias: true,
            ..Self::default()
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .expect("capture mutex poisoned - a test thread panicked while holding the lock")
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn levels(&self) -> Vec<Level> {
        self.lines
            .lock()
            .expect("capture mutex poisoned - a test thread panicked while holding the lock")
            .iter()
            .map(|(level, _)| *level)
            .collect()
    }

    /// Whether any written record contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl LogWriter for MemoryWriter {
    fn write_record(&self, level: Level, text: &str) -> io::Result<()> {
        self.lines
            .lock()
            .expect("capture mutex poisoned - a test thread panicked while holding the lock")
            .push((level, text.to_string()));
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_console_alias(&self) -> bool {
        self.console_alias
    }
}
