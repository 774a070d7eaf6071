//! Captured print streams.
//!
//! A [`TeeStream`] stands in for stdout or stderr: bytes written to it are
//! optionally copied to the real stream and buffered; on flush the buffered
//! text becomes a `SystemOut`/`SystemErr` event published through the routing
//! core. [`TeeStream::print`] writes a whole string as one event even when it
//! arrives in chunks. Pending bytes are kept per thread, so a flush publishes
//! only the text written by the flushing thread.

use crate::application::ports::{Clock, LogPublisher};
use crate::domain::event::LogEvent;
use crate::domain::level::Level;
use crate::infrastructure::raw;
use ahash::AHashMap;
use std::cell::Cell;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

/// Logger name of events captured from stdout.
pub const SYSTEM_OUT: &str = "SystemOut";
/// Logger name of events captured from stderr.
pub const SYSTEM_ERR: &str = "SystemErr";

thread_local! {
    // Set while this thread is inside `print`; nested flushes wait for the end.
    static PRINTING: Cell<bool> = const { Cell::new(false) };
}

/// Print stream that publishes what is written to it.
pub struct TeeStream {
    level: Level,
    copy_to_console: bool,
    publisher: Arc<dyn LogPublisher>,
    clock: Arc<dyn Clock>,
    pending: Mutex<AHashMap<ThreadId, Vec<u8>>>,
}

impl TeeStream {
    /// Capture standing in for stdout.
    pub fn stdout(
        publisher: Arc<dyn LogPublisher>,
        clock: Arc<dyn Clock>,
        copy_to_console: bool,
    ) -> Self {
        Self::new(Level::SystemOut, publisher, clock, copy_to_console)
    }

    /// Capture standing in for stderr.
    pub fn stderr(
        publisher: Arc<dyn LogPublisher>,
        clock: Arc<dyn Clock>,
        copy_to_console: bool,
    ) -> Self {
        Self::new(Level::SystemErr, publisher, clock, copy_to_console)
    }

    fn new(
        level: Level,
        publisher: Arc<dyn LogPublisher>,
        clock: Arc<dyn Clock>,
        copy_to_console: bool,
    ) -> Self {
        Self {
            level,
            copy_to_console,
            publisher,
            clock,
            pending: Mutex::new(AHashMap::new()),
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Write `text` and publish it as a single event.
    pub fn print(&self, text: &str) {
        let already_printing = PRINTING.with(|p| p.replace(true));
        for chunk in text.as_bytes().chunks(8192) {
            self.append(chunk);
        }
        if !already_printing {
            PRINTING.with(|p| p.set(false));
            self.publish_buffered();
        }
    }

    /// [`print`](Self::print) followed by a newline.
    pub fn println(&self, text: &str) {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        self.print(&line);
    }

    fn append(&self, bytes: &[u8]) {
        if self.copy_to_console {
            match self.level {
                Level::SystemErr => copy_out(&mut io::stderr(), bytes),
                _ => copy_out(&mut io::stdout(), bytes),
            };
        }
        self.lock()
            .entry(thread::current().id())
            .or_default()
            .extend_from_slice(bytes);
    }

    fn publish_buffered(&self) {
        if PRINTING.with(Cell::get) {
            return;
        }
        let Some(bytes) = self.lock().remove(&thread::current().id()) else {
            return;
        };
        let text = String::from_utf8_lossy(&bytes);
        let text = text.trim_end_matches(['\r', '\n']);
        if text.trim().is_empty() {
            return;
        }
        let logger = if self.level == Level::SystemErr {
            SYSTEM_ERR
        } else {
            SYSTEM_OUT
        };
        self.publisher
            .publish_log_record(LogEvent::new(self.level, logger, text, self.clock.now()));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AHashMap<ThreadId, Vec<u8>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Copy captured bytes to the real console. Failures are reported, never raised.
fn copy_out(out: &mut dyn Write, bytes: &[u8]) -> bool {
    match out.write_all(bytes) {
        Ok(()) => true,
        Err(e) => {
            raw::report("unable to copy captured output to the console", &e);
            false
        }
    }
}

impl std::fmt::Debug for TeeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeeStream")
            .field("level", &self.level)
            .field("copy_to_console", &self.copy_to_console)
            .finish_non_exhaustive()
    }
}

impl Write for &TeeStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.copy_to_console {
            match self.level {
                Level::SystemErr => io::stderr().flush()?,
                _ => io::stdout().flush()?,
            }
        }
        self.publish_buffered();
        Ok(())
    }
}

impl Write for TeeStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self).flush()
    }
}
