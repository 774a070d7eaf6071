//! Log writers: rolling files and the console.
//!
//! [`FileLogWriter`] appends records to the active file of a rolling
//! [`FileLogSet`], writes the file header on every new file and rolls when
//! the size limit is reached. [`ConsoleWriter`] writes to the real process
//! streams; in alias mode it stands in for a trace file named `stdout`.

use crate::application::config::HeaderInfo;
use crate::application::ports::{Clock, LogWriter};
use crate::domain::level::Level;
use crate::infrastructure::file_log_set::FileLogSet;
use crate::infrastructure::raw::INTERNAL_TARGET;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

const BANNER: &str =
    "********************************************************************************";

/// Render the banner block written at the top of every log file.
///
/// The trace specification line is added for trace files.
pub fn render_header(header: &HeaderInfo, trace_specification: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str(BANNER);
    out.push('\n');
    for (key, value) in header.entries() {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
    out.push_str(BANNER);
    out.push('\n');
    if let Some(spec) = trace_specification {
        out.push_str("trace.specification = ");
        out.push_str(spec);
        out.push('\n');
    }
    out
}

/// Split `messages.log` into (`messages`, `.log`).
pub fn split_file_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(dot) => name.split_at(dot),
    }
}

/// Settings of a file writer that may change without reopening it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWriterSettings {
    pub max_files: usize,
    /// Roll when the file would exceed this many bytes.
    pub max_size: Option<u64>,
    /// Header text, or `None` to write no header (JSON output).
    pub header: Option<String>,
}

#[derive(Debug)]
struct FileState {
    set: FileLogSet,
    file: Option<File>,
    written: u64,
    settings: FileWriterSettings,
    closed: bool,
}

impl FileState {
    fn open_new(&mut self) -> io::Result<()> {
        self.file = None;
        let path = self.set.create_new_file().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("no log file available in {}", self.set.directory().display()),
            )
        })?;
        let mut file = OpenOptions::new().append(true).open(&path)?;
        self.written = file.metadata().map(|m| m.len()).unwrap_or(0);
        if let Some(header) = &self.settings.header {
            file.write_all(header.as_bytes())?;
            self.written += header.len() as u64;
        }
        debug!(target: INTERNAL_TARGET, file = %path.display(), "opened log file");
        self.file = Some(file);
        Ok(())
    }
}

/// Writer appending to a rolling log file.
#[derive(Debug)]
pub struct FileLogWriter {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileLogWriter {
    /// Open `directory/file_name`, rolling any previous contents aside.
    ///
    /// Failure to open is not fatal: it is retried on the next write.
    pub fn open(
        directory: &Path,
        file_name: &str,
        settings: FileWriterSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (base, extension) = split_file_name(file_name);
        let mut set = FileLogSet::new(true, clock);
        set.update(directory, base, extension, settings.max_files);
        let mut state = FileState {
            set,
            file: None,
            written: 0,
            settings,
            closed: false,
        };
        if let Err(e) = state.open_new() {
            crate::infrastructure::raw::report("unable to open log file", &e);
        }
        Self {
            path: directory.join(file_name),
            state: Mutex::new(state),
        }
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply settings that do not require reopening the file.
    pub fn reconfigure(&self, settings: FileWriterSettings) {
        let mut state = self.lock();
        let directory = state.set.directory().to_path_buf();
        let (base, extension) = split_file_name(
            self.path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default(),
        );
        state.set.update(directory, base, extension, settings.max_files);
        state.settings = settings;
    }

    /// Dated files rolled aside so far, oldest first.
    pub fn rolled_files(&self) -> Vec<PathBuf> {
        self.lock().set.files()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LogWriter for FileLogWriter {
    fn write_record(&self, _level: Level, text: &str) -> io::Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }
        let needed = text.len() as u64 + 1;
        let over_limit = state
            .settings
            .max_size
            .is_some_and(|max| state.written > 0 && state.written + needed > max);
        if state.file.is_none() || over_limit {
            state.open_new()?;
        }
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file not open"))?;
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        file.write_all(line.as_bytes())?;
        state.written += needed;
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        match self.lock().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    fn close(&self) -> io::Result<()> {
        let mut state = self.lock();
        state.closed = true;
        match state.file.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Writer targeting the real stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleWriter {
    alias: bool,
}

impl ConsoleWriter {
    /// Console writer sending WARNING and above to stderr, the rest to stdout.
    pub fn new() -> Self {
        Self { alias: false }
    }

    /// Trace writer that forwards everything to stdout.
    pub fn stdout_alias() -> Self {
        Self { alias: true }
    }

    fn uses_stderr(&self, level: Level) -> bool {
        !self.alias && (level == Level::SystemErr || (!level.is_stream() && level.at_least(Level::Warning)))
    }
}

impl LogWriter for ConsoleWriter {
    fn write_record(&self, level: Level, text: &str) -> io::Result<()> {
        if self.uses_stderr(level) {
            let stderr = io::stderr();
            let mut handle = stderr.lock();
            writeln!(handle, "{}", text)
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", text)
        }
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().flush()?;
        io::stderr().flush()
    }

    fn is_console_alias(&self) -> bool {
        self.alias
    }
}
