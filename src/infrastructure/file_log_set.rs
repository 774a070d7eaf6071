//! On-disk families of rotating log files.
//!
//! A [`FileLogSet`] owns every file sharing a directory, base name and
//! extension. Two models are supported:
//!
//! - **rolling**: one active file `{base}{ext}` that is renamed aside to a
//!   dated name when a new file is needed (message and trace logs);
//! - **non-rolling**: every new file gets its own dated name (FFDC incidents).
//!
//! Dated names have the form `{base}_yy.MM.dd_HH.mm.ss.{counter}{ext}`. The
//! set is not internally synchronized; callers serialize access with one lock
//! per set.

use crate::application::ports::Clock;
use crate::domain::natural::natural_cmp;
use crate::infrastructure::raw::{self, INTERNAL_TARGET};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const DATE_FORMAT: &str = "%y.%m.%d_%H.%M.%S";
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A bounded, ordered family of log files.
#[derive(Debug)]
pub struct FileLogSet {
    rolling: bool,
    directory: PathBuf,
    base: String,
    extension: String,
    max_files: usize,
    // Dated file names, oldest first.
    files: Vec<String>,
    last_date: String,
    counter: u32,
    clock: Arc<dyn Clock>,
}

impl FileLogSet {
    /// Create an unconfigured set. Call [`update`](Self::update) before use.
    pub fn new(rolling: bool, clock: Arc<dyn Clock>) -> Self {
        Self {
            rolling,
            directory: PathBuf::new(),
            base: String::new(),
            extension: String::new(),
            max_files: 0,
            files: Vec::new(),
            last_date: String::new(),
            counter: 0,
            clock,
        }
    }

    /// Reconfigure the set.
    ///
    /// When the location changes the tracked list is rebuilt from disk. Either
    /// way the set is pruned to `max_files` (0 keeps everything). Returns true
    /// if the location changed.
    pub fn update(
        &mut self,
        directory: impl Into<PathBuf>,
        base: &str,
        extension: &str,
        max_files: usize,
    ) -> bool {
        let directory = directory.into();
        let changed =
            directory != self.directory || base != self.base || extension != self.extension;
        if changed {
            self.directory = directory;
            self.base = base.to_string();
            self.extension = extension.to_string();
            self.last_date.clear();
            self.counter = 0;
            self.files = self.scan();
        }
        self.max_files = max_files;

        if let Some(limit) = self.limit() {
            while self.files.len() > limit {
                self.delete_oldest();
            }
        }
        changed
    }

    pub fn is_rolling(&self) -> bool {
        self.rolling
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// The active file of a rolling set.
    pub fn active_file(&self) -> Option<PathBuf> {
        self.rolling
            .then(|| self.directory.join(format!("{}{}", self.base, self.extension)))
    }

    /// Dated files currently tracked, oldest first.
    pub fn files(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| self.directory.join(f)).collect()
    }

    /// Produce a fresh, empty file.
    ///
    /// Rolling sets return the active file (after moving its previous
    /// contents aside); non-rolling sets return a new dated file. Failures
    /// are reported to raw stderr and yield `None`.
    pub fn create_new_file(&mut self) -> Option<PathBuf> {
        if let Err(e) = fs::create_dir_all(&self.directory) {
            raw::report(
                &format!("unable to create directory {}", self.directory.display()),
                &e,
            );
            return None;
        }
        if self.rolling {
            self.roll_active()
        } else {
            self.create_dated()
        }
    }

    fn roll_active(&mut self) -> Option<PathBuf> {
        let active = self.active_file()?;

        if let Ok(meta) = fs::metadata(&active) {
            if meta.len() == 0 {
                return Some(active);
            }
            if self.max_files == 1 {
                if let Err(e) = fs::remove_file(&active) {
                    raw::report(&format!("unable to delete {}", active.display()), &e);
                }
            } else {
                let name = self.move_aside(&active)?;
                debug!(target: INTERNAL_TARGET, file = %name, "rolled log file");
                self.add_file(name);
            }
        }

        match OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&active)
        {
            Ok(_) => Some(active),
            Err(e) => {
                raw::report(&format!("unable to create {}", active.display()), &e);
                None
            }
        }
    }

    fn move_aside(&mut self, active: &Path) -> Option<String> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = self.next_name();
            let target = self.directory.join(&name);
            if target.exists() {
                continue;
            }
            return match relocate(active, &target, |from, to| fs::rename(from, to)) {
                Ok(()) => Some(name),
                Err(e) => {
                    raw::report(
                        &format!("unable to roll {} to {}", active.display(), target.display()),
                        &e,
                    );
                    None
                }
            };
        }
        raw::report(
            &format!("unable to roll {}", active.display()),
            &"no unused file name",
        );
        None
    }

    fn create_dated(&mut self) -> Option<PathBuf> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = self.next_name();
            let path = self.directory.join(&name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    self.add_file(name);
                    return Some(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    raw::report(&format!("unable to create {}", path.display()), &e);
                    return None;
                }
            }
        }
        raw::report(
            &format!("unable to create file in {}", self.directory.display()),
            &"no unused file name",
        );
        None
    }

    fn next_name(&mut self) -> String {
        let date = self.clock.now().format(DATE_FORMAT).to_string();
        if date != self.last_date {
            self.last_date = date;
            self.counter = 0;
        }
        let name = format!(
            "{}_{}.{}{}",
            self.base, self.last_date, self.counter, self.extension
        );
        self.counter += 1;
        name
    }

    /// Track a new dated file, making room first.
    fn add_file(&mut self, name: String) {
        let index = self
            .files
            .binary_search_by(|f| natural_cmp(f, &name))
            .unwrap_or_else(|i| i);

        if let Some(limit) = self.limit() {
            // Entries newer than the new file only exist if the clock went
            // backwards; drop those before touching older history.
            while self.files.len() >= limit && self.files.len() > index {
                if let Some(newer) = self.files.pop() {
                    self.delete(&newer);
                }
            }
            while self.files.len() >= limit && !self.files.is_empty() {
                self.delete_oldest();
            }
            if limit == 0 {
                self.delete(&name);
                return;
            }
        }

        let index = self
            .files
            .binary_search_by(|f| natural_cmp(f, &name))
            .unwrap_or_else(|i| i);
        self.files.insert(index, name);
    }

    /// Dated files allowed; the active file of a rolling set takes one slot.
    fn limit(&self) -> Option<usize> {
        if self.max_files == 0 {
            None
        } else {
            Some(self.max_files - usize::from(self.rolling))
        }
    }

    fn delete_oldest(&mut self) {
        if !self.files.is_empty() {
            let oldest = self.files.remove(0);
            self.delete(&oldest);
        }
    }

    fn delete(&self, name: &str) {
        let path = self.directory.join(name);
        match fs::remove_file(&path) {
            Ok(()) => debug!(target: INTERNAL_TARGET, file = %path.display(), "pruned log file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => raw::report(&format!("unable to delete {}", path.display()), &e),
        }
    }

    fn scan(&self) -> Vec<String> {
        let prefix = format!("{}_", self.base);
        let mut files: Vec<String> = match fs::read_dir(&self.directory) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| is_dated_name(name, &prefix, &self.extension))
                .collect(),
            Err(_) => Vec::new(),
        };
        files.sort_by(|a, b| natural_cmp(a, b));
        files
    }
}

/// Whether `name` is `{prefix}yy.MM.dd_HH.mm.ss.N{extension}`.
fn is_dated_name(name: &str, prefix: &str, extension: &str) -> bool {
    let Some(middle) = name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(extension))
    else {
        return false;
    };
    let Some((date, counter)) = middle.rsplit_once('.') else {
        return false;
    };
    if counter.is_empty() || !counter.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    date.len() == 17
        && date.bytes().enumerate().all(|(i, b)| match i {
            2 | 5 | 11 | 14 => b == b'.',
            8 => b == b'_',
            _ => b.is_ascii_digit(),
        })
}

/// Move `from` to `to`, copying the bytes when `rename` fails (as it does
/// across filesystems).
fn relocate<F>(from: &Path, to: &Path, rename: F) -> io::Result<()>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    match rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(target: INTERNAL_TARGET, error = %e, "rename failed, copying instead");
            copy_and_delete(from, to)
        }
    }
}

fn copy_and_delete(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    fs::remove_file(from)
}
