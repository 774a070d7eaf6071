//! Deduplicated exception incidents.
//!
//! An incident groups every occurrence of one exception type raised at one
//! (source, probe) location. Within an incident, distinct exception messages
//! are tracked as variants keyed by a hash of the message text; each variant
//! owns at most one diagnostic file. A variant is *fresh* right after its file
//! is written and is not dumped again until a daily roll marks it *stale*.

use ahash::AHasher;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;

/// Distinct message variants retained per incident.
pub const MAX_VARIANTS: usize = 10;
/// Occurrences per day after which no new dump is written.
pub const MAX_DUMPS_PER_DAY: u32 = 10;

/// Identity of an incident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IncidentKey {
    pub source_id: String,
    pub probe_id: String,
    pub exception_class: String,
}

impl IncidentKey {
    pub fn new(
        source_id: impl Into<String>,
        probe_id: impl Into<String>,
        exception_class: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            probe_id: probe_id.into(),
            exception_class: exception_class.into(),
        }
    }
}

impl fmt::Display for IncidentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.exception_class, self.source_id, self.probe_id
        )
    }
}

/// Hash used to tell message variants apart.
pub fn message_hash(message: Option<&str>) -> u64 {
    let mut hasher = AHasher::default();
    message.unwrap_or("").hash(&mut hasher);
    hasher.finish()
}

/// What the caller should do after recording an occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Write a diagnostic file for this variant.
    Dump,
    /// The variant was dumped since the last roll.
    AlreadyDumped,
    /// Too many occurrences today.
    DailyLimit,
}

#[derive(Debug, Clone)]
struct Variant {
    hash: u64,
    file: Option<PathBuf>,
    fresh: bool,
}

#[derive(Debug)]
struct IncidentState {
    count: u64,
    first_seen: DateTime<Local>,
    last_seen: DateTime<Local>,
    today: u32,
    // Front is least recently seen.
    variants: VecDeque<Variant>,
}

/// Point-in-time copy of an incident for summaries and eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentSnapshot {
    pub key: IncidentKey,
    pub count: u64,
    pub first_seen: DateTime<Local>,
    pub last_seen: DateTime<Local>,
    pub files: Vec<PathBuf>,
}

/// One tracked incident.
#[derive(Debug)]
pub struct Incident {
    key: IncidentKey,
    state: Mutex<IncidentState>,
}

impl Incident {
    /// Create an incident that has not yet been recorded.
    pub fn new(key: IncidentKey, now: DateTime<Local>) -> Self {
        Self {
            key,
            state: Mutex::new(IncidentState {
                count: 0,
                first_seen: now,
                last_seen: now,
                today: 0,
                variants: VecDeque::new(),
            }),
        }
    }

    pub fn key(&self) -> &IncidentKey {
        &self.key
    }

    /// Count one occurrence and decide whether a dump is needed.
    pub fn record(&self, now: DateTime<Local>, hash: u64) -> RecordOutcome {
        let mut state = self.lock();
        state.count += 1;
        state.last_seen = now;
        state.today += 1;

        if state.today > MAX_DUMPS_PER_DAY {
            return RecordOutcome::DailyLimit;
        }

        let existing = state
            .variants
            .iter()
            .position(|v| v.hash == hash)
            .and_then(|pos| state.variants.remove(pos));

        match existing {
            Some(variant) => {
                let fresh = variant.fresh;
                state.variants.push_back(variant);
                if fresh {
                    RecordOutcome::AlreadyDumped
                } else {
                    RecordOutcome::Dump
                }
            }
            None => RecordOutcome::Dump,
        }
    }

    /// Attach a freshly written file to a variant.
    ///
    /// Returns the files that are no longer referenced: the variant's previous
    /// file and, when the variant list overflows, the evicted oldest variant's
    /// file. The caller deletes them outside this incident's lock.
    pub fn attach_file(&self, hash: u64, file: PathBuf) -> Vec<PathBuf> {
        let mut state = self.lock();
        let mut released = Vec::new();

        if let Some(variant) = state.variants.iter_mut().find(|v| v.hash == hash) {
            if let Some(old) = variant.file.replace(file) {
                released.push(old);
            }
            variant.fresh = true;
            return released;
        }

        state.variants.push_back(Variant {
            hash,
            file: Some(file),
            fresh: true,
        });
        while state.variants.len() > MAX_VARIANTS {
            if let Some(evicted) = state.variants.pop_front() {
                released.extend(evicted.file);
            }
        }
        released
    }

    /// Start a new day: reset the watermark and mark every variant stale.
    pub fn roll(&self) {
        let mut state = self.lock();
        state.today = 0;
        for variant in state.variants.iter_mut() {
            variant.fresh = false;
        }
    }

    pub fn count(&self) -> u64 {
        self.lock().count
    }

    pub fn last_seen(&self) -> DateTime<Local> {
        self.lock().last_seen
    }

    /// Files currently retained, oldest variant first.
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock()
            .variants
            .iter()
            .filter_map(|v| v.file.clone())
            .collect()
    }

    pub fn snapshot(&self) -> IncidentSnapshot {
        let state = self.lock();
        IncidentSnapshot {
            key: self.key.clone(),
            count: state.count,
            first_seen: state.first_seen,
            last_seen: state.last_seen,
            files: state.variants.iter().filter_map(|v| v.file.clone()).collect(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IncidentState> {
        // A panic while holding the lock leaves counters consistent enough to keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
