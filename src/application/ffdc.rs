//! First Failure Data Capture.
//!
//! Exceptions reported to the [`FfdcService`] are grouped into incidents by
//! (source id, probe id, exception type). The first occurrence of each
//! message variant writes a diagnostic file; repeats only count. A summary of
//! all incidents is written on the hybrid schedule of [`SummaryPolicy`], and
//! the daily [`roll_logs`](FfdcService::roll_logs) caps the number of tracked
//! incidents.

use crate::application::config::LogConfig;
use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, DiagnosticModule};
use crate::application::registry::IncidentRegistry;
use crate::domain::event::Throwable;
use crate::domain::format::Formatter;
use crate::domain::incident::{message_hash, Incident, IncidentKey, IncidentSnapshot, RecordOutcome};
use crate::domain::introspect::{
    Introspect, Introspector, DEFAULT_DUMP_BYTES, FALLBACK_DEPTH, LIGHTWEIGHT_DEPTH,
};
use crate::domain::summary::{render_table, SummaryPolicy};
use crate::infrastructure::eviction::LruEviction;
use crate::infrastructure::file_log_set::FileLogSet;
use crate::infrastructure::raw::{self, INTERNAL_TARGET};
use crate::infrastructure::storage::ShardedStorage;
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

/// Incidents kept after the daily roll.
pub const MAX_INCIDENTS: usize = 500;
/// Summary files kept.
pub const SUMMARY_FILES_KEPT: usize = 10;

const INCIDENT_BASE: &str = "ffdc";
const SUMMARY_BASE: &str = "exception_summary";
const EXTENSION: &str = ".log";

type IncidentStorage = Arc<ShardedStorage<IncidentKey, Arc<Incident>>>;

/// Tracks incidents and writes their diagnostic files.
pub struct FfdcService {
    registry: IncidentRegistry<IncidentStorage>,
    // Independent locks: summary writes never wait on incident writes.
    incident_files: Mutex<FileLogSet>,
    summary_files: Mutex<FileLogSet>,
    clock: Arc<dyn Clock>,
    formatter: RwLock<Formatter>,
    policy: SummaryPolicy,
    modules: RwLock<Vec<(String, Arc<dyn DiagnosticModule>)>>,
    metrics: Metrics,
    since_summary: AtomicU64,
    last_summary: Mutex<DateTime<Local>>,
}

impl FfdcService {
    /// Create a service writing under the configured FFDC directory.
    pub fn new(config: &LogConfig, clock: Arc<dyn Clock>, metrics: Metrics) -> Self {
        Self::with_limits(config, clock, metrics, SummaryPolicy::default(), MAX_INCIDENTS)
    }

    /// Create a service with a custom summary policy and incident cap.
    pub fn with_limits(
        config: &LogConfig,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
        policy: SummaryPolicy,
        max_incidents: usize,
    ) -> Self {
        let registry = IncidentRegistry::new(
            Arc::new(ShardedStorage::new()),
            Arc::clone(&clock),
            Arc::new(LruEviction::new(max_incidents)),
        );
        let service = Self {
            registry,
            incident_files: Mutex::new(FileLogSet::new(false, Arc::clone(&clock))),
            summary_files: Mutex::new(FileLogSet::new(false, Arc::clone(&clock))),
            last_summary: Mutex::new(clock.now()),
            clock,
            formatter: RwLock::new(Formatter::default()),
            policy,
            modules: RwLock::new(Vec::new()),
            metrics,
            since_summary: AtomicU64::new(0),
        };
        service.update_config(config);
        service
    }

    /// Apply a new configuration. Tracked files are re-scanned only if the directory moved.
    pub fn update_config(&self, config: &LogConfig) {
        let directory = config.ffdc_directory();
        lock(&self.incident_files).update(
            &directory,
            INCIDENT_BASE,
            EXTENSION,
            config.ffdc_max_files,
        );
        lock(&self.summary_files).update(&directory, SUMMARY_BASE, EXTENSION, SUMMARY_FILES_KEPT);
        *self.formatter.write().unwrap_or_else(|e| e.into_inner()) =
            Formatter::new(config.trace_format, config.iso_date_format);
    }

    /// Register a module contributing to dumps for sources starting with `prefix`.
    pub fn register_diagnostic_module(&self, prefix: impl Into<String>, module: Arc<dyn DiagnosticModule>) {
        let mut modules = self.modules.write().unwrap_or_else(|e| e.into_inner());
        modules.push((prefix.into(), module));
        // Longest prefix first so the most specific module wins.
        modules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Record an exception and write a diagnostic file when this variant needs one.
    ///
    /// Returns the path of the file written, if any.
    pub fn process_exception(
        &self,
        throwable: &Throwable,
        source_id: &str,
        probe_id: &str,
        caller: Option<&dyn Introspect>,
        objects: &[&dyn Introspect],
    ) -> Option<PathBuf> {
        self.metrics.record_exception_processed();
        self.since_summary.fetch_add(1, Ordering::AcqRel);

        let key = IncidentKey::new(source_id, probe_id, throwable.class_name.as_str());
        let (incident, created) = self.registry.incident(key);
        if created {
            self.metrics.record_incident_created();
        }

        let now = self.clock.now();
        let hash = message_hash(throwable.message.as_deref());
        let written = match incident.record(now, hash) {
            RecordOutcome::Dump => self.write_incident(&incident, hash, throwable, caller, objects, now),
            RecordOutcome::AlreadyDumped | RecordOutcome::DailyLimit => None,
        };
        if written.is_none() {
            self.metrics.record_dump_suppressed();
        }

        self.log_summary(false);
        written
    }

    fn write_incident(
        &self,
        incident: &Incident,
        hash: u64,
        throwable: &Throwable,
        caller: Option<&dyn Introspect>,
        objects: &[&dyn Introspect],
        now: DateTime<Local>,
    ) -> Option<PathBuf> {
        let content = self.render_dump(incident.key(), throwable, caller, objects, now);
        let path = lock(&self.incident_files).create_new_file()?;
        if let Err(e) = fs::write(&path, content) {
            raw::report(&format!("unable to write {}", path.display()), &e);
            return None;
        }
        for released in incident.attach_file(hash, path.clone()) {
            delete_file(&released);
        }
        self.metrics.record_dump_written();
        debug!(target: INTERNAL_TARGET, incident = %incident.key(), file = %path.display(), "wrote incident file");
        Some(path)
    }

    fn render_dump(
        &self,
        key: &IncidentKey,
        throwable: &Throwable,
        caller: Option<&dyn Introspect>,
        objects: &[&dyn Introspect],
        now: DateTime<Local>,
    ) -> String {
        let formatter = self.formatter.read().unwrap_or_else(|e| e.into_inner()).clone();
        let mut out = String::new();
        out.push_str(&format!(
            "------Start of DE processing------ = [{}]\n",
            formatter.format_time(&now)
        ));
        out.push_str(&format!("Exception = {}\n", key.exception_class));
        out.push_str(&format!("Source = {}\n", key.source_id));
        out.push_str(&format!("probeid = {}\n", key.probe_id));
        out.push_str("Stack Dump = ");
        out.push_str(&throwable.full_trace());
        out.push('\n');

        let module = self.module_for(&key.source_id);
        let depth = if module.is_some() {
            LIGHTWEIGHT_DEPTH
        } else {
            FALLBACK_DEPTH
        };
        let mut dump = Introspector::new(depth, DEFAULT_DUMP_BYTES);
        if let Some(caller) = caller {
            dump.note("Dump of callerThis");
            dump.dump_root("callerThis", caller);
        }
        for (index, object) in objects.iter().enumerate() {
            dump.note(&format!("Dump of objects[{}]", index));
            dump.dump_root(&format!("objects[{}]", index), *object);
        }
        if let Some(module) = module {
            dump.note(&format!("Diagnostic module {}", module.name()));
            module.dump(throwable, caller, &mut dump);
        }
        out.push_str(&dump.finish());
        out
    }

    fn module_for(&self, source_id: &str) -> Option<Arc<dyn DiagnosticModule>> {
        self.modules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(prefix, _)| source_id.starts_with(prefix.as_str()))
            .map(|(_, module)| Arc::clone(module))
    }

    /// Write the incident summary if it is due (or `force` is set).
    ///
    /// Returns the summary file written, if any.
    pub fn log_summary(&self, force: bool) -> Option<PathBuf> {
        let now = self.clock.now();
        {
            let mut last = lock(&self.last_summary);
            if !self
                .policy
                .is_due(force, now, *last, self.since_summary.load(Ordering::Acquire))
            {
                return None;
            }
            *last = now;
            self.since_summary.store(0, Ordering::Release);
        }

        let snapshots = self.registry.snapshots();
        let formatter = self.formatter.read().unwrap_or_else(|e| e.into_inner()).clone();
        let table = render_table(&snapshots, |t| formatter.format_time(t));
        let path = lock(&self.summary_files).create_new_file()?;
        if let Err(e) = fs::write(&path, table) {
            raw::report(&format!("unable to write {}", path.display()), &e);
            return None;
        }
        debug!(target: INTERNAL_TARGET, incidents = snapshots.len(), file = %path.display(), "wrote incident summary");
        Some(path)
    }

    /// Daily rollover: every variant becomes eligible for a new dump and the
    /// least recently seen incidents beyond the cap are evicted with their files.
    ///
    /// Returns the number of incidents evicted.
    pub fn roll_logs(&self) -> usize {
        let evicted = self.registry.roll();
        for snapshot in &evicted {
            for file in &snapshot.files {
                delete_file(file);
            }
            self.metrics.record_incident_evicted();
        }
        if !evicted.is_empty() {
            debug!(target: INTERNAL_TARGET, evicted = evicted.len(), "evicted incidents");
        }
        evicted.len()
    }

    /// Copies of every tracked incident, oldest first.
    pub fn incidents(&self) -> Vec<IncidentSnapshot> {
        self.registry.snapshots()
    }

    pub fn incident_count(&self) -> usize {
        self.registry.len()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl std::fmt::Debug for FfdcService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfdcService")
            .field("incidents", &self.registry.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn delete_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => raw::report(&format!("unable to delete {}", path.display()), &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::introspect::Sensitive;
    use crate::infrastructure::mocks::MockClock;
    use std::time::Duration;

    struct Request {
        path: String,
        token: Sensitive<String>,
    }

    impl Introspect for Request {
        fn type_name(&self) -> &str {
            "Request"
        }

        fn introspect(&self, out: &mut Introspector) {
            out.field("path", &self.path);
            out.field("token", &self.token);
        }
    }

    struct PoolModule;

    impl DiagnosticModule for PoolModule {
        fn name(&self) -> &str {
            "pool"
        }

        fn dump(&self, _throwable: &Throwable, _caller: Option<&dyn Introspect>, out: &mut Introspector) {
            out.field("connections", &4);
        }
    }

    fn service(dir: &Path) -> (FfdcService, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new());
        let config = LogConfig::builder().with_log_directory(dir).build().unwrap();
        (FfdcService::new(&config, clock.clone(), Metrics::new()), clock)
    }

    #[test]
    fn test_dump_contents() {
        let dir = tempfile::tempdir().unwrap();
        let (ffdc, _) = service(dir.path());
        let request = Request {
            path: "/orders".into(),
            token: Sensitive::new("secret".into()),
        };
        let error = Throwable::new("NullPointerException", "value was null")
            .with_frames(["orders::submit", "main"]);

        let path = ffdc
            .process_exception(&error, "S", "P", Some(&request), &[])
            .unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("------Start of DE processing------ = ["));
        assert!(text.contains("Exception = NullPointerException\n"));
        assert!(text.contains("Source = S\n"));
        assert!(text.contains("probeid = P\n"));
        assert!(text.contains("orders::submit"));
        assert!(text.contains("path = \"/orders\""));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_diagnostic_module_used_for_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let (ffdc, _) = service(dir.path());
        ffdc.register_diagnostic_module("db.", Arc::new(PoolModule));

        let error = Throwable::new("Timeout", "no connection");
        let path = ffdc.process_exception(&error, "db.pool", "1", None, &[]).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("Diagnostic module pool"));
        assert!(text.contains("connections = 4"));

        let path = ffdc.process_exception(&error, "web", "1", None, &[]).unwrap();
        assert!(!fs::read_to_string(path).unwrap().contains("Diagnostic module"));
    }

    #[test]
    fn test_summary_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let (ffdc, clock) = service(dir.path());
        let error = Throwable::new("E", "m");
        ffdc.process_exception(&error, "S", "P", None, &[]);
        assert_eq!(ffdc.log_summary(false), None);

        clock.advance(Duration::from_secs(301));
        let summary = ffdc.log_summary(false).unwrap();
        let text = fs::read_to_string(summary).unwrap();
        assert!(text.contains("E S P"));
        assert_eq!(ffdc.log_summary(false), None);
        assert!(ffdc.log_summary(true).is_some());
    }

    #[test]
    fn test_daily_limit_counts_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let (ffdc, _) = service(dir.path());
        for i in 0..12 {
            let error = Throwable::new("E", format!("message {}", i));
            ffdc.process_exception(&error, "S", "P", None, &[]);
        }
        let incidents = ffdc.incidents();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].count, 12);
        assert_eq!(incidents[0].files.len(), 10);
        assert_eq!(ffdc.metrics().dumps_suppressed(), 2);
    }
}
