//! Periodic maintenance of a [`TraceService`].
//!
//! Each tick checks whether an exception summary is due, drops early records
//! nobody adopted and rolls the FFDC logs once per day.

use crate::application::service::TraceService;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "async")]
use tokio::{sync::watch, task::JoinHandle, time::interval};

/// Error returned when housekeeping configuration validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HousekeepingConfigError {
    /// Tick interval must be greater than zero
    ZeroInterval,
}

impl std::fmt::Display for HousekeepingConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HousekeepingConfigError::ZeroInterval => {
                write!(f, "housekeeping interval must be greater than 0")
            }
        }
    }
}

impl std::error::Error for HousekeepingConfigError {}

/// Configuration for the housekeeping task.
#[derive(Debug, Clone)]
pub struct HousekeepingConfig {
    /// How often to run maintenance
    pub interval: Duration,
    /// Force a final exception summary when shutting down
    pub summary_on_shutdown: bool,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            summary_on_shutdown: true,
        }
    }
}

impl HousekeepingConfig {
    /// Create a config with the given tick interval.
    ///
    /// # Errors
    /// Returns `HousekeepingConfigError::ZeroInterval` if `interval` is zero.
    pub fn new(interval: Duration) -> Result<Self, HousekeepingConfigError> {
        if interval.is_zero() {
            return Err(HousekeepingConfigError::ZeroInterval);
        }
        Ok(Self {
            interval,
            ..Self::default()
        })
    }

    pub fn with_summary_on_shutdown(mut self, enabled: bool) -> Self {
        self.summary_on_shutdown = enabled;
        self
    }
}

/// Runs maintenance for one service.
#[derive(Debug, Clone)]
pub struct Housekeeper {
    service: Arc<TraceService>,
    config: HousekeepingConfig,
}

impl Housekeeper {
    pub fn new(service: Arc<TraceService>, config: HousekeepingConfig) -> Self {
        Self { service, config }
    }

    /// Run a single maintenance pass.
    pub fn run_once(&self) {
        self.service.housekeep();
    }

    pub fn config(&self) -> &HousekeepingConfig {
        &self.config
    }

    /// Start maintenance on the current tokio runtime.
    #[cfg(feature = "async")]
    pub fn start(self) -> HousekeepingHandle {
        let (stop, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = interval(self.config.interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.run_once(),
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            if self.config.summary_on_shutdown {
                self.service.ffdc().log_summary(true);
            }
        });
        HousekeepingHandle {
            stop,
            task: Some(task),
        }
    }
}

/// Error returned when the housekeeping task could not be stopped cleanly.
#[derive(Debug)]
pub enum ShutdownError {
    /// The task panicked or was cancelled
    TaskFailed(String),
}

impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownError::TaskFailed(reason) => {
                write!(f, "housekeeping task failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for ShutdownError {}

/// Handle to a running housekeeping task.
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct HousekeepingHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

#[cfg(feature = "async")]
impl HousekeepingHandle {
    /// Signal the task to stop and wait for it to finish.
    ///
    /// # Errors
    /// Returns `ShutdownError::TaskFailed` if the task panicked.
    pub async fn shutdown(mut self) -> Result<(), ShutdownError> {
        let _ = self.stop.send(true);
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| ShutdownError::TaskFailed(e.to_string())),
            None => Ok(()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

#[cfg(feature = "async")]
impl Drop for HousekeepingHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::LogConfig;
    use crate::domain::event::Throwable;
    use crate::infrastructure::mocks::{MemoryWriter, MockClock};

    fn service(dir: &std::path::Path, clock: Arc<MockClock>) -> Arc<TraceService> {
        let config = LogConfig::builder()
            .with_log_directory(dir)
            .with_copy_system_streams(false)
            .build()
            .unwrap();
        TraceService::builder()
            .with_config(config)
            .with_clock(clock)
            .with_message_writer(Arc::new(MemoryWriter::new()))
            .with_trace_writer(Arc::new(MemoryWriter::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert_eq!(
            HousekeepingConfig::new(Duration::ZERO).unwrap_err(),
            HousekeepingConfigError::ZeroInterval
        );
        assert!(HousekeepingConfig::new(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_run_once_rolls_on_new_day() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(MockClock::new());
        let service = service(dir.path(), clock.clone());
        let boom = Throwable::new("IoError", "boom");
        assert!(service.process_exception(&boom, "db::pool", "17", None, &[]).is_some());
        assert!(service.process_exception(&boom, "db::pool", "17", None, &[]).is_none());

        let housekeeper = Housekeeper::new(service.clone(), HousekeepingConfig::default());
        housekeeper.run_once();
        assert!(service.process_exception(&boom, "db::pool", "17", None, &[]).is_none());

        clock.advance(Duration::from_secs(24 * 60 * 60));
        housekeeper.run_once();
        assert!(service.process_exception(&boom, "db::pool", "17", None, &[]).is_some());
        assert_eq!(service.ffdc().incidents()[0].count, 4);
    }

    #[cfg(feature = "async")]
    #[tokio::test(start_paused = true)]
    async fn test_start_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(MockClock::new());
        let service = service(dir.path(), clock);
        let handle = Housekeeper::new(
            service.clone(),
            HousekeepingConfig::new(Duration::from_millis(10))
                .unwrap()
                .with_summary_on_shutdown(false),
        )
        .start();

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(!handle.is_finished());
        handle.shutdown().await.unwrap();
        assert!(!service.is_closed());
    }
}
