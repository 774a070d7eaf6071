//! Incident summaries.
//!
//! The summary file lists every tracked incident. Writing it on every exception
//! would flood the disk during an exception storm, and writing it on a fixed
//! timer would leave it stale during quiet periods. [`SummaryPolicy`] combines
//! both: a summary is due after a long interval regardless of activity, or
//! after a short interval once enough new exceptions have accumulated.

use crate::domain::incident::IncidentSnapshot;
use chrono::{DateTime, Duration, Local};
use std::fmt;

/// Error returned when summary policy validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryPolicyError {
    /// The short interval must not exceed the long interval.
    IntervalsInverted,
    /// Intervals must be positive.
    NonPositiveInterval,
}

impl fmt::Display for SummaryPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryPolicyError::IntervalsInverted => {
                write!(f, "minimum summary interval exceeds maximum interval")
            }
            SummaryPolicyError::NonPositiveInterval => {
                write!(f, "summary intervals must be greater than 0")
            }
        }
    }
}

impl std::error::Error for SummaryPolicyError {}

/// High/low watermark rule deciding when a summary is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryPolicy {
    /// A summary is always due after this long.
    pub max_interval: Duration,
    /// A summary is due after this long once `exception_threshold` is exceeded.
    pub min_interval: Duration,
    pub exception_threshold: u64,
}

impl Default for SummaryPolicy {
    fn default() -> Self {
        Self {
            max_interval: Duration::minutes(5),
            min_interval: Duration::minutes(1),
            exception_threshold: 10,
        }
    }
}

impl SummaryPolicy {
    /// # Errors
    /// Returns an error for non-positive or inverted intervals.
    pub fn new(
        max_interval: Duration,
        min_interval: Duration,
        exception_threshold: u64,
    ) -> Result<Self, SummaryPolicyError> {
        if max_interval <= Duration::zero() || min_interval <= Duration::zero() {
            return Err(SummaryPolicyError::NonPositiveInterval);
        }
        if min_interval > max_interval {
            return Err(SummaryPolicyError::IntervalsInverted);
        }
        Ok(Self {
            max_interval,
            min_interval,
            exception_threshold,
        })
    }

    /// Whether a summary should be written now.
    pub fn is_due(
        &self,
        force: bool,
        now: DateTime<Local>,
        last_dump: DateTime<Local>,
        exceptions_since_dump: u64,
    ) -> bool {
        if force {
            return true;
        }
        let elapsed = now - last_dump;
        elapsed > self.max_interval
            || (exceptions_since_dump > self.exception_threshold && elapsed > self.min_interval)
    }
}

/// Render the summary table.
///
/// `format_time` renders timestamps the same way the log files do.
pub fn render_table<F>(incidents: &[IncidentSnapshot], format_time: F) -> String
where
    F: Fn(&DateTime<Local>) -> String,
{
    let mut out = String::new();
    out.push_str(" Index  Count  Time of first Occurrence    Time of last Occurrence     Exception SourceId ProbeId\n");
    out.push_str("------+------+---------------------------+---------------------------+---------------------------\n");
    for (index, incident) in incidents.iter().enumerate() {
        out.push_str(&format!(
            "{:>6} {:>6} {:>27} {:>27} {}\n",
            index,
            incident.count,
            format_time(&incident.first_seen),
            format_time(&incident.last_seen),
            incident.key
        ));
        for file in &incident.files {
            out.push_str(&format!("{:>69}- {}\n", "", file.display()));
        }
    }
    out.push_str("------+------+---------------------------+---------------------------+---------------------------\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::incident::IncidentKey;
    use std::path::PathBuf;

    #[test]
    fn test_forced() {
        let now = Local::now();
        assert!(SummaryPolicy::default().is_due(true, now, now, 0));
    }

    #[test]
    fn test_long_interval() {
        let policy = SummaryPolicy::default();
        let last = Local::now();
        assert!(!policy.is_due(false, last + Duration::minutes(4), last, 0));
        assert!(policy.is_due(false, last + Duration::minutes(6), last, 0));
    }

    #[test]
    fn test_short_interval_needs_volume() {
        let policy = SummaryPolicy::default();
        let last = Local::now();
        let later = last + Duration::seconds(90);
        assert!(!policy.is_due(false, later, last, 10));
        assert!(policy.is_due(false, later, last, 11));
        assert!(!policy.is_due(false, last + Duration::seconds(30), last, 500));
    }

    #[test]
    fn test_policy_validation() {
        assert_eq!(
            SummaryPolicy::new(Duration::minutes(1), Duration::minutes(5), 10),
            Err(SummaryPolicyError::IntervalsInverted)
        );
        assert_eq!(
            SummaryPolicy::new(Duration::zero(), Duration::zero(), 10),
            Err(SummaryPolicyError::NonPositiveInterval)
        );
        assert!(SummaryPolicy::new(Duration::minutes(5), Duration::minutes(1), 10).is_ok());
    }

    #[test]
    fn test_render_table() {
        let now = Local::now();
        let snapshot = IncidentSnapshot {
            key: IncidentKey::new("S", "P", "NullPointerException"),
            count: 5,
            first_seen: now,
            last_seen: now,
            files: vec![PathBuf::from("/logs/ffdc/ffdc_26.10.18_21.48.05.0.log")],
        };
        let table = render_table(&[snapshot], |_| "T".to_string());
        assert!(table.contains("     0      5"));
        assert!(table.contains("NullPointerException S P"));
        assert!(table.contains("- /logs/ffdc/ffdc_26.10.18_21.48.05.0.log"));
    }
}
