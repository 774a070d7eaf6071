//! Severity levels for log and trace events.
//!
//! Levels are totally ordered from `Finest` (least severe) to `Fatal`. The two
//! pseudo-levels `SystemOut` and `SystemErr` mark text captured from the
//! process output streams; they rank alongside `Info` and `Error` respectively
//! so that console thresholds treat them like ordinary messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a [`LogEvent`](crate::domain::event::LogEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Finest,
    Finer,
    Fine,
    Event,
    Detail,
    Config,
    Info,
    Audit,
    Warning,
    Error,
    Fatal,
    /// Text printed to the captured standard output stream.
    SystemOut,
    /// Text printed to the captured standard error stream.
    SystemErr,
}

impl Level {
    /// Numeric rank used for threshold comparisons.
    pub fn rank(self) -> u8 {
        match self {
            Level::Finest => 1,
            Level::Finer => 2,
            Level::Fine => 3,
            Level::Event => 4,
            Level::Detail => 4,
            Level::Config => 5,
            Level::Info => 6,
            Level::SystemOut => 6,
            Level::Audit => 7,
            Level::Warning => 8,
            Level::Error => 9,
            Level::SystemErr => 9,
            Level::Fatal => 10,
        }
    }

    /// True when this level is a message (INFO or above, including the stream pseudo-levels).
    pub fn is_message(self) -> bool {
        self.rank() >= Level::Info.rank()
    }

    /// True for the `SystemOut`/`SystemErr` pseudo-levels.
    pub fn is_stream(self) -> bool {
        matches!(self, Level::SystemOut | Level::SystemErr)
    }

    /// Whether an event at this level passes a threshold.
    pub fn at_least(self, threshold: Level) -> bool {
        self.rank() >= threshold.rank()
    }

    /// Fixed three-character marker used by the textual layouts.
    pub fn marker(self) -> &'static str {
        match self {
            Level::Fatal => " F ",
            Level::Error => " E ",
            Level::Warning => " W ",
            Level::Audit => " A ",
            Level::Info => " I ",
            Level::Config => " C ",
            Level::Detail => " D ",
            Level::Event | Level::Fine => " 1 ",
            Level::Finer => " 2 ",
            Level::Finest => " 3 ",
            Level::SystemOut => " O ",
            Level::SystemErr => " R ",
        }
    }

    /// Upper-case name as it appears in configuration and JSON output.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Finest => "FINEST",
            Level::Finer => "FINER",
            Level::Fine => "FINE",
            Level::Event => "EVENT",
            Level::Detail => "DETAIL",
            Level::Config => "CONFIG",
            Level::Info => "INFO",
            Level::Audit => "AUDIT",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
            Level::SystemOut => "SystemOut",
            Level::SystemErr => "SystemErr",
        }
    }

    /// Map a `tracing` level onto the closest severity.
    pub fn from_tracing(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::INFO => Level::Info,
            tracing::Level::DEBUG => Level::Fine,
            tracing::Level::TRACE => Level::Finest,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a level name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(pub String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown level: {}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FINEST" | "DUMP" => Ok(Level::Finest),
            "FINER" | "ENTRYEXIT" | "DEBUG" => Ok(Level::Finer),
            "FINE" | "EVENT" => Ok(Level::Fine),
            "DETAIL" => Ok(Level::Detail),
            "CONFIG" => Ok(Level::Config),
            "INFO" => Ok(Level::Info),
            "AUDIT" => Ok(Level::Audit),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" | "SEVERE" => Ok(Level::Error),
            "FATAL" => Ok(Level::Fatal),
            "SYSTEMOUT" => Ok(Level::SystemOut),
            "SYSTEMERR" => Ok(Level::SystemErr),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}
