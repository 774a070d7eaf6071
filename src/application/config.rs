//! Logging configuration.
//!
//! Every field has a default, so a configuration provider may supply any
//! subset of values. Configuration can be built in code through
//! [`LogConfigBuilder`] or deserialized from JSON.

use crate::domain::format::{ConsoleFormat, MessageFormat, TraceFormat};
use crate::domain::level::Level;
use crate::domain::trace_spec::{TraceSpec, TraceSpecError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Trace file name that routes trace output to the console.
pub const STDOUT: &str = "stdout";

/// Error returned when a configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A log file name was empty.
    EmptyFileName(&'static str),
    /// A log file name contained a path separator.
    FileNameHasSeparator(String),
    /// The trace specification did not parse.
    TraceSpec(TraceSpecError),
    /// The configuration document could not be read.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyFileName(which) => write!(f, "{} must not be empty", which),
            ConfigError::FileNameHasSeparator(name) => {
                write!(f, "file name '{}' must not contain a path separator", name)
            }
            ConfigError::TraceSpec(e) => write!(f, "invalid trace specification: {}", e),
            ConfigError::Parse(e) => write!(f, "invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<TraceSpecError> for ConfigError {
    fn from(e: TraceSpecError) -> Self {
        ConfigError::TraceSpec(e)
    }
}

/// Values written into the header of each log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderInfo {
    pub product: String,
    pub install_dir: String,
    pub runtime: String,
    pub os: String,
    pub process: String,
}

impl Default for HeaderInfo {
    fn default() -> Self {
        let install_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.display().to_string()))
            .unwrap_or_default();
        Self {
            product: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            install_dir,
            runtime: format!("rust ({})", std::env::consts::ARCH),
            os: std::env::consts::OS.to_string(),
            process: std::process::id().to_string(),
        }
    }
}

impl HeaderInfo {
    /// Header entries in display order.
    pub fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("product", &self.product),
            ("install directory", &self.install_dir),
            ("runtime", &self.runtime),
            ("os", &self.os),
            ("process", &self.process),
        ]
    }
}

/// Configuration of the routing core and its writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub log_directory: PathBuf,
    pub message_file_name: String,
    /// A file name, or `stdout` to send trace output to the console.
    pub trace_file_name: String,
    /// Maximum files retained per log; 0 keeps everything.
    pub max_files: usize,
    /// Size at which a log is rolled; 0 disables size-based rolling.
    pub max_file_size_mb: u64,
    pub trace_format: TraceFormat,
    pub trace_specification: String,
    pub console_level: Level,
    pub hide_message_ids: BTreeSet<String>,
    pub console_format: ConsoleFormat,
    pub message_format: MessageFormat,
    pub iso_date_format: bool,
    /// Echo captured print streams to the real console.
    pub copy_system_streams: bool,
    pub ffdc_max_files: usize,
    pub header: HeaderInfo,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from("logs"),
            message_file_name: "messages.log".to_string(),
            trace_file_name: "trace.log".to_string(),
            max_files: 2,
            max_file_size_mb: 20,
            trace_format: TraceFormat::default(),
            trace_specification: "*=info".to_string(),
            console_level: Level::Audit,
            hide_message_ids: BTreeSet::new(),
            console_format: ConsoleFormat::default(),
            message_format: MessageFormat::default(),
            iso_date_format: false,
            copy_system_streams: true,
            ffdc_max_files: 500,
            header: HeaderInfo::default(),
        }
    }
}

impl LogConfig {
    /// Create a builder starting from the defaults.
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder {
            config: LogConfig::default(),
        }
    }

    /// Parse and validate a JSON configuration document. Missing keys take defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` if the document is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: LogConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the routing core cannot use.
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_file_name("message_file_name", &self.message_file_name)?;
        check_file_name("trace_file_name", &self.trace_file_name)?;
        TraceSpec::parse(&self.trace_specification)?;
        Ok(())
    }

    /// The parsed trace specification, falling back to the default on error.
    pub fn trace_spec(&self) -> TraceSpec {
        TraceSpec::parse(&self.trace_specification).unwrap_or_default()
    }

    /// Whether trace output goes to the console instead of a file.
    pub fn trace_to_stdout(&self) -> bool {
        self.trace_file_name.eq_ignore_ascii_case(STDOUT)
    }

    pub fn message_log_path(&self) -> PathBuf {
        self.log_directory.join(&self.message_file_name)
    }

    pub fn trace_log_path(&self) -> Option<PathBuf> {
        if self.trace_to_stdout() {
            None
        } else {
            Some(self.log_directory.join(&self.trace_file_name))
        }
    }

    /// Directory holding FFDC incident files and summaries.
    pub fn ffdc_directory(&self) -> PathBuf {
        self.log_directory.join("ffdc")
    }

    /// Roll threshold in bytes, if size-based rolling is enabled.
    pub fn max_file_size_bytes(&self) -> Option<u64> {
        (self.max_file_size_mb > 0).then(|| self.max_file_size_mb * 1024 * 1024)
    }

    /// Whether a message id is configured to be hidden from console and message log.
    pub fn is_hidden(&self, message_id: &str) -> bool {
        self.hide_message_ids.contains(message_id)
    }
}

fn check_file_name(which: &'static str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyFileName(which));
    }
    if Path::new(name).components().count() > 1 || name.contains(['/', '\\']) {
        return Err(ConfigError::FileNameHasSeparator(name.to_string()));
    }
    Ok(())
}

/// Builder for [`LogConfig`].
#[derive(Debug, Clone)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn with_log_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_directory = dir.into();
        self
    }

    pub fn with_message_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.message_file_name = name.into();
        self
    }

    /// Set the trace file name; `stdout` sends trace output to the console.
    pub fn with_trace_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.trace_file_name = name.into();
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.config.max_files = max_files;
        self
    }

    pub fn with_max_file_size_mb(mut self, mb: u64) -> Self {
        self.config.max_file_size_mb = mb;
        self
    }

    pub fn with_trace_format(mut self, format: TraceFormat) -> Self {
        self.config.trace_format = format;
        self
    }

    /// Set the trace specification. Validated when `build()` is called.
    pub fn with_trace_specification(mut self, spec: impl Into<String>) -> Self {
        self.config.trace_specification = spec.into();
        self
    }

    pub fn with_console_level(mut self, level: Level) -> Self {
        self.config.console_level = level;
        self
    }

    /// Hide messages with these ids from the console and message log.
    ///
    /// Empty ids are ignored.
    pub fn with_hidden_message_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.hide_message_ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| !id.is_empty())
            .collect();
        self
    }

    pub fn with_console_format(mut self, format: ConsoleFormat) -> Self {
        self.config.console_format = format;
        self
    }

    pub fn with_message_format(mut self, format: MessageFormat) -> Self {
        self.config.message_format = format;
        self
    }

    pub fn with_iso_date_format(mut self, enabled: bool) -> Self {
        self.config.iso_date_format = enabled;
        self
    }

    pub fn with_copy_system_streams(mut self, enabled: bool) -> Self {
        self.config.copy_system_streams = enabled;
        self
    }

    pub fn with_ffdc_max_files(mut self, max_files: usize) -> Self {
        self.config.ffdc_max_files = max_files;
        self
    }

    pub fn with_header(mut self, header: HeaderInfo) -> Self {
        self.config.header = header;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` if a file name or the trace specification is invalid.
    pub fn build(self) -> Result<LogConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.max_files, 2);
        assert_eq!(config.console_level, Level::Audit);
        assert_eq!(config.trace_format, TraceFormat::Enhanced);
        assert!(!config.trace_to_stdout());
        assert_eq!(config.max_file_size_bytes(), Some(20 * 1024 * 1024));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = LogConfig::from_json(
            r#"{"max_files": 5, "trace_format": "ADVANCED", "hide_message_ids": ["ABCD1234I"]}"#,
        )
        .unwrap();
        assert_eq!(config.max_files, 5);
        assert_eq!(config.trace_format, TraceFormat::Advanced);
        assert_eq!(config.message_file_name, "messages.log");
        assert!(config.is_hidden("ABCD1234I"));
        assert!(!config.is_hidden("ABCD1235I"));
    }

    #[test]
    fn test_json_errors() {
        assert!(matches!(
            LogConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            LogConfig::from_json(r#"{"trace_specification": "*=loud"}"#),
            Err(ConfigError::TraceSpec(_))
        ));
    }

    #[test]
    fn test_builder_validation() {
        assert_eq!(
            LogConfig::builder().with_message_file_name("").build(),
            Err(ConfigError::EmptyFileName("message_file_name"))
        );
        assert_eq!(
            LogConfig::builder().with_trace_file_name("a/b.log").build(),
            Err(ConfigError::FileNameHasSeparator("a/b.log".to_string()))
        );
    }

    #[test]
    fn test_stdout_trace() {
        let config = LogConfig::builder()
            .with_trace_file_name("STDOUT")
            .with_max_file_size_mb(0)
            .build()
            .unwrap();
        assert!(config.trace_to_stdout());
        assert_eq!(config.trace_log_path(), None);
        assert_eq!(config.max_file_size_bytes(), None);
    }

    #[test]
    fn test_hidden_ids_drop_empty() {
        let config = LogConfig::builder()
            .with_hidden_message_ids(vec!["", "ABCD1234I"])
            .build()
            .unwrap();
        assert_eq!(config.hide_message_ids.len(), 1);
    }
}
