//! Trace specification parsing.
//!
//! A specification is a colon-separated list of `component=level` clauses such
//! as `*=info:com.example.db.*=all`. Components are logger-name prefixes; a
//! trailing `*` (or `.*` / `::*`) matches everything below it. The longest
//! matching clause wins.

use crate::domain::level::Level;
use std::fmt;

/// Threshold for one clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// Everything is loggable.
    All,
    /// Nothing is loggable.
    Off,
    /// Events at or above the level are loggable.
    At(Level),
}

impl Threshold {
    fn allows(self, level: Level) -> bool {
        match self {
            Threshold::All => true,
            Threshold::Off => false,
            Threshold::At(threshold) => level.at_least(threshold),
        }
    }

    fn finer_than_info(self) -> bool {
        match self {
            Threshold::All => true,
            Threshold::Off => false,
            Threshold::At(threshold) => !threshold.is_message(),
        }
    }
}

/// Error returned for malformed specifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceSpecError {
    /// A clause did not contain `=`.
    MissingLevel(String),
    /// The level name was not recognized.
    UnknownLevel(String),
}

impl fmt::Display for TraceSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceSpecError::MissingLevel(clause) => {
                write!(f, "trace clause '{}' has no level", clause)
            }
            TraceSpecError::UnknownLevel(level) => {
                write!(f, "unknown trace level '{}'", level)
            }
        }
    }
}

impl std::error::Error for TraceSpecError {}

/// Parsed trace specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSpec {
    source: String,
    clauses: Vec<(String, Threshold)>,
}

impl Default for TraceSpec {
    fn default() -> Self {
        Self {
            source: "*=info".to_string(),
            clauses: vec![(String::new(), Threshold::At(Level::Info))],
        }
    }
}

impl TraceSpec {
    /// Parse a specification string. An empty string yields the default `*=info`.
    pub fn parse(spec: &str) -> Result<Self, TraceSpecError> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let mut clauses = Vec::new();
        for clause in split_clauses(trimmed).map(str::trim).filter(|c| !c.is_empty()) {
            let (component, level) = clause
                .split_once('=')
                .ok_or_else(|| TraceSpecError::MissingLevel(clause.to_string()))?;
            let threshold = match level.trim().to_ascii_lowercase().as_str() {
                "all" => Threshold::All,
                "off" => Threshold::Off,
                other => Threshold::At(
                    other
                        .parse::<Level>()
                        .map_err(|_| TraceSpecError::UnknownLevel(level.trim().to_string()))?,
                ),
            };
            clauses.push((normalize_component(component.trim()), threshold));
        }

        if !clauses.iter().any(|(c, _)| c.is_empty()) {
            clauses.push((String::new(), Threshold::At(Level::Info)));
        }
        // Longest prefix first so the most specific clause is found first.
        clauses.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Ok(Self {
            source: trimmed.to_string(),
            clauses,
        })
    }

    /// The specification text as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether a record from `logger` at `level` should reach the trace log.
    pub fn is_loggable(&self, logger: &str, level: Level) -> bool {
        self.threshold_for(logger).allows(level)
    }

    /// Whether anything finer than INFO is enabled for any component.
    pub fn any_enabled(&self) -> bool {
        self.clauses.iter().any(|(_, t)| t.finer_than_info())
    }

    fn threshold_for(&self, logger: &str) -> Threshold {
        self.clauses
            .iter()
            .find(|(prefix, _)| logger.starts_with(prefix.as_str()))
            .map(|(_, t)| *t)
            .unwrap_or(Threshold::At(Level::Info))
    }
}

impl fmt::Display for TraceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Split on single colons; `::` belongs to a component path.
fn split_clauses(spec: &str) -> impl Iterator<Item = &str> {
    let bytes = spec.as_bytes();
    let mut clauses = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' {
            if bytes.get(i + 1) == Some(&b':') {
                i += 2;
                continue;
            }
            clauses.push(&spec[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    clauses.push(&spec[start..]);
    clauses.into_iter()
}

fn normalize_component(component: &str) -> String {
    let stripped = component
        .strip_suffix("::*")
        .or_else(|| component.strip_suffix(".*"))
        .or_else(|| component.strip_suffix('*'))
        .unwrap_or(component);
    stripped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec() {
        let spec = TraceSpec::default();
        assert!(!spec.any_enabled());
        assert!(spec.is_loggable("anything", Level::Info));
        assert!(!spec.is_loggable("anything", Level::Fine));
    }

    #[test]
    fn test_parse_and_match() {
        let spec = TraceSpec::parse("*=info:com.example.db.*=all:com.example=fine").unwrap();
        assert!(spec.any_enabled());
        assert!(spec.is_loggable("com.example.db.Pool", Level::Finest));
        assert!(spec.is_loggable("com.example.web", Level::Fine));
        assert!(!spec.is_loggable("com.example.web", Level::Finer));
        assert!(!spec.is_loggable("org.other", Level::Fine));
    }

    #[test]
    fn test_off_clause() {
        let spec = TraceSpec::parse("*=all:noisy::*=off").unwrap();
        assert!(!spec.is_loggable("noisy::module", Level::Error));
        assert!(spec.is_loggable("quiet", Level::Finest));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            TraceSpec::parse("*info"),
            Err(TraceSpecError::MissingLevel("*info".to_string()))
        );
        assert_eq!(
            TraceSpec::parse("*=loud"),
            Err(TraceSpecError::UnknownLevel("loud".to_string()))
        );
    }

    #[test]
    fn test_empty_is_default() {
        assert_eq!(TraceSpec::parse("  ").unwrap(), TraceSpec::default());
    }
}
