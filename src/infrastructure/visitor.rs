//! Field visitor for turning `tracing` fields into log-record parts.
//!
//! The `message` field becomes the record text, an error recorded through
//! `record_error` becomes the attached throwable, and every other field is
//! kept as a string extension. The same visitor collects span fields, which
//! the layer stores in span extensions and copies onto events inside the span.

use crate::domain::event::Throwable;
use std::collections::BTreeMap;
use std::fmt;
use tracing::field::{Field, Visit};

/// Field name carrying the formatted message.
const MESSAGE_FIELD: &str = "message";

/// Span fields stored in span extensions.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpanFields(pub BTreeMap<String, String>);

/// A visitor that splits event fields into message, error and extensions.
///
/// Values are converted to strings; `Debug` formatting is used for anything
/// without a dedicated `record_*` method.
#[derive(Debug, Default)]
pub(crate) struct FieldVisitor {
    message: Option<String>,
    thrown: Option<Throwable>,
    fields: BTreeMap<String, String>,
}

impl FieldVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the visitor and return (message, throwable, other fields).
    pub fn into_parts(self) -> (Option<String>, Option<Throwable>, BTreeMap<String, String>) {
        (self.message, self.thrown, self.fields)
    }

    /// Consume the visitor and return every field, the message included.
    pub fn into_fields(self) -> BTreeMap<String, String> {
        let mut fields = self.fields;
        if let Some(message) = self.message {
            fields.insert(MESSAGE_FIELD.to_string(), message);
        }
        fields
    }

    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if self.thrown.is_none() {
            self.thrown = Some(Throwable::from_error(value));
        }
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_visitor() {
        let visitor = FieldVisitor::new();
        let (message, thrown, fields) = visitor.into_parts();
        assert!(message.is_none());
        assert!(thrown.is_none());
        assert!(fields.is_empty());
    }

    #[test]
    fn test_into_fields_keeps_message() {
        let visitor = FieldVisitor {
            message: Some("hello".into()),
            thrown: None,
            fields: BTreeMap::from([("user".to_string(), "7".to_string())]),
        };
        let fields = visitor.into_fields();
        assert_eq!(fields.get("message").map(String::as_str), Some("hello"));
        assert_eq!(fields.get("user").map(String::as_str), Some("7"));
    }
}
