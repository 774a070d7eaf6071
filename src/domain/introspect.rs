//! Self-describing objects for diagnostic dumps.
//!
//! Rust has no runtime reflection, so objects opt in to FFDC dumps by
//! implementing [`Introspect`] and reporting their fields to an
//! [`Introspector`]. The introspector enforces a nesting depth and a total
//! byte budget, and renders sensitive values as an opaque placeholder.

use std::fmt::{self, Debug};

/// Objects that can describe their fields for a diagnostic dump.
pub trait Introspect {
    /// Type name shown in the dump header.
    fn type_name(&self) -> &str;

    /// Report fields to the introspector.
    fn introspect(&self, out: &mut Introspector);
}

/// Wrapper whose contents never appear in diagnostic output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Sensitive<T>(pub T);

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<sensitive {}>", std::any::type_name::<T>())
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Default budget for the lightweight dump path.
pub const DEFAULT_DUMP_BYTES: usize = 1024 * 1024;
/// Depth used when a diagnostic module handles the source.
pub const LIGHTWEIGHT_DEPTH: usize = 1;
/// Depth used when no diagnostic module handles the source.
pub const FALLBACK_DEPTH: usize = 3;

const TRUNCATED: &str = "... (dump truncated)\n";

/// Collects a bounded, indented field dump.
#[derive(Debug)]
pub struct Introspector {
    out: String,
    max_depth: usize,
    max_bytes: usize,
    depth: usize,
    exhausted: bool,
}

impl Introspector {
    pub fn new(max_depth: usize, max_bytes: usize) -> Self {
        Self {
            out: String::new(),
            max_depth,
            max_bytes,
            depth: 0,
            exhausted: false,
        }
    }

    /// Dump one root object with a header line.
    pub fn dump_root(&mut self, label: &str, object: &dyn Introspect) {
        self.line(&format!("{} = {}", label, object.type_name()));
        self.depth += 1;
        object.introspect(self);
        self.depth -= 1;
    }

    /// Record a plain field.
    pub fn field(&mut self, name: &str, value: &dyn Debug) {
        let rendered = format!("{:?}", value);
        self.line(&format!("{} = {}", name, rendered));
    }

    /// Record a field whose value must not be revealed.
    pub fn sensitive(&mut self, name: &str, type_name: &str) {
        self.line(&format!("{} = <sensitive {}>", name, type_name));
    }

    /// Record a nested object, descending while the depth budget allows.
    pub fn nested(&mut self, name: &str, value: &dyn Introspect) {
        if self.depth >= self.max_depth {
            self.line(&format!("{} = {} (not expanded)", name, value.type_name()));
            return;
        }
        self.line(&format!("{} = {}", name, value.type_name()));
        self.depth += 1;
        value.introspect(self);
        self.depth -= 1;
    }

    /// Free-form line at the current indentation.
    pub fn note(&mut self, text: &str) {
        self.line(text);
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        if self.exhausted {
            return;
        }
        let indent = self.depth * 2;
        if self.out.len() + indent + text.len() + 1 > self.max_bytes {
            self.out.push_str(TRUNCATED);
            self.exhausted = true;
            return;
        }
        for _ in 0..indent {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}
