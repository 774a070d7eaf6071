//! Message resolution: translation, placeholder substitution and parameter rendering.
//!
//! Resolution is independent of the output layout. A template is looked up in
//! the event's resource bundle (when the message is a known key), then `{n}`
//! placeholders are replaced by rendered parameters. Two flavors exist:
//!
//! - **plain**: embedded throwables are capped to a fixed number of frames
//! - **verbose**: nothing is truncated
//!
//! Rendering a parameter never fails. Errors raised by a parameter's own string
//! conversion are replaced with a diagnostic placeholder.

use crate::domain::event::{LogEvent, Param, SharedCollection, Traceable};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Budgets applied while rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLimits {
    /// Maximum nesting of arrays rendered element by element.
    pub max_array_depth: usize,
    /// Byte budget for a single array or byte dump.
    pub max_array_bytes: usize,
    /// Frames kept per throwable in plain renderings.
    pub max_frames: usize,
    /// Attempts to snapshot a collection that is being modified.
    pub collection_retries: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            max_array_depth: 8,
            max_array_bytes: 64 * 1024,
            max_frames: 20,
            collection_retries: 100,
        }
    }
}

/// Resolve the event's message text.
pub fn resolve(event: &LogEvent, verbose: bool, limits: &RenderLimits) -> String {
    let template = match &event.bundle {
        Some(bundle) => bundle
            .lookup(&event.message)
            .unwrap_or_else(|| event.message.clone()),
        None => event.message.clone(),
    };

    if event.params.is_empty() || !template.contains('{') {
        return template;
    }

    substitute(&template, &event.params, verbose, limits)
}

/// Replace `{n}` (or `{n,type}`) placeholders with rendered parameters.
///
/// Single quotes follow the usual message-format rules: `''` is a literal quote
/// and text between quotes is copied verbatim.
pub fn substitute(template: &str, params: &[Param], verbose: bool, limits: &RenderLimits) -> String {
    let mut out = String::with_capacity(template.len() + 16 * params.len());
    let mut chars = template.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    out.push('\'');
                } else {
                    quoted = !quoted;
                }
            }
            '{' if !quoted => {
                let mut spec = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    spec.push(inner);
                }
                let index = spec
                    .split(',')
                    .next()
                    .and_then(|n| n.trim().parse::<usize>().ok());
                match (closed, index) {
                    (true, Some(i)) if i < params.len() => {
                        out.push_str(&render_top_level(&params[i], verbose, limits));
                    }
                    _ => {
                        out.push('{');
                        out.push_str(&spec);
                        if closed {
                            out.push('}');
                        }
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn render_top_level(param: &Param, verbose: bool, limits: &RenderLimits) -> String {
    match param {
        Param::Int(i) => group_digits(&i.unsigned_abs().to_string(), *i < 0),
        Param::Float(f) => format_float(*f),
        other => render_param(other, verbose, limits),
    }
}

/// Render one parameter outside any placeholder context.
pub fn render_param(param: &Param, verbose: bool, limits: &RenderLimits) -> String {
    let mut out = String::new();
    render_into(&mut out, param, verbose, limits, 0);
    out
}

fn render_into(out: &mut String, param: &Param, verbose: bool, limits: &RenderLimits, depth: usize) {
    match param {
        Param::Null => out.push_str("null"),
        Param::Str(s) => out.push_str(s),
        Param::Int(i) => out.push_str(&i.to_string()),
        Param::Float(f) => out.push_str(&f.to_string()),
        Param::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Param::Char(c) => out.push(*c),
        Param::Chars(chars) => out.extend(chars.iter()),
        Param::Bytes(bytes) => out.push_str(&hex_dump(bytes, limits.max_array_bytes)),
        Param::Throwable(t) => {
            if verbose {
                out.push_str(&t.full_trace());
            } else {
                out.push_str(&t.truncated_trace(limits.max_frames));
            }
        }
        Param::Traceable(t) => out.push_str(&traceable_string(t.as_ref())),
        Param::Array(items) => render_sequence(out, items, verbose, limits, depth),
        Param::Collection(c) => match snapshot_collection(c.as_ref(), limits.collection_retries) {
            Some(items) => render_sequence(out, &items, verbose, limits, depth),
            None => out.push_str(CONCURRENT_MODIFICATION_PLACEHOLDER),
        },
    }
}

/// Placeholder used when a collection could not be copied consistently.
pub const CONCURRENT_MODIFICATION_PLACEHOLDER: &str =
    "[collection unavailable: modified concurrently while formatting]";

fn render_sequence(
    out: &mut String,
    items: &[Param],
    verbose: bool,
    limits: &RenderLimits,
    depth: usize,
) {
    if depth >= limits.max_array_depth {
        out.push_str("[...]");
        return;
    }
    let start = out.len();
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if out.len() - start > limits.max_array_bytes {
            out.push_str("...");
            break;
        }
        render_into(out, item, verbose, limits, depth + 1);
    }
    out.push(']');
}

fn snapshot_collection(collection: &dyn SharedCollection, retries: usize) -> Option<Vec<Param>> {
    for _ in 0..retries.max(1) {
        if let Ok(items) = collection.try_snapshot() {
            return Some(items);
        }
        std::thread::yield_now();
    }
    None
}

/// Render a traceable object, converting failures and panics into a placeholder.
pub fn traceable_string(traceable: &dyn Traceable) -> String {
    match catch_unwind(AssertUnwindSafe(|| traceable.to_trace_string())) {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => format!(
            "<{} thrown while rendering object of type {}>",
            e,
            traceable.type_name()
        ),
        Err(_) => format!(
            "<panic while rendering object of type {}>",
            traceable.type_name()
        ),
    }
}

fn hex_dump(bytes: &[u8], budget: usize) -> String {
    let shown = bytes.len().min(budget / 2);
    let mut out = String::with_capacity(shown * 2 + 8);
    out.push('[');
    for b in &bytes[..shown] {
        out.push_str(&format!("{:02x}", b));
    }
    if shown < bytes.len() {
        out.push_str("...");
    }
    out.push(']');
    out
}

fn group_digits(digits: &str, negative: bool) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    for (i, d) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(d);
    }
    out
}

fn format_float(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = format!("{:.3}", value.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');
    let negative = value < 0.0 && rounded.chars().any(|c| c != '0' && c != '.');
    let mut out = group_digits(int_part, negative);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Extract a message id such as `CWWKE0001I` from the start of a message.
///
/// Ids are four or five upper-case letters, four digits and a severity letter,
/// followed by a colon.
pub fn message_id(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let letters = bytes.iter().take_while(|b| b.is_ascii_uppercase()).count();
    if !(4..=5).contains(&letters) {
        return None;
    }
    let digits_end = letters + 4;
    if bytes.len() < digits_end + 2 {
        return None;
    }
    if !bytes[letters..digits_end].iter().all(u8::is_ascii_digit) {
        return None;
    }
    if !bytes[digits_end].is_ascii_uppercase() || bytes[digits_end + 1] != b':' {
        return None;
    }
    Some(&text[..digits_end + 1])
}
