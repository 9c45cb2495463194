//! `{{path}}` placeholder substitution.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

/// Placeholder syntax: word characters and dots between double braces.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([\w\.]+)\}\}").expect("Invalid placeholder regex")
});

/// Substitute every placeholder in `template` with the value found at its
/// path in `item`.
///
/// Substitution is textual: values are inserted unescaped.
#[must_use]
pub fn render_template(template: &str, item: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            resolve_path(item, &caps[1]).map(display_value).unwrap_or_default()
        })
        .into_owned()
}

/// Walk a dot-separated path into `item`.
///
/// `self` is the whole item. Array segments are decimal indices. Any
/// missing segment resolves to `None`.
#[must_use]
pub fn resolve_path<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    if path == "self" {
        return Some(item);
    }
    path.split('.').try_fold(item, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Text form of a value inside markup.
///
/// Strings are inserted raw, `null` as nothing, everything else as compact
/// JSON.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
