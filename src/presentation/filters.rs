//! Template filters available to every askama template.
//!
//! Templates reach these through `use crate::presentation::filters;` in the
//! module that declares the template struct.

use std::fmt::Display;

use serde_json::{Map, Value};
use tracing::debug;

/// Escape a value for embedding inside a quoted JavaScript string literal.
///
/// The value is JSON-encoded and the surrounding quotes are stripped. Characters
/// that could close the enclosing `<script>` element or break the literal in
/// older engines are emitted as `\uXXXX` escapes.
pub fn escape_js(value: &str) -> String {
    let encoded = Value::String(value.to_owned()).to_string();
    let inner = encoded
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(&encoded);

    let mut escaped = String::with_capacity(inner.len());
    for ch in inner.chars() {
        match ch {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\'' => escaped.push_str("\\u0027"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Parse a JSON document, falling back to an empty object.
///
/// Empty input and parse failures both yield `{}`; the error is dropped.
pub fn parse_json_or_empty(value: &str) -> Value {
    if value.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str(value) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(
                target = "storefront::presentation::filters",
                error = %err,
                "from_json filter fell back to an empty object"
            );
            Value::Object(Map::new())
        }
    }
}

/// `{{ value|escapejs|safe }}`
#[askama::filter_fn]
pub fn escapejs<T: Display>(value: T, _: &dyn askama::Values) -> askama::Result<String> {
    Ok(escape_js(&value.to_string()))
}

/// `{% let data = value|from_json %}`
#[askama::filter_fn]
pub fn from_json<T: Display>(value: T, _: &dyn askama::Values) -> askama::Result<Value> {
    Ok(parse_json_or_empty(&value.to_string()))
}
