//! Request body scrubbing applied before any DTO is deserialised.
//!
//! Object keys that look like query operators (`$where`, `a.b`) are dropped,
//! strings are trimmed, angle brackets are escaped and control characters
//! other than newline and tab are removed. Password fields pass untouched so
//! that hashing sees exactly what the user typed.

use serde_json::{Map, Value};

const VERBATIM_KEYS: [&str; 4] = ["password", "current_password", "new_password", "confirm_password"];

pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sanitize_object(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::String(s) => Value::String(sanitize_str(&s)),
        other => other,
    }
}

fn sanitize_object(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(key, _)| !is_operator_key(key))
        .map(|(key, value)| {
            let value = if VERBATIM_KEYS.contains(&key.as_str()) {
                value
            } else {
                sanitize_value(value)
            };
            (key, value)
        })
        .collect()
}

pub fn is_operator_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

pub fn sanitize_str(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.trim().chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' | '\t' => out.push(ch),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
