// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coercion layer for variable-shaped classifier JSON.
//!
//! Providers do not reliably honor an output schema: the same logical field
//! comes back as a bare string one turn, an array the next, sometimes an
//! object wrapping the value. Raw provider output is never treated as
//! already-typed; every field passes through one of these normalizers.

use serde_json::Value;

/// Keys tried when a scalar arrives wrapped in an object.
const WRAPPER_KEYS: &[&str] = &["value", "text", "name", "query"];

/// Normalize a field to a single non-empty string.
///
/// Accepts a bare string, the first non-empty string of an array, or a
/// wrapped object (`{"value": "..."}` and similar).
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Array(items) => items.iter().find_map(coerce_string),
        Value::Object(map) => WRAPPER_KEYS
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(coerce_string),
        _ => None,
    }
}

/// Normalize a field to a list of non-empty strings.
///
/// Accepts an array of strings, a single string (split on commas when
/// present), or an object whose values are strings.
pub fn coerce_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(coerce_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect(),
        Value::Object(map) => map.values().filter_map(coerce_string).collect(),
        _ => Vec::new(),
    }
}

/// Normalize a field to a bool.
///
/// Accepts a JSON bool, the strings "true"/"false"/"yes"/"no", or a number
/// (nonzero = true). Anything else is `false`.
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// Normalize a confidence field to an f64 clamped to [0, 1].
///
/// Accepts a number or a numeric string. Percentages above 1 are scaled
/// down (a model answering "85" means 0.85). Anything else is 0.0.
pub fn coerce_confidence(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };

    match raw {
        Some(f) if f > 1.0 && f <= 100.0 => f / 100.0,
        Some(f) => f.clamp(0.0, 1.0),
        None => 0.0,
    }
}
