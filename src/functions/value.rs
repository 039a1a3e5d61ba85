//! Coercions shared by the function tiers.
//!
//! Operation names in directives come from a JavaScript vocabulary
//! (`toUpperCase`, `Number`, `eq`), so their arguments are coerced the way
//! that vocabulary expects: loose truthiness, `Number()`-style numeric
//! conversion and `String()`-style display.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::transform_registry::TransformError;

/// Largest integer magnitude that round-trips through `f64`
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Longest string (in chars) or array a call may build
pub const MAX_BUILT_LENGTH: usize = 1 << 24;

/// Validate the length of a string or array a call is about to build
pub fn built_length(requested: u128, what: &str) -> Result<usize, TransformError> {
    usize::try_from(requested)
        .ok()
        .filter(|len| *len <= MAX_BUILT_LENGTH)
        .ok_or_else(|| {
            TransformError::InvalidArgs(format!(
                "{} length {} exceeds the limit of {}",
                what, requested, MAX_BUILT_LENGTH
            ))
        })
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric conversion; `NaN` when the value has no numeric reading.
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [single] => to_number(single),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    }
}

/// JSON number for `f`: integral values stay integers, non-finite ones become null.
pub fn number(f: f64) -> Value {
    if !f.is_finite() {
        return Value::Null;
    }
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        return Value::Number(Number::from(f as i64));
    }
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

/// Render a float without a trailing `.0` for integral values
pub fn format_number(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        format!("{:.0}", f)
    } else {
        f.to_string()
    }
}

/// String form of a value, as used for joining and concatenation
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => format_number(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| if item.is_null() { String::new() } else { display(item) })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Strict equality, except that numbers compare by value (`1 == 1.0`)
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Relational ordering: strings lexically, everything else numerically.
///
/// `None` when either side has no numeric reading.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => to_number(a).partial_cmp(&to_number(b)),
    }
}

/// Null becomes empty, arrays are kept, anything else is wrapped
pub fn ensure_array(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Flatten one level of nesting
pub fn flatten_args<'a, I>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut flat = Vec::new();
    for value in values {
        match value {
            Value::Array(items) => flat.extend(items.iter().cloned()),
            other => flat.push(other.clone()),
        }
    }
    flat
}

/// Integer reading of an optional argument
pub fn as_index(value: Option<&Value>) -> Option<i64> {
    let f = to_number(value?);
    if f.is_nan() {
        None
    } else {
        Some(f.trunc() as i64)
    }
}

/// Resolve a relative index (negative counts from the end) against `len`
pub fn relative_index(index: i64, len: usize) -> usize {
    let len = len as i64;
    let resolved = if index < 0 { (len + index).max(0) } else { index.min(len) };
    resolved as usize
}

/// Start/end range for `slice(start, end)` style arguments
pub fn slice_range(start: Option<&Value>, end: Option<&Value>, len: usize) -> (usize, usize) {
    let start = as_index(start).map_or(0, |i| relative_index(i, len));
    let end = match end {
        None | Some(Value::Null) => len,
        some => as_index(some).map_or(len, |i| relative_index(i, len)),
    };
    (start, end.max(start))
}
