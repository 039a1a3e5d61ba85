//! Path-query evaluation for `Navigate` operations.
//!
//! Expressions are RFC 9535 JSONPath, evaluated with `serde_json_path`, with a
//! few lenient input forms accepted on top:
//!
//! - `""` and `"$"` return the value itself
//! - a missing root is added: `address` is `$.address`, `[*]` is `$[*]`
//! - bare names in brackets are quoted: `$[a,c]` is `$['a','c']`
//! - dotted indices become brackets: `$.arr.1` is `$.arr[1]`
//!
//! Quoted literals (`'...'`, `"..."`) are never rewritten.
//!
//! The node list is unwrapped: no match gives `null`, one match gives that
//! node, several give an array of the nodes.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use serde_json_path::JsonPath;

use crate::transform_registry::TransformError;

static BARE_NAMES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s*\]").expect("bracket pattern is valid")
});

static DOTTED_INDICES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z_]\w*|[\]*$])((?:\.\d+\b)+)").expect("dotted index pattern is valid")
});

static DOT_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(\d+)").expect("index pattern is valid"));

fn rewrite_plain(text: &str) -> String {
    let quoted = BARE_NAMES.replace_all(text, |caps: &Captures<'_>| {
        let names: Vec<String> = caps[1].split(',').map(|name| format!("'{}'", name.trim())).collect();
        format!("[{}]", names.join(","))
    });

    DOTTED_INDICES
        .replace_all(&quoted, |caps: &Captures<'_>| {
            format!("{}{}", &caps[1], DOT_INDEX.replace_all(&caps[2], "[$1]"))
        })
        .into_owned()
}

/// Apply [`rewrite_plain`] to everything outside quoted literals
fn rewrite_outside_quotes(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut plain = String::new();
    let mut chars = expression.chars();

    while let Some(c) = chars.next() {
        if c != '\'' && c != '"' {
            plain.push(c);
            continue;
        }

        out.push_str(&rewrite_plain(&plain));
        plain.clear();
        out.push(c);
        while let Some(inner) = chars.next() {
            out.push(inner);
            if inner == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if inner == c {
                break;
            }
        }
    }

    out.push_str(&rewrite_plain(&plain));
    out
}

/// Rewrite a lenient expression into strict JSONPath
///
/// Returns `None` for the identity expressions `""` and `"$"`.
pub fn normalize(expression: &str) -> Option<String> {
    let trimmed = expression.trim();
    if trimmed.is_empty() || trimmed == "$" {
        return None;
    }

    let rooted = if trimmed.starts_with('$') {
        trimmed.to_string()
    } else if trimmed.starts_with('[') {
        format!("${}", trimmed)
    } else {
        format!("$.{}", trimmed)
    };

    Some(rewrite_outside_quotes(&rooted))
}

/// Evaluate `expression` against `value`
///
/// # Returns
///
/// * `Ok(Value)` - the unwrapped node list
/// * `Err(TransformError::PathQuery)` - the expression does not parse
pub fn evaluate(expression: &str, value: &Value) -> Result<Value, TransformError> {
    let Some(normalized) = normalize(expression) else {
        return Ok(value.clone());
    };

    let path = JsonPath::parse(&normalized).map_err(|e| TransformError::PathQuery {
        expression: expression.to_string(),
        value: value.clone(),
        reason: e.to_string(),
    })?;

    let mut nodes = path.query(value).all();
    let result = match nodes.len() {
        0 => Value::Null,
        1 => nodes.remove(0).clone(),
        _ => Value::Array(nodes.into_iter().cloned().collect()),
    };

    tracing::trace!(expression, normalized = %normalized, "Evaluated path expression");
    Ok(result)
}
