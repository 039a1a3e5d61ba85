//! Native members: the last tier of operation dispatch.
//!
//! When neither the core namespaces nor the registry know a name, the value
//! itself is asked whether it exposes a member of that name: string methods on
//! strings, array methods on arrays and so on. Values without such a member
//! make the resolver decline, and the dispatcher passes them through.

use serde_json::Value;

use super::value::{as_index, built_length, display, flatten_args, format_number, slice_range, strict_eq, to_number};
use super::{strip_discriminator, Resolver};
use crate::transform_registry::TransformError;

/// Resolver for members of the current value
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeMembers;

impl Resolver for NativeMembers {
    fn tier(&self) -> &'static str {
        "native"
    }

    fn resolve(&self, name: &str, value: &Value, args: &[Value]) -> Option<Result<Value, TransformError>> {
        call_member(value, name, strip_discriminator(args))
    }
}

/// Invoke member `name` of `value`, `None` when the value has no such member
pub fn call_member(value: &Value, name: &str, args: &[Value]) -> Option<Result<Value, TransformError>> {
    match value {
        Value::String(s) => string_member(s, name, args),
        Value::Array(items) => array_member(items, name, args).map(Ok),
        Value::Number(_) => number_member(value, name, args).map(Ok),
        Value::Bool(b) => match name {
            "toString" => Some(Ok(Value::String(b.to_string()))),
            _ => None,
        },
        _ => None,
    }
}

fn arg_str(args: &[Value], index: usize) -> Option<String> {
    match args.get(index) {
        None | Some(Value::Null) => None,
        Some(value) => Some(display(value)),
    }
}

fn char_slice(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

fn string_member(s: &str, name: &str, args: &[Value]) -> Option<Result<Value, TransformError>> {
    let len = s.chars().count();

    let result = match name {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "trimStart" => Value::String(s.trim_start().to_string()),
        "trimEnd" => Value::String(s.trim_end().to_string()),
        "toString" => Value::String(s.to_string()),
        "split" => {
            let parts: Vec<Value> = match arg_str(args, 0) {
                None => vec![Value::String(s.to_string())],
                Some(sep) if sep.is_empty() => s.chars().map(|c| Value::String(c.to_string())).collect(),
                Some(sep) => s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect(),
            };
            let limit = as_index(args.get(1)).map_or(parts.len(), |n| n.max(0) as usize);
            Value::Array(parts.into_iter().take(limit).collect())
        }
        "slice" => {
            let (start, end) = slice_range(args.first(), args.get(1), len);
            Value::String(char_slice(s, start, end))
        }
        "substring" => {
            let clamp = |v: Option<&Value>, default: usize| {
                as_index(v).map_or(default, |i| i.clamp(0, len as i64) as usize)
            };
            let a = clamp(args.first(), 0);
            let b = match args.get(1) {
                None | Some(Value::Null) => len,
                some => clamp(some, len),
            };
            Value::String(char_slice(s, a.min(b), a.max(b)))
        }
        "charAt" => {
            let index = as_index(args.first()).unwrap_or(0);
            let c = usize::try_from(index).ok().and_then(|i| s.chars().nth(i));
            Value::String(c.map(String::from).unwrap_or_default())
        }
        "at" => {
            let index = as_index(args.first()).unwrap_or(0);
            let resolved = if index < 0 { len as i64 + index } else { index };
            usize::try_from(resolved)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map_or(Value::Null, |c| Value::String(c.to_string()))
        }
        "indexOf" => {
            let needle = arg_str(args, 0).unwrap_or_default();
            let found = s.find(needle.as_str()).map_or(-1, |byte| s[..byte].chars().count() as i64);
            Value::from(found)
        }
        "includes" => Value::Bool(s.contains(arg_str(args, 0).unwrap_or_default().as_str())),
        "startsWith" => Value::Bool(s.starts_with(arg_str(args, 0).unwrap_or_default().as_str())),
        "endsWith" => Value::Bool(s.ends_with(arg_str(args, 0).unwrap_or_default().as_str())),
        "replace" | "replaceAll" => {
            let pattern = arg_str(args, 0).unwrap_or_default();
            let replacement = arg_str(args, 1).unwrap_or_default();
            if name == "replace" {
                Value::String(s.replacen(pattern.as_str(), &replacement, 1))
            } else {
                Value::String(s.replace(pattern.as_str(), &replacement))
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for arg in args {
                out.push_str(&display(arg));
            }
            Value::String(out)
        }
        "padStart" | "padEnd" => return Some(pad(s, len, name == "padStart", args)),
        "repeat" => return Some(repeat(s, len, args)),
        _ => return None,
    };

    Some(Ok(result))
}

fn pad(s: &str, len: usize, at_start: bool, args: &[Value]) -> Result<Value, TransformError> {
    let target = as_index(args.first()).unwrap_or(0).max(0) as u128;
    let fill = arg_str(args, 1).unwrap_or_else(|| " ".to_string());
    if target <= len as u128 || fill.is_empty() {
        return Ok(Value::String(s.to_string()));
    }

    let target = built_length(target, "padded string")?;
    let padding: String = fill.chars().cycle().take(target - len).collect();
    Ok(Value::String(if at_start {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }))
}

fn repeat(s: &str, len: usize, args: &[Value]) -> Result<Value, TransformError> {
    let count = as_index(args.first()).unwrap_or(0);
    let count = u128::try_from(count)
        .map_err(|_| TransformError::InvalidArgs(format!("invalid repeat count: {}", count)))?;
    if len == 0 || count == 0 {
        return Ok(Value::String(String::new()));
    }

    built_length(len as u128 * count, "repeated string")?;
    Ok(Value::String(s.repeat(count as usize)))
}

fn array_member(items: &[Value], name: &str, args: &[Value]) -> Option<Value> {
    let result = match name {
        "join" => {
            let separator = arg_str(args, 0).unwrap_or_else(|| ",".to_string());
            let parts: Vec<String> = items
                .iter()
                .map(|item| if item.is_null() { String::new() } else { display(item) })
                .collect();
            Value::String(parts.join(&separator))
        }
        "toString" => Value::String(display(&Value::Array(items.to_vec()))),
        "slice" => {
            let (start, end) = slice_range(args.first(), args.get(1), items.len());
            Value::Array(items[start..end].to_vec())
        }
        "at" => {
            let index = as_index(args.first()).unwrap_or(0);
            let resolved = if index < 0 { items.len() as i64 + index } else { index };
            usize::try_from(resolved)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null)
        }
        "concat" => {
            let mut out = items.to_vec();
            out.extend(flatten_args(args));
            Value::Array(out)
        }
        "reverse" => Value::Array(items.iter().rev().cloned().collect()),
        "includes" => {
            let needle = args.first().unwrap_or(&Value::Null);
            Value::Bool(items.iter().any(|item| strict_eq(item, needle)))
        }
        "indexOf" => {
            let needle = args.first().unwrap_or(&Value::Null);
            let found = items.iter().position(|item| strict_eq(item, needle));
            Value::from(found.map_or(-1, |i| i as i64))
        }
        "flat" => {
            let depth = as_index(args.first()).unwrap_or(1).max(0) as usize;
            Value::Array(flatten_depth(items, depth))
        }
        "sort" => {
            let mut sorted = items.to_vec();
            sorted.sort_by_key(display);
            Value::Array(sorted)
        }
        _ => return None,
    };

    Some(result)
}

fn flatten_depth(items: &[Value], depth: usize) -> Vec<Value> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => out.extend(flatten_depth(inner, depth - 1)),
            other => out.push(other.clone()),
        }
    }
    out
}

fn number_member(value: &Value, name: &str, args: &[Value]) -> Option<Value> {
    let f = to_number(value);

    let result = match name {
        "toFixed" => {
            let digits = as_index(args.first()).unwrap_or(0).clamp(0, 100) as usize;
            Value::String(format!("{:.*}", digits, f))
        }
        "toString" => match as_index(args.first()) {
            Some(radix) if radix != 10 && f.fract() == 0.0 => Value::String(to_radix(f as i64, radix as u32)),
            _ => Value::String(format_number(f)),
        },
        _ => return None,
    };

    Some(result)
}

fn to_radix(n: i64, radix: u32) -> String {
    if !(2..=36).contains(&radix) {
        return n.to_string();
    }
    let mut digits = Vec::new();
    let mut rest = n.unsigned_abs();
    loop {
        let digit = (rest % radix as u64) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        rest /= radix as u64;
        if rest == 0 {
            break;
        }
    }
    if n < 0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member(value: &Value, name: &str, args: &[Value]) -> Option<Value> {
        call_member(value, name, args).map(|result| result.unwrap())
    }

    #[test]
    fn test_string_members() {
        assert_eq!(member(&json!("abc"), "toUpperCase", &[]), Some(json!("ABC")));
        assert_eq!(
            member(&json!("five,six,seven"), "split", &[json!(",")]),
            Some(json!(["five", "six", "seven"]))
        );
        assert_eq!(member(&json!("hello"), "slice", &[json!(1), json!(-1)]), Some(json!("ell")));
        assert_eq!(member(&json!("7"), "padStart", &[json!(3), json!("0")]), Some(json!("007")));
        assert_eq!(member(&json!("a-b-c"), "replace", &[json!("-"), json!("+")]), Some(json!("a+b-c")));
    }

    #[test]
    fn test_array_members() {
        let items = json!(["FIVE", "SIX", "SEVEN", "EIGHT"]);

        assert_eq!(
            member(&items, "slice", &[json!(0), json!(-1)]),
            Some(json!(["FIVE", "SIX", "SEVEN"]))
        );
        assert_eq!(member(&json!([1, 2]), "join", &[json!(":")]), Some(json!("1:2")));
        assert_eq!(member(&json!([1, [2, [3]]]), "flat", &[]), Some(json!([1, 2, [3]])));
        assert_eq!(member(&json!([1, 2]), "at", &[json!(-1)]), Some(json!(2)));
        assert_eq!(member(&json!([1, 2]), "indexOf", &[json!(5)]), Some(json!(-1)));
    }

    #[test]
    fn test_number_members() {
        assert_eq!(member(&json!(3.14159), "toFixed", &[json!(2)]), Some(json!("3.14")));
        assert_eq!(member(&json!(255), "toString", &[json!(16)]), Some(json!("ff")));
    }

    #[test]
    fn test_unknown_member_declines() {
        assert_eq!(member(&json!("abc"), "nonexistentMethod", &[]), None);
        assert_eq!(member(&json!({"a": 1}), "join", &[]), None);
        assert_eq!(member(&json!(null), "toString", &[]), None);
    }

    #[test]
    fn test_repeat_and_pad() {
        assert_eq!(member(&json!("ab"), "repeat", &[json!(3)]), Some(json!("ababab")));
        assert_eq!(member(&json!(""), "repeat", &[json!(i64::MAX)]), Some(json!("")));
        assert_eq!(member(&json!("5"), "padEnd", &[json!(3), json!("-")]), Some(json!("5--")));
        assert_eq!(member(&json!("long"), "padStart", &[json!(2)]), Some(json!("long")));
    }

    #[test]
    fn test_oversized_results_are_rejected() {
        let huge = [json!(i64::MAX)];

        assert!(matches!(call_member(&json!("abc"), "repeat", &huge), Some(Err(TransformError::InvalidArgs(_)))));
        assert!(matches!(
            call_member(&json!("abc"), "repeat", &[json!(-1)]),
            Some(Err(TransformError::InvalidArgs(_)))
        ));
        assert!(matches!(call_member(&json!("abc"), "padStart", &huge), Some(Err(TransformError::InvalidArgs(_)))));
        assert!(matches!(
            call_member(&json!("abc"), "padEnd", &[json!(1e300), json!("x")]),
            Some(Err(TransformError::InvalidArgs(_)))
        ));
    }
}
