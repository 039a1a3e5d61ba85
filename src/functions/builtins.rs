//! Built-in function catalog, installed into every default registry.
//!
//! Each function receives the current value first, then the call arguments
//! with trace references already substituted.
//!
//! # Conditionals
//!
//! `eq ne gt gte lt lte` read their arguments as `(test, result)` pairs and
//! return the result of the first pair whose test matches the current value:
//!
//! ```text
//! eq: ["a", 1, "b", 2]        "a" -> 1, "b" -> 2, otherwise unchanged
//! eq: ["a", 1, "fallback"]    "a" -> 1, otherwise "fallback"
//! eq: "a"                     "a" -> true, otherwise false
//! ```

use std::cmp::Ordering;

use convert_case::{Case, Casing};
use regex::RegexBuilder;
use serde_json::{Map, Value};

use super::value::{compare, ensure_array, flatten_args, is_truthy, number, strict_eq, to_number};
use crate::transform_registry::{FunctionRegistry, TransformError};

type Comparator = fn(&Value, &Value) -> bool;
type Fold = fn(f64, f64) -> f64;

/// Register the whole catalog
pub fn install(registry: &mut FunctionRegistry) {
    install_collections(registry);
    install_comparisons(registry);
    install_logic(registry);
    install_arithmetic(registry);
    install_utilities(registry);
    install_case(registry);
}

fn install_collections(registry: &mut FunctionRegistry) {
    registry.register("push", |value: Value, args: &[Value]| {
        Ok(with_array(value, |items| items.extend(args.iter().cloned())))
    });
    registry.register("pop", |value: Value, _args: &[Value]| {
        Ok(with_array(value, |items| {
            items.pop();
        }))
    });
    registry.register("shift", |value: Value, _args: &[Value]| {
        Ok(with_array(value, |items| {
            if !items.is_empty() {
                items.remove(0);
            }
        }))
    });
    registry.register("unshift", |value: Value, args: &[Value]| {
        Ok(with_array(value, |items| {
            items.splice(0..0, args.iter().cloned());
        }))
    });
}

/// Mutate an array in place and return it; other values pass through
fn with_array<F>(value: Value, mutate: F) -> Value
where
    F: FnOnce(&mut Vec<Value>),
{
    match value {
        Value::Array(mut items) => {
            mutate(&mut items);
            Value::Array(items)
        }
        other => other,
    }
}

fn install_comparisons(registry: &mut FunctionRegistry) {
    let comparators: [(&str, Comparator); 6] = [
        ("eq", strict_eq),
        ("ne", not_eq),
        ("gt", greater),
        ("gte", greater_or_equal),
        ("lt", less),
        ("lte", less_or_equal),
    ];

    for (name, test) in comparators {
        registry.register(name, move |value: Value, args: &[Value]| Ok(conditional(value, args, test)));
    }

    registry.register("in", |value: Value, args: &[Value]| Ok(Value::Bool(contains_any(&value, args))));
    registry.register("nin", |value: Value, args: &[Value]| Ok(Value::Bool(!contains_any(&value, args))));
}

fn not_eq(a: &Value, b: &Value) -> bool {
    !strict_eq(a, b)
}

fn greater(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Greater)
}

fn greater_or_equal(a: &Value, b: &Value) -> bool {
    matches!(compare(a, b), Some(Ordering::Greater | Ordering::Equal))
}

fn less(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Less)
}

fn less_or_equal(a: &Value, b: &Value) -> bool {
    matches!(compare(a, b), Some(Ordering::Less | Ordering::Equal))
}

/// Pattern-match `value` against `(test, result)` pairs
///
/// An unpaired first argument yields the bare comparison result; an unpaired
/// later argument is the default. With no match the value is returned.
pub fn conditional(value: Value, args: &[Value], test: Comparator) -> Value {
    for (position, pair) in args.chunks(2).enumerate() {
        match pair {
            [candidate, result] => {
                if test(&value, candidate) {
                    return result.clone();
                }
            }
            [candidate] if position == 0 => return Value::Bool(test(&value, candidate)),
            [fallback] => return fallback.clone(),
            _ => {}
        }
    }
    value
}

fn contains_any(value: &Value, args: &[Value]) -> bool {
    let haystack = flatten_args(args);
    ensure_array(value)
        .iter()
        .any(|item| haystack.iter().any(|candidate| strict_eq(item, candidate)))
}

fn install_logic(registry: &mut FunctionRegistry) {
    registry.register("not", |value: Value, _args: &[Value]| Ok(Value::Bool(!is_truthy(&value))));
    registry.register("or", |value: Value, args: &[Value]| {
        Ok(Value::Bool(with_value(&value, args).iter().any(is_truthy)))
    });
    registry.register("and", |value: Value, args: &[Value]| {
        Ok(Value::Bool(with_value(&value, args).iter().all(is_truthy)))
    });
}

/// The current value followed by the arguments, flattened one level
fn with_value(value: &Value, args: &[Value]) -> Vec<Value> {
    flatten_args(std::iter::once(value).chain(args))
}

fn install_arithmetic(registry: &mut FunctionRegistry) {
    let folds: [(&str, Fold); 5] = [
        ("add", |a, b| a + b),
        ("sub", |a, b| a - b),
        ("div", |a, b| a / b),
        ("mul", |a, b| a * b),
        ("mod", |a, b| a % b),
    ];

    for (name, fold) in folds {
        registry.register(name, move |value: Value, args: &[Value]| {
            let result = flatten_args(args)
                .iter()
                .fold(to_number(&value), |acc, arg| fold(acc, to_number(arg)));
            Ok(number(result))
        });
    }
}

fn install_utilities(registry: &mut FunctionRegistry) {
    registry.register("get", |value: Value, args: &[Value]| {
        let path = args.first().map(path_keys).unwrap_or_default();
        let found = lookup(&value, &path).filter(|v| !v.is_null()).cloned();
        Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::Null)))
    });

    registry.register("set", |mut value: Value, args: &[Value]| {
        let path = args.first().map(path_keys).unwrap_or_default();
        let replacement = args.get(1).cloned().unwrap_or(Value::Null);
        assign_path(&mut value, &path, replacement);
        Ok(value)
    });

    registry.register_null_safe("nvl", |value: Value, args: &[Value]| Ok(first_present(value, args)));
    registry.register_null_safe("uvl", |value: Value, args: &[Value]| Ok(first_present(value, args)));
    registry.register_null_safe("default", |value: Value, args: &[Value]| {
        if value.is_null() {
            Ok(flatten_args(args).into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null))
        } else {
            Ok(value)
        }
    });

    registry.register("pairs", |value: Value, args: &[Value]| {
        let items = with_value(&value, args);
        Ok(Value::Array(
            items.chunks(2).map(|pair| Value::Array(pair.to_vec())).collect(),
        ))
    });

    registry.register("flatten", |value: Value, _args: &[Value]| {
        Ok(match value {
            Value::Object(map) => {
                let mut flat = Map::new();
                flatten_into(&mut flat, "", map);
                Value::Object(flat)
            }
            other => other,
        })
    });

    registry.register("unflatten", |value: Value, _args: &[Value]| {
        Ok(match value {
            Value::Object(map) => {
                let mut nested = Value::Object(Map::new());
                for (key, item) in map {
                    let keys: Vec<String> = key.split('.').map(str::to_string).collect();
                    assign_path(&mut nested, &keys, item);
                }
                nested
            }
            other => other,
        })
    });

    registry.register("filter", |value: Value, args: &[Value]| {
        let items = match value {
            Value::Array(items) => items,
            other => return Ok(other),
        };
        let pattern = args
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| TransformError::InvalidArgs("filter expects a pattern string".to_string()))?;
        let regex = parse_regex(pattern)?;

        Ok(Value::Array(
            items
                .into_iter()
                .filter(|item| item.as_str().map_or(false, |s| regex.is_match(s)))
                .collect(),
        ))
    });

    registry.register("pick", |value: Value, args: &[Value]| {
        let mut picked = Map::new();
        for spec in args {
            for (key, target) in pick_keys(spec) {
                let item = value.get(&key).cloned().unwrap_or(Value::Null);
                picked.insert(target, item);
            }
        }
        Ok(Value::Object(picked))
    });
}

fn first_present(value: Value, args: &[Value]) -> Value {
    if !value.is_null() {
        return value;
    }
    args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)
}

/// Keys of a `get`/`set` path: `"a.b[0]"` or `["a", "b", 0]`
fn path_keys(path: &Value) -> Vec<String> {
    match path {
        Value::Array(items) => items.iter().map(super::value::display).collect(),
        Value::String(s) => s
            .replace('[', ".")
            .replace(']', "")
            .split('.')
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![super::value::display(other)],
    }
}

fn lookup<'v>(value: &'v Value, keys: &[String]) -> Option<&'v Value> {
    keys.iter().try_fold(value, |node, key| match node {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write `replacement` at `keys`, creating objects along the way
fn assign_path(target: &mut Value, keys: &[String], replacement: Value) {
    let Some((head, rest)) = keys.split_first() else {
        *target = replacement;
        return;
    };

    let slot = match target {
        Value::Object(map) => map.entry(head.clone()).or_insert(Value::Null),
        Value::Array(items) => match head.parse::<usize>() {
            Ok(index) if index < items.len() => &mut items[index],
            Ok(index) if index == items.len() => {
                items.push(Value::Null);
                &mut items[index]
            }
            _ => return,
        },
        _ => return,
    };

    if !rest.is_empty() && !(slot.is_object() || slot.is_array()) {
        *slot = Value::Object(Map::new());
    }
    assign_path(slot, rest, replacement);
}

fn flatten_into(flat: &mut Map<String, Value>, prefix: &str, map: Map<String, Value>) {
    for (key, item) in map {
        let full = if prefix.is_empty() { key } else { format!("{}.{}", prefix, key) };
        match item {
            Value::Object(inner) if !inner.is_empty() => flatten_into(flat, &full, inner),
            other => {
                flat.insert(full, other);
            }
        }
    }
}

/// Accepts `pattern` or `/pattern/flags` (flags `i`, `m`, `s`, `x`)
fn parse_regex(source: &str) -> Result<regex::Regex, TransformError> {
    let (pattern, flags) = match source.strip_prefix('/').and_then(|rest| rest.rsplit_once('/')) {
        Some((pattern, flags)) => (pattern, flags),
        None => (source, ""),
    };

    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()
        .map_err(|e| TransformError::InvalidArgs(format!("invalid pattern '{}': {}", source, e)))
}

/// `"a"` -> a as a, `["a", "b"]` -> a as b, `{"a": "b"}` -> a as b
fn pick_keys(spec: &Value) -> Vec<(String, String)> {
    match spec {
        Value::String(key) => vec![(key.clone(), key.clone())],
        Value::Array(items) => match items.as_slice() {
            [Value::String(key)] => vec![(key.clone(), key.clone())],
            [Value::String(key), Value::String(target)] => vec![(key.clone(), target.clone())],
            _ => Vec::new(),
        },
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, target)| target.as_str().map(|t| (key.clone(), t.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

fn install_case(registry: &mut FunctionRegistry) {
    registry.register("ucFirst", |value: Value, _args: &[Value]| {
        Ok(map_string(value, |s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }))
    });
    registry.register("lcFirst", |value: Value, _args: &[Value]| {
        Ok(map_string(value, |s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_lowercase().chain(chars).collect(),
                None => String::new(),
            }
        }))
    });

    let cases = [
        ("camelCase", Case::Camel),
        ("snakeCase", Case::Snake),
        ("kebabCase", Case::Kebab),
        ("pascalCase", Case::Pascal),
        ("titleCase", Case::Title),
    ];
    for (name, case) in cases {
        registry.register(name, move |value: Value, _args: &[Value]| {
            Ok(map_string(value, |s| s.to_case(case)))
        });
    }
}

fn map_string<F>(value: Value, f: F) -> Value
where
    F: FnOnce(&str) -> String,
{
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}
