//! Per-match value history referenced by `$N` arguments.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::functions::value::display;

static EXACT_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$(\d+)$").expect("reference pattern is valid"));
static EMBEDDED_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\d+)").expect("reference pattern is valid"));

/// Values seen while running one rule against one match
///
/// Entry 0 is the value before any operation ran; entry `n` is the result of
/// the `n`-th operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    entries: Vec<Value>,
}

impl Trace {
    /// Start a trace from the matched value
    pub fn new(initial: Value) -> Self {
        Self { entries: vec![initial] }
    }

    /// Append the result of an operation
    pub fn record(&mut self, value: Value) {
        self.entries.push(value);
    }

    /// Entry `index`, if recorded
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.entries.get(index)
    }

    fn lookup(&self, index: &str) -> Value {
        index
            .parse::<usize>()
            .ok()
            .and_then(|i| self.get(i))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Replace arguments of the exact form `$N` by trace entry `N`
    ///
    /// Lists and objects are resolved element-wise. References past the end of
    /// the trace resolve to null.
    pub fn resolve(&self, arg: &Value) -> Value {
        match arg {
            Value::String(s) => match EXACT_REFERENCE.captures(s) {
                Some(caps) => self.lookup(&caps[1]),
                None => arg.clone(),
            },
            Value::Array(items) => Value::Array(items.iter().map(|item| self.resolve(item)).collect()),
            Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), self.resolve(v))).collect()),
            other => other.clone(),
        }
    }

    /// Like [`Trace::resolve`], but also substitutes `$N` inside longer strings
    /// with the display form of the entry
    pub fn interpolate(&self, arg: &Value) -> Value {
        match arg {
            Value::String(s) if EXACT_REFERENCE.is_match(s) => self.resolve(arg),
            Value::String(s) => {
                let replaced = EMBEDDED_REFERENCE.replace_all(s, |caps: &Captures<'_>| display(&self.lookup(&caps[1])));
                Value::String(replaced.into_owned())
            }
            Value::Array(items) => Value::Array(items.iter().map(|item| self.interpolate(item)).collect()),
            Value::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), self.interpolate(v))).collect())
            }
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_appends_entries() {
        let mut trace = Trace::new(json!(1));
        trace.record(json!("two"));

        assert_eq!(trace.get(0), Some(&json!(1)));
        assert_eq!(trace.get(1), Some(&json!("two")));
        assert_eq!(trace.get(2), None);
    }

    #[test]
    fn test_resolve_exact_references() {
        let mut trace = Trace::new(json!({"a": 1}));
        trace.record(json!([1, 2]));

        assert_eq!(trace.resolve(&json!("$0")), json!({"a": 1}));
        assert_eq!(trace.resolve(&json!(["$1", "x"])), json!([[1, 2], "x"]));
        assert_eq!(trace.resolve(&json!("$9")), json!(null));
        assert_eq!(trace.resolve(&json!("$0 and more")), json!("$0 and more"));
        assert_eq!(trace.resolve(&json!("$.path")), json!("$.path"));
    }

    #[test]
    fn test_interpolate_embedded_references() {
        let mut trace = Trace::new(json!("Ada"));
        trace.record(json!(36));

        assert_eq!(trace.interpolate(&json!("$0 is $1")), json!("Ada is 36"));
        assert_eq!(trace.interpolate(&json!("$1")), json!(36));
        assert_eq!(trace.interpolate(&json!({"who": "$0!"})), json!({"who": "Ada!"}));
    }
}
