//! Core namespaces: the first tier of call resolution.
//!
//! A call whose name is one of `Date Number String Boolean Array Object Math
//! JSON` is routed here. The first argument selects how the namespace is used:
//!
//! - `"new"` constructs a value (`Date: ["new", "2024-01-02"]`)
//! - `null` or no argument calls the namespace as a function (`Number: [null, "$0"]`)
//! - any other string names a static member (`Math: ["max", 1, "$0"]`)
//!
//! The current value is not passed to namespace calls; reference it with `$0`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::value::{built_length, display, ensure_array, is_truthy, number, to_number};
use super::Resolver;
use crate::transform_registry::TransformError;

/// Namespace names recognized by this tier
pub const NAMESPACES: [&str; 8] = ["Date", "Number", "String", "Boolean", "Array", "Object", "Math", "JSON"];

/// How a namespace is being invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation<'a> {
    Construct,
    Call,
    Static(&'a str),
}

impl<'a> Invocation<'a> {
    /// Split the discriminator off a namespace call's arguments
    pub fn split(args: &'a [Value]) -> (Self, &'a [Value]) {
        match args.split_first() {
            None => (Invocation::Call, args),
            Some((Value::Null, rest)) => (Invocation::Call, rest),
            Some((Value::String(s), rest)) if s == "new" => (Invocation::Construct, rest),
            Some((Value::String(s), rest)) => (Invocation::Static(s.as_str()), rest),
            // Anything else is not a discriminator; treat the whole list as arguments
            Some(_) => (Invocation::Call, args),
        }
    }
}

/// Resolver for the well-known namespaces
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreNamespace;

impl Resolver for CoreNamespace {
    fn tier(&self) -> &'static str {
        "core"
    }

    fn resolve(&self, name: &str, _value: &Value, args: &[Value]) -> Option<Result<Value, TransformError>> {
        let (invocation, rest) = Invocation::split(args);
        match name {
            "Date" => date(invocation, rest),
            "Number" => number_namespace(invocation, rest),
            "String" => string_namespace(invocation, rest),
            "Boolean" => match invocation {
                Invocation::Static(_) => None,
                _ => Some(Ok(Value::Bool(rest.first().map_or(false, is_truthy)))),
            },
            "Array" => array_namespace(invocation, rest),
            "Object" => object_namespace(invocation, rest),
            "Math" => math(invocation, rest),
            "JSON" => json_namespace(invocation, rest),
            _ => None,
        }
    }
}

fn not_callable(namespace: &str) -> Option<Result<Value, TransformError>> {
    Some(Err(TransformError::InvalidArgs(format!(
        "{} can only be used through a static member",
        namespace
    ))))
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Null)
}

// Date

fn iso(datetime: DateTime<Utc>) -> Value {
    Value::String(datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn out_of_range() -> TransformError {
    TransformError::InvalidArgs("date components out of range".to_string())
}

/// UTC date from JavaScript-style components (month is zero based)
///
/// `Ok(None)` when a component has no numeric reading.
fn date_from_parts(parts: &[Value]) -> Result<Option<DateTime<Utc>>, TransformError> {
    let mut fields = [1970.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    for (slot, value) in fields.iter_mut().zip(parts) {
        *slot = to_number(value);
    }
    if fields.iter().any(|f| !f.is_finite()) {
        return Ok(None);
    }

    let [year, month, day, hour, minute, second, millis] = fields;
    let year = i32::try_from(year as i64).map_err(|_| out_of_range())?;
    let base = Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .and_then(|start| start.checked_add_months(chrono::Months::new(month.max(0.0) as u32)))
        .ok_or_else(out_of_range)?;

    let offset = (day - 1.0) * 86_400_000.0 + hour * 3_600_000.0 + minute * 60_000.0 + second * 1000.0 + millis;
    if !(i64::MIN as f64..=i64::MAX as f64).contains(&offset) {
        return Err(out_of_range());
    }
    chrono::TimeDelta::try_milliseconds(offset as i64)
        .and_then(|delta| base.checked_add_signed(delta))
        .map(Some)
        .ok_or_else(out_of_range)
}

fn date_from(args: &[Value]) -> Result<Option<DateTime<Utc>>, TransformError> {
    match args {
        [] => Ok(Some(Utc::now())),
        [Value::Number(n)] => Ok(n.as_f64().and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())),
        [Value::String(s)] => Ok(parse_date(s)),
        [_] => Ok(None),
        parts => date_from_parts(parts),
    }
}

fn date(invocation: Invocation<'_>, args: &[Value]) -> Option<Result<Value, TransformError>> {
    let result = match invocation {
        Invocation::Construct => date_from(args).map(|d| d.map_or(Value::Null, iso)),
        Invocation::Call => Ok(iso(Utc::now())),
        Invocation::Static("now") => Ok(Value::from(Utc::now().timestamp_millis())),
        Invocation::Static("parse") => Ok(parse_date(&display(arg(args, 0)))
            .map_or(Value::Null, |d| Value::from(d.timestamp_millis()))),
        Invocation::Static("UTC") => {
            date_from_parts(args).map(|d| d.map_or(Value::Null, |d| Value::from(d.timestamp_millis())))
        }
        Invocation::Static(_) => return None,
    };
    Some(result)
}

// Number

static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*(?:[eE][+-]?\d+)?|\.\d+(?:[eE][+-]?\d+)?|Infinity)")
        .expect("float prefix pattern is valid")
});

fn parse_float(text: &str) -> Value {
    let trimmed = text.trim_start();
    FLOAT_PREFIX
        .find(trimmed)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map_or(Value::Null, number)
}

fn parse_int(text: &str, radix: u32) -> Value {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits = if radix == 16 {
        digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits)
    } else {
        digits
    };
    let end = digits.find(|c: char| !c.is_digit(radix)).unwrap_or(digits.len());

    match i64::from_str_radix(&digits[..end], radix) {
        Ok(n) => Value::from(if negative { -n } else { n }),
        Err(_) => Value::Null,
    }
}

fn number_namespace(invocation: Invocation<'_>, args: &[Value]) -> Option<Result<Value, TransformError>> {
    let first = arg(args, 0);
    let result = match invocation {
        Invocation::Construct | Invocation::Call => number(to_number(first)),
        Invocation::Static("isInteger") => {
            Value::Bool(first.as_f64().map_or(false, |f| f.is_finite() && f.fract() == 0.0))
        }
        Invocation::Static("isFinite") => Value::Bool(first.as_f64().map_or(false, f64::is_finite)),
        Invocation::Static("isNaN") => Value::Bool(first.as_f64().map_or(false, f64::is_nan)),
        Invocation::Static("parseFloat") => parse_float(&display(first)),
        Invocation::Static("parseInt") => {
            let radix = match args.get(1).map(to_number) {
                Some(r) if (2.0..=36.0).contains(&r) => r as u32,
                _ => 10,
            };
            parse_int(&display(first), radix)
        }
        Invocation::Static(_) => return None,
    };
    Some(Ok(result))
}

// String

fn string_namespace(invocation: Invocation<'_>, args: &[Value]) -> Option<Result<Value, TransformError>> {
    let result = match invocation {
        Invocation::Construct | Invocation::Call => {
            Value::String(args.first().map(display).unwrap_or_default())
        }
        Invocation::Static("fromCharCode") => Value::String(
            args.iter()
                .filter_map(|code| char::from_u32(to_number(code) as u32))
                .collect(),
        ),
        Invocation::Static(_) => return None,
    };
    Some(Ok(result))
}

// Array

fn array_namespace(invocation: Invocation<'_>, args: &[Value]) -> Option<Result<Value, TransformError>> {
    let result = match invocation {
        Invocation::Construct | Invocation::Call => match args {
            [Value::Number(n)] => {
                let len = n
                    .as_u64()
                    .ok_or_else(|| TransformError::InvalidArgs(format!("invalid array length: {}", n)))
                    .and_then(|len| built_length(u128::from(len), "array"));
                match len {
                    Ok(len) => Value::Array(vec![Value::Null; len]),
                    Err(e) => return Some(Err(e)),
                }
            }
            other => Value::Array(other.to_vec()),
        },
        Invocation::Static("isArray") => Value::Bool(arg(args, 0).is_array()),
        Invocation::Static("of") => Value::Array(args.to_vec()),
        Invocation::Static("from") => match arg(args, 0) {
            Value::String(s) => Value::Array(s.chars().map(|c| Value::String(c.to_string())).collect()),
            Value::Array(items) => Value::Array(items.clone()),
            _ => Value::Array(Vec::new()),
        },
        Invocation::Static(_) => return None,
    };
    Some(Ok(result))
}

// Object

fn object_namespace(invocation: Invocation<'_>, args: &[Value]) -> Option<Result<Value, TransformError>> {
    let first = arg(args, 0);
    let result = match invocation {
        Invocation::Construct | Invocation::Call => match first {
            Value::Object(_) => first.clone(),
            _ => Value::Object(Map::new()),
        },
        Invocation::Static("keys") => match first {
            Value::Object(map) => Value::Array(map.keys().cloned().map(Value::String).collect()),
            Value::Array(items) => Value::Array((0..items.len()).map(|i| Value::String(i.to_string())).collect()),
            _ => Value::Array(Vec::new()),
        },
        Invocation::Static("values") => match first {
            Value::Object(map) => Value::Array(map.values().cloned().collect()),
            Value::Array(items) => Value::Array(items.clone()),
            _ => Value::Array(Vec::new()),
        },
        Invocation::Static("entries") => match first {
            Value::Object(map) => Value::Array(
                map.iter()
                    .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()]))
                    .collect(),
            ),
            _ => Value::Array(Vec::new()),
        },
        Invocation::Static("fromEntries") => {
            let mut map = Map::new();
            for entry in ensure_array(first) {
                if let Value::Array(pair) = entry {
                    if let Some(key) = pair.first() {
                        map.insert(display(key), pair.get(1).cloned().unwrap_or(Value::Null));
                    }
                }
            }
            Value::Object(map)
        }
        Invocation::Static("assign") => {
            let mut target = match first {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            for source in args.iter().skip(1) {
                if let Value::Object(map) = source {
                    target.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            Value::Object(target)
        }
        Invocation::Static(_) => return None,
    };
    Some(Ok(result))
}

// Math

fn math(invocation: Invocation<'_>, args: &[Value]) -> Option<Result<Value, TransformError>> {
    let member = match invocation {
        Invocation::Static(member) => member,
        _ => return not_callable("Math"),
    };
    let x = to_number(arg(args, 0));

    let result = match member {
        "PI" => std::f64::consts::PI,
        "E" => std::f64::consts::E,
        "abs" => x.abs(),
        "ceil" => x.ceil(),
        "floor" => x.floor(),
        "round" => (x + 0.5).floor(),
        "trunc" => x.trunc(),
        "sign" => {
            if x == 0.0 || x.is_nan() {
                x
            } else {
                x.signum()
            }
        }
        "sqrt" => x.sqrt(),
        "pow" => x.powf(to_number(arg(args, 1))),
        "max" => args.iter().map(to_number).fold(f64::NEG_INFINITY, f64::max),
        "min" => args.iter().map(to_number).fold(f64::INFINITY, f64::min),
        _ => return None,
    };
    Some(Ok(number(result)))
}

// JSON

fn json_namespace(invocation: Invocation<'_>, args: &[Value]) -> Option<Result<Value, TransformError>> {
    let member = match invocation {
        Invocation::Static(member) => member,
        _ => return not_callable("JSON"),
    };
    let first = arg(args, 0);

    let result = match member {
        "stringify" => {
            let pretty = args.get(2).map_or(false, |indent| to_number(indent) > 0.0 || indent.is_string());
            let text = if pretty {
                serde_json::to_string_pretty(first)
            } else {
                serde_json::to_string(first)
            };
            text.map(Value::String)
                .map_err(|e| TransformError::ExecutionError(format!("JSON.stringify failed: {}", e)))
        }
        "parse" => serde_json::from_str(&display(first))
            .map_err(|e| TransformError::ExecutionError(format!("JSON.parse failed: {}", e))),
        _ => return None,
    };
    Some(result)
}
