//! Tolerant JSON value extraction.
//!
//! On-device RPC providers are sloppy about types: a signal level may
//! arrive as `-95`, `-95.5`, or `"-95"`, and booleans as `true`, `"true"`,
//! or `"1"`. Some providers additionally nest the live readings under a
//! `cache` sub-object. These helpers accept all observed shapes.

use serde_json::Value;

/// Number, or numeric string.
pub(crate) fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Integer, float (truncated), or numeric string.
pub(crate) fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// `true`/`false`, `"true"`/`"false"`, `"1"`/`"0"`, `1`/`0`.
pub(crate) fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn as_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Look up `key` flat, then under a `cache` sub-object.
pub(crate) fn get<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    v.get(key)
        .or_else(|| v.get("cache").and_then(|c| c.get(key)))
}

/// Walk a dotted path (`"obstructionStats.fractionObstructed"`).
pub(crate) fn get_path<'a>(v: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = v;
    for part in path.split('.') {
        cur = cur.get(part)?;
    }
    Some(cur)
}

/// First dotted path that resolves.
pub(crate) fn first_path<'a>(v: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|p| get_path(v, p))
}

pub(crate) fn int_field(v: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| get(v, k).and_then(as_i64))
}

pub(crate) fn float_field(v: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| get(v, k).and_then(as_f64))
}

pub(crate) fn bool_field(v: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| get(v, k).and_then(as_bool))
}

pub(crate) fn str_field(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| get(v, k).and_then(as_str))
}
