//! Scalar Type Coercion
//!
//! Config values reach the validator as whatever their source produced:
//! environment variables are always strings, YAML may turn `on` into a
//! boolean, and so on. Before reporting a type mismatch on a scalar leaf the
//! validator tries to convert the value into the declared kind using this
//! table:
//!
//! | from \ to | string            | number / integer        | boolean                         |
//! |-----------|-------------------|-------------------------|---------------------------------|
//! | string    | -                 | valid numeral           | `"true"`/`"1"`, `"false"`/`"0"` |
//! | number    | decimal form      | -                       | `1` → `true`, `0` → `false`     |
//! | boolean   | `"true"`/`"false"`| `true` → `1`, `false` → `0` | -                           |
//!
//! Anything else is not coercible. Objects, arrays and `null` are never
//! coerced, and `integer` targets only accept integral results.

use serde_json::{Number, Value};

use crate::schema::JsonKind;

/// Convert `value` into `target`, or `None` if the table has no rule for it.
///
/// This does not check whether `value` already has the target kind.
pub fn coerce(value: &Value, target: JsonKind) -> Option<Value> {
    match (value, target) {
        (Value::String(s), JsonKind::Number) => string_to_number(s),
        (Value::String(s), JsonKind::Integer) => {
            string_to_number(s).filter(|n| JsonKind::Integer.matches(n))
        }
        (Value::String(s), JsonKind::Boolean) => string_to_boolean(s).map(Value::Bool),
        (Value::Number(n), JsonKind::String) => Some(Value::String(n.to_string())),
        (Value::Number(n), JsonKind::Boolean) => number_to_boolean(n).map(Value::Bool),
        (Value::Bool(b), JsonKind::String) => Some(Value::String(b.to_string())),
        (Value::Bool(b), JsonKind::Number | JsonKind::Integer) => Some(Value::from(u8::from(*b))),
        _ => None,
    }
}

/// Coerce `value` in place to the first declared kind that accepts it.
///
/// Returns `true` if the value was replaced. Values that already match one of
/// the declared kinds, or that are objects, arrays or `null`, are left alone.
pub fn coerce_in_place(value: &mut Value, declared: &[JsonKind]) -> bool {
    if declared.is_empty() || declared.iter().any(|kind| kind.matches(value)) {
        return false;
    }
    if !matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
        return false;
    }

    let coerced = declared
        .iter()
        .filter(|kind| kind.is_coercible())
        .find_map(|kind| coerce(value, *kind));

    match coerced {
        Some(coerced) => {
            *value = coerced;
            true
        }
        None => false,
    }
}

fn string_to_number(s: &str) -> Option<Value> {
    if s.is_empty() {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Value::from(u));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn string_to_boolean(s: &str) -> Option<bool> {
    match s {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Only the literals `0` and `1` convert to booleans. Widen this to treat any
/// nonzero number as `true` if that is ever wanted.
fn number_to_boolean(n: &Number) -> Option<bool> {
    match n.as_f64() {
        Some(f) if f == 0.0 => Some(false),
        Some(f) if f == 1.0 => Some(true),
        _ => None,
    }
}
