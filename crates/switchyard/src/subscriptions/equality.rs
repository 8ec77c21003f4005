//! Structural equality over JSON values.
//!
//! Objects compare by key set and per-key value regardless of key order,
//! arrays compare element-wise, and numbers compare by numeric value so that
//! `1` and `1.0` are equal. A key that is absent on one side and `null` on the
//! other makes the values unequal.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Returns `true` when `left` and `right` are structurally equal.
#[must_use]
pub fn structural_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, value)| {
                    right
                        .get(key)
                        .is_some_and(|other| structural_eq(value, other))
                })
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right)
                    .all(|(value, other)| structural_eq(value, other))
        }
        (Value::Number(left), Value::Number(right)) => numbers_eq(left, right),
        (Value::String(left), Value::String(right)) => left == right,
        (Value::Bool(left), Value::Bool(right)) => left == right,
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}

/// `2^64`; whole floats below it in magnitude convert to `i128` exactly.
const WHOLE_FLOAT_LIMIT: f64 = 18_446_744_073_709_551_616.0;

fn numbers_eq(left: &Number, right: &Number) -> bool {
    match (integer(left), integer(right)) {
        (Some(left), Some(right)) => left == right,
        (Some(int), None) => float_eq_integer(right, int),
        (None, Some(int)) => float_eq_integer(left, int),
        (None, None) => match (left.as_f64(), right.as_f64()) {
            (Some(left), Some(right)) => left.partial_cmp(&right) == Some(Ordering::Equal),
            _ => false,
        },
    }
}

fn integer(number: &Number) -> Option<i128> {
    number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from))
}

/// Integers and floats are equal only when the float is that exact whole
/// number; no rounding through `f64` takes place.
#[expect(
    clippy::cast_possible_truncation,
    reason = "the value is whole and below 2^64 in magnitude"
)]
fn float_eq_integer(float: &Number, int: i128) -> bool {
    let Some(value) = float.as_f64() else {
        return false;
    };
    if !value.is_finite() || value.fract().abs() > 0.0 || value.abs() >= WHOLE_FLOAT_LIMIT {
        return false;
    }
    value as i128 == int
}
