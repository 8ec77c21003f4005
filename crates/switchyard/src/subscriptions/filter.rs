//! Field-level matching of event payloads against subscription filters.

use serde_json::{Map, Value};

use super::equality::structural_eq;

/// Returns `true` when `payload` satisfies every key of `filter`.
///
/// An empty filter matches any payload. Each filter key must be present in
/// the payload with a structurally equal value; a `null` filter value only
/// matches a payload key that is present and `null`.
#[must_use]
pub fn matches(payload: &Value, filter: &Map<String, Value>) -> bool {
    if filter.is_empty() {
        return true;
    }
    let Value::Object(fields) = payload else {
        return false;
    };
    filter.iter().all(|(key, expected)| {
        fields
            .get(key)
            .is_some_and(|actual| structural_eq(actual, expected))
    })
}
