//! Nested metadata patches applied with JSON merge semantics.
//!
//! A patch looks like:
//!
//! ```json
//! {
//!   "dataset": {"title": "World Development Indicators"},
//!   "tables": {
//!     "gdp": {
//!       "title": "GDP",
//!       "variables": {"gdp": {"unit": "dollars", "short_unit": "$"}}
//!     }
//!   }
//! }
//! ```
//!
//! Objects are merged recursively, any other value replaces the current one,
//! and `null` clears a field.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::error::{Result, TabulaError};

pub(crate) const DATASET_KEYS: &[&str] = &[
    "namespace",
    "version",
    "short_name",
    "title",
    "description",
    "is_public",
    "sources",
    "licenses",
];

pub(crate) const TABLE_KEYS: &[&str] = &["title", "description", "variables"];

pub(crate) const VARIABLE_KEYS: &[&str] = &[
    "title",
    "description",
    "description_key",
    "description_processing",
    "unit",
    "short_unit",
    "display",
    "presentation",
    "processing_level",
    "sources",
    "origins",
    "licenses",
];

/// Borrow `value` as an object or report what `context` expected.
pub(crate) fn as_object<'a>(value: &'a JsonValue, context: &str) -> Result<&'a Map<String, JsonValue>> {
    value
        .as_object()
        .ok_or_else(|| TabulaError::Validation(format!("{} patch must be an object", context)))
}

/// Reject keys outside `allowed`.
pub(crate) fn check_keys(patch: &Map<String, JsonValue>, allowed: &[&str], context: &str) -> Result<()> {
    match patch.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(TabulaError::Validation(format!(
            "unknown {} metadata key '{}'",
            context, key
        ))),
        None => Ok(()),
    }
}

/// Merge `patch` into `target` in place.
pub(crate) fn merge(target: &mut JsonValue, patch: &JsonValue) {
    let JsonValue::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = JsonValue::Object(Map::new());
    }
    if let JsonValue::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge(target.entry(key.clone()).or_insert(JsonValue::Null), value);
            }
        }
    }
}

/// Apply `patch` (minus `skip` keys) to a serializable record.
pub(crate) fn apply<T>(record: &T, patch: &Map<String, JsonValue>, skip: &[&str]) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut current = serde_json::to_value(record)?;
    let filtered: Map<String, JsonValue> = patch
        .iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merge(&mut current, &JsonValue::Object(filtered));
    serde_json::from_value(current)
        .map_err(|e| TabulaError::Validation(format!("invalid metadata patch: {}", e)))
}
