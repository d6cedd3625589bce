//! Canonical JSON serialization and content hashing.
//!
//! Both the snapshot manifest's change-detection and the warehouse
//! synthetic primary key need a stable hash over a record's field values:
//! stable meaning independent of struct field declaration order and of
//! `HashMap` iteration order. `serde_json::Value::Object` is backed by a
//! `BTreeMap` when the `preserve_order` feature is off, which is what we
//! rely on here; we still sort explicitly so the guarantee doesn't depend
//! on that feature flag staying off in a future dependency bump.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serializes `value` to JSON with object keys sorted recursively and no
/// insignificant whitespace.
pub fn canonical_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let raw = serde_json::to_value(value)?;
    let sorted = sort_value(raw);
    serde_json::to_string(&sorted)
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, sort_value(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

/// SHA-256 hex digest of `value`'s canonical JSON form.
pub fn content_hash<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let json = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Hashes a string slice directly, for callers that already have a
/// flattened record and don't want to round-trip through serde.
pub fn hash_str(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_hash() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn different_values_hash_differently() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn canonical_json_has_no_extra_whitespace() {
        let s = canonical_json(&json!({"a": 1})).unwrap();
        assert_eq!(s, "{\"a\":1}");
    }
}
