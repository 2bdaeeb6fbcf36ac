use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Observable key-value state held by a model instance
pub type Props = Map<String, Value>;

/// Persisted step parameters of a model: flow key -> step key -> params
pub type StepParams = BTreeMap<String, BTreeMap<String, Value>>;

/// Shallow-merge parameter layers into a single JSON object.
///
/// Later layers win. `null` layers are skipped; a non-object layer replaces
/// everything merged so far, which keeps scalar invocation params usable.
pub fn merge_params<'a, I>(layers: I) -> Value
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    let mut merged = Value::Object(Map::new());

    for layer in layers.into_iter().flatten() {
        match layer {
            Value::Null => {}
            Value::Object(source) => match &mut merged {
                Value::Object(target) => {
                    for (key, value) in source {
                        target.insert(key.clone(), value.clone());
                    }
                }
                _ => merged = layer.clone(),
            },
            other => merged = other.clone(),
        }
    }

    merged
}

/// Rebuild a JSON value with object keys in sorted order at every level
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let mut out = Map::new();
            for (key, inner) in sorted {
                out.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Stable fingerprint of invocation parameters.
///
/// Two parameter values that differ only in object key order produce the
/// same fingerprint. `null` and an empty object are treated as the same input.
pub fn params_fingerprint(params: &Value) -> String {
    let normalized = match params {
        Value::Null => Value::Object(Map::new()),
        other => canonicalize(other),
    };

    let mut hasher = Sha256::new();
    hasher.update(normalized.to_string().as_bytes());
    let digest = hasher.finalize();
    // 16 bytes is plenty to tell parameter sets apart within one model/flow
    hex::encode(&digest[..16])
}
