//! Canonical JSON serialization for deterministic fingerprints
//!
//! Artifacts (model, preprocessor) are fingerprinted with Blake3 and audit
//! payloads with SHA-256, both over the same canonical form:
//! - Sorted map keys at every depth
//! - No whitespace
//! - serde_json number formatting

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Serialize a value to canonical JSON (sorted keys, no whitespace)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json_value = serde_json::to_value(value)?;
    serde_json::to_string(&canonicalize_value(&json_value))
}

fn canonicalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> = map
                .iter()
                .map(|(k, v)| (k, canonicalize_value(v)))
                .collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(canonicalize_value).collect()),
        other => other.clone(),
    }
}

/// Blake3 hex digest of the canonical JSON form (artifact fingerprints)
pub fn blake3_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = to_canonical_json(value)?;
    Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
}

/// SHA-256 hex digest of the canonical JSON form (audit fingerprints)
pub fn sha256_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = to_canonical_json(value)?;
    Ok(sha256_str_hex(&json))
}

/// SHA-256 hex digest of a raw string
pub fn sha256_str_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
