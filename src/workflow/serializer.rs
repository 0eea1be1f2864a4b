//! JSON encoding of opaque payloads, descriptors and snapshots.
//!
//! Stored values are compact JSON strings. Payload comparison goes through
//! [`canonicalize`]: object key order never matters, and a float with no
//! fractional part compares equal to the same integer, so `{"b":1.0,"a":2}`
//! and `{"a":2,"b":1}` denote the same task.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while encoding or decoding stored values.
#[derive(Debug, Error)]
#[error("serialization failed: {0}")]
pub struct SerializerError(#[from] serde_json::Error);

/// Encodes `value` as a compact JSON string.
///
/// # Errors
///
/// Returns [`SerializerError`] when `value` cannot be represented as JSON.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, SerializerError> {
    Ok(serde_json::to_string(value)?)
}

/// Decodes a JSON string produced by [`encode`].
///
/// # Errors
///
/// Returns [`SerializerError`] when `raw` is not valid JSON for `T`.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, SerializerError> {
    Ok(serde_json::from_str(raw)?)
}

/// Returns the normalized form of `value` used for equality and digests.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, field)| (key.clone(), canonicalize(field)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Number(number) => Value::Number(integral_number(number)),
        Value::Null | Value::Bool(_) | Value::String(_) => value.clone(),
    }
}

/// Returns whether two payloads are equal after normalization.
#[must_use]
pub fn payloads_equivalent(left: &Value, right: &Value) -> bool {
    canonicalize(left) == canonicalize(right)
}

/// Returns the hex SHA-256 digest of the canonical encoding of `payload`.
///
/// # Errors
///
/// Returns [`SerializerError`] when the canonical payload cannot be encoded.
pub fn payload_digest(payload: &Value) -> Result<String, SerializerError> {
    let canonical = encode(&sorted(&canonicalize(payload)))?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Rewrites whole floats as integers when they fit an integer type.
fn integral_number(number: &Number) -> Number {
    let Some(float) = number.as_f64().filter(|_| number.is_f64()) else {
        return number.clone();
    };
    if float.fract() != 0.0 {
        return number.clone();
    }
    // Display of a whole finite f64 has no fraction or exponent.
    let rendered = float.to_string();
    rendered
        .parse::<i64>()
        .map(Number::from)
        .or_else(|_| rendered.parse::<u64>().map(Number::from))
        .unwrap_or_else(|_| number.clone())
}

/// Rebuilds objects with lexicographically ordered keys.
///
/// `serde_json::Map` is already ordered unless `preserve_order` is enabled
/// elsewhere in the dependency graph; the digest must not depend on that.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut entries: Vec<(&String, &Value)> = fields.iter().collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, field)| (key.clone(), sorted(field)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
    }
}
