//! Request fingerprinting.
//!
//! A fingerprint is the SHA3-256 of the canonical JSON form of a request:
//! object keys sorted, no insignificant whitespace. Two semantically identical
//! requests always hash to the same fingerprint regardless of key order.

use crate::core::Fingerprint;
use serde::Serialize;
use serde_json::Value;
use sha3::{Digest, Sha3_256};

/// Compute SHA3-256 of data.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    bytes
}

/// Render a JSON value canonically.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Fingerprint a request of the given kind.
pub fn fingerprint(kind: &str, payload: &Value) -> Fingerprint {
    let body = canonical_json(&serde_json::json!({ "kind": kind, "payload": payload }));
    Fingerprint::new(sha3_256(body.as_bytes()))
}

/// Fingerprint any serializable value.
pub fn fingerprint_of<T: Serialize>(kind: &str, value: &T) -> crate::core::Result<Fingerprint> {
    let payload = serde_json::to_value(value)?;
    Ok(fingerprint(kind, &payload))
}
