//! Common types used across Consensus Guard modules.

use serde::{Deserialize, Serialize};

/// A 256-bit request fingerprint (SHA3-256).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Create a fingerprint from raw digest bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Hex representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw digest bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut arr = [0u8; 32];
        if let Ok(bytes) = hex::decode(&self.0) {
            if bytes.len() == 32 {
                arr.copy_from_slice(&bytes);
            }
        }
        arr
    }

    /// First `n` hex characters, for short references.
    pub fn short(&self, n: usize) -> &str {
        &self.0[..n.min(self.0.len())]
    }

    /// Deterministic UUID (v5) derived from this fingerprint.
    pub fn to_uuid(&self) -> uuid::Uuid {
        uuid::Uuid::new_v5(&FINGERPRINT_NAMESPACE, self.0.as_bytes())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespace for ids derived from fingerprints.
const FINGERPRINT_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x6b, 0x2f, 0x1c, 0x84, 0x3e, 0x5a, 0x4d, 0x1b, 0x9f, 0x07, 0xc2, 0x51, 0x8e, 0x3d, 0xa4, 0x60,
]);

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
