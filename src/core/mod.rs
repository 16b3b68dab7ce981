//! Core utilities and common types for Consensus Guard.

pub mod error;
pub mod fingerprint;
pub mod types;

pub use error::{Error, ErrorBody, ErrorCode, ErrorEnvelope, Result};
pub use types::*;
