//! Error types for Consensus Guard.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Consensus Guard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while processing a request.
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors
    #[error("{message}")]
    InvalidInput { field: String, message: String },

    // Ruleset errors
    #[error("Malformed ruleset: {0}")]
    MalformedRuleset(String),

    #[error("Flag {flag} is not classified by the {guard} vocabulary")]
    UnknownFlag { guard: String, flag: String },

    // Reference errors
    #[error("Persona set not found: {0}")]
    PersonaSetNotFound(String),

    // State errors
    #[error("State corrupted: {0}")]
    StateCorrupted(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a validation error for a field path.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Error::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error belongs to the input-validation class.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidInput { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Error codes returned to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    PersonaEngineFailed,
    PersonaGeneratorFailed,
    DeploymentGuardFailed,
    PermissionEscalationGuardFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::PersonaEngineFailed => "PERSONA_ENGINE_FAILED",
            ErrorCode::PersonaGeneratorFailed => "PERSONA_GENERATOR_FAILED",
            ErrorCode::DeploymentGuardFailed => "DEPLOYMENT_GUARD_FAILED",
            ErrorCode::PermissionEscalationGuardFailed => "PERMISSION_ESCALATION_GUARD_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body of an error response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Structured error returned at the request boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub board_id: String,
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    /// Convert an internal error into an envelope.
    ///
    /// Validation errors always map to `INVALID_INPUT`; every other error is
    /// reported under `failure_code` with its display message only.
    pub fn from_error(board_id: &str, failure_code: ErrorCode, err: &Error) -> Self {
        let (code, details) = match err {
            Error::InvalidInput { field, .. } => (
                ErrorCode::InvalidInput,
                Some(serde_json::json!({ "field": field })),
            ),
            _ => (failure_code, None),
        };

        Self {
            board_id: board_id.to_string(),
            error: ErrorBody {
                code,
                message: err.to_string(),
                details,
            },
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.error.code
    }
}

impl std::fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.error.code, self.error.message)
    }
}
