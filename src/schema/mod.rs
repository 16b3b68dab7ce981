//! Schema Module
//!
//! Strict structural validation of incoming requests:
//! - Declarative object rules with nested paths
//! - Per-request-kind field sets
//! - Cross-field checks (unique persona ids, external mode votes)

pub mod requests;
pub mod validator;

pub use requests::{validate_request, RequestKind};
pub use validator::{FieldType, ObjectRules};
