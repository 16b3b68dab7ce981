//! Persona Module
//!
//! Reputation-weighted reviewer panels:
//! - Persona and persona set types
//! - Named persona packs
//! - Deterministic persona set generation

pub mod generator;
pub mod packs;
pub mod types;

pub use generator::{GenerationRequest, PersonaGenerator};
pub use packs::PersonaPack;
pub use types::{Persona, PersonaSet, RiskTolerance, TaskContext};
