//! Board Module
//!
//! Typed artifacts produced by a request, gated by operating mode.

pub mod writer;

pub use writer::{ArtifactKind, BoardWrite, BoardWriter, OperatingMode};
