//! # Consensus Guard - Reputation-Weighted Policy Decisions
//!
//! Gates risky actions behind a panel of simulated reviewers:
//! - **Schema**: strict validation of every request kind
//! - **Persona**: deterministic persona panels from named packs
//! - **Consensus**: weighted vote aggregation, guard flags, decision resolution
//! - **Reputation**: alignment-based feedback into persona weights
//! - **State**: idempotent, append-only persistence keyed by request fingerprint
//! - **Board**: typed artifacts per request, gated by operating mode
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use consensus_guard::{ConsensusEngine, EngineConfig, LogStore, RequestKind};
//! use serde_json::json;
//!
//! fn main() -> consensus_guard::Result<()> {
//!     let store = LogStore::open("/tmp/board-1.jsonl")?;
//!     let mut engine = ConsensusEngine::new(store, EngineConfig::default());
//!
//!     let response = engine.handle(
//!         RequestKind::PersonaGenerator,
//!         &json!({"board_id": "board-1", "task_context": {"goal": "ship v2"}}),
//!     );
//!     println!("{}", response);
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod config;
pub mod consensus;
pub mod core;
pub mod engine;
pub mod logging;
pub mod persona;
pub mod reputation;
pub mod schema;
pub mod state;

pub use crate::config::EngineConfig;
pub use crate::core::error::{Error, ErrorEnvelope, Result};
pub use crate::engine::ConsensusEngine;
pub use crate::schema::RequestKind;
pub use crate::state::{LogStore, MemoryStore, StateStore};
