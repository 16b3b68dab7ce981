//! State Module
//!
//! Provides idempotent persistence for decisions and persona sets:
//! - `StateStore` trait with staged, all-or-nothing commits
//! - `LogStore`: append-only JSON-lines log with checksummed batches
//! - `MemoryStore` for tests and embedding

pub mod log;
pub mod memory;
pub mod store;

pub use log::{LogStore, DEFAULT_COMPACTION_THRESHOLD};
pub use memory::MemoryStore;
pub use store::{keys, DecisionRecord, StateEntry, StateStore};

use std::path::PathBuf;

/// Environment variable naming the state log.
pub const STATE_PATH_ENV: &str = "CONSENSUS_GUARD_STATE";

/// Fallback state log location.
pub const DEFAULT_STATE_PATH: &str = ".consensus-guard/state.jsonl";

/// Resolve the state log path: explicit, then environment, then default.
pub fn resolve_state_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| {
            std::env::var(STATE_PATH_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH))
}
