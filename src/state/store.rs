//! State store abstraction and entry types.

use crate::consensus::resolver::Decision;
use crate::core::{Fingerprint, Result};
use crate::persona::PersonaSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored decision with the response it produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision: Decision,
    /// Full response replayed on retries
    pub response: Value,
}

/// A value held in the state store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StateEntry {
    Decision(DecisionRecord),
    PersonaSet(PersonaSet),
    /// Stored response of a non-decision request
    Replay(Value),
    /// Reference to another key
    Pointer(String),
    /// Board artifact payload
    Artifact(Value),
}

impl StateEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            StateEntry::Decision(_) => "decision",
            StateEntry::PersonaSet(_) => "persona_set",
            StateEntry::Replay(_) => "replay",
            StateEntry::Pointer(_) => "pointer",
            StateEntry::Artifact(_) => "artifact",
        }
    }
}

/// Key layout.
pub mod keys {
    use crate::core::Fingerprint;

    pub fn decision(fp: &Fingerprint) -> String {
        format!("decision:{}", fp)
    }

    pub fn persona_set(board_id: &str, persona_set_id: &str) -> String {
        format!("persona_set:{}:{}", board_id, persona_set_id)
    }

    pub fn generation(fp: &Fingerprint) -> String {
        format!("generation:{}", fp)
    }

    pub fn reputation(fp: &Fingerprint) -> String {
        format!("reputation:{}", fp)
    }

    pub fn latest_persona_set(board_id: &str) -> String {
        format!("latest_persona_set:{}", board_id)
    }

    pub fn artifact(board_id: &str, artifact_type: &str, id: &str) -> String {
        format!("artifact:{}:{}:{}", board_id, artifact_type, id)
    }
}

/// Persistent key/value state with staged, all-or-nothing commits.
///
/// `put` only stages. Staged entries are visible to `get` but are not
/// durable until `flush`; `rollback` drops them.
pub trait StateStore {
    /// Look up a key, staged entries first.
    fn get(&self, key: &str) -> Option<&StateEntry>;

    /// Stage an entry.
    fn put(&mut self, key: String, entry: StateEntry);

    /// Commit staged entries as one batch. Returns the number committed.
    fn flush(&mut self) -> Result<usize>;

    /// Drop staged entries. Returns the number dropped.
    fn rollback(&mut self) -> usize;

    /// Number of staged entries.
    fn pending(&self) -> usize;

    fn decision(&self, fp: &Fingerprint) -> Option<&DecisionRecord> {
        match self.get(&keys::decision(fp)) {
            Some(StateEntry::Decision(record)) => Some(record),
            _ => None,
        }
    }

    fn persona_set(&self, board_id: &str, persona_set_id: &str) -> Option<&PersonaSet> {
        match self.get(&keys::persona_set(board_id, persona_set_id)) {
            Some(StateEntry::PersonaSet(set)) => Some(set),
            _ => None,
        }
    }

    /// Most recently written persona set of a board.
    fn latest_persona_set(&self, board_id: &str) -> Option<&PersonaSet> {
        match self.get(&keys::latest_persona_set(board_id)) {
            Some(StateEntry::Pointer(id)) => self.persona_set(board_id, id),
            _ => None,
        }
    }

    fn replay(&self, key: &str) -> Option<&Value> {
        match self.get(key) {
            Some(StateEntry::Replay(response)) => Some(response),
            _ => None,
        }
    }

    /// Stage a persona set and make it the board's latest.
    fn put_persona_set(&mut self, set: &PersonaSet) {
        self.put(
            keys::persona_set(&set.board_id, &set.persona_set_id),
            StateEntry::PersonaSet(set.clone()),
        );
        self.put(
            keys::latest_persona_set(&set.board_id),
            StateEntry::Pointer(set.persona_set_id.clone()),
        );
    }
}
