//! Board artifact emission.

use crate::core::Result;
use crate::state::{keys, StateEntry, StateStore};
use serde::{Deserialize, Serialize};

/// How much of the pipeline a request runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Full pipeline with reputation feedback
    #[default]
    Persona,
    /// Votes come from an outside agent; decision only
    ExternalAgent,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Persona => "persona",
            OperatingMode::ExternalAgent => "external_agent",
        }
    }
}

impl std::str::FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "persona" => Ok(OperatingMode::Persona),
            "external_agent" => Ok(OperatingMode::ExternalAgent),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Artifact types written to a board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Decision,
    ReputationDelta,
    PersonaSet,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Decision => "decision",
            ArtifactKind::ReputationDelta => "reputation_delta",
            ArtifactKind::PersonaSet => "persona_set",
        }
    }
}

/// One emitted artifact, as reported in responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardWrite {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub success: bool,
    /// State key holding the artifact
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Collects the artifacts of one request.
#[derive(Debug)]
pub struct BoardWriter {
    board_id: String,
    mode: OperatingMode,
    writes: Vec<BoardWrite>,
}

impl BoardWriter {
    pub fn new(board_id: &str, mode: OperatingMode) -> Self {
        Self {
            board_id: board_id.to_string(),
            mode,
            writes: Vec::new(),
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Whether `kind` is emitted in the current mode.
    pub fn allows(&self, kind: ArtifactKind) -> bool {
        self.mode == OperatingMode::Persona || kind == ArtifactKind::Decision
    }

    /// Stage an artifact in `store`. Suppressed kinds are dropped silently.
    pub fn emit<S, T>(&mut self, store: &mut S, kind: ArtifactKind, id: &str, payload: &T) -> Result<()>
    where
        S: StateStore + ?Sized,
        T: Serialize,
    {
        if !self.allows(kind) {
            tracing::debug!(
                board_id = %self.board_id,
                artifact = kind.as_str(),
                mode = self.mode.as_str(),
                "suppressed artifact"
            );
            return Ok(());
        }

        let key = keys::artifact(&self.board_id, kind.as_str(), id);
        store.put(key.clone(), StateEntry::Artifact(serde_json::to_value(payload)?));
        self.writes.push(BoardWrite {
            kind,
            success: true,
            reference: key,
        });
        Ok(())
    }

    /// Artifacts emitted so far.
    pub fn writes(&self) -> &[BoardWrite] {
        &self.writes
    }

    pub fn finish(self) -> Vec<BoardWrite> {
        self.writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_persona_mode_emits_all() {
        let mut store = MemoryStore::new();
        let mut writer = BoardWriter::new("b", OperatingMode::Persona);
        writer.emit(&mut store, ArtifactKind::Decision, "d1", &json!({})).unwrap();
        writer.emit(&mut store, ArtifactKind::ReputationDelta, "d1", &json!({})).unwrap();
        writer.emit(&mut store, ArtifactKind::PersonaSet, "ps", &json!({})).unwrap();

        let writes = writer.finish();
        assert_eq!(writes.len(), 3);
        assert_eq!(store.pending(), 3);
        assert_eq!(writes[0].reference, "artifact:b:decision:d1");
    }

    #[test]
    fn test_external_agent_emits_decision_only() {
        let mut store = MemoryStore::new();
        let mut writer = BoardWriter::new("b", OperatingMode::ExternalAgent);
        writer.emit(&mut store, ArtifactKind::Decision, "d1", &json!({})).unwrap();
        writer.emit(&mut store, ArtifactKind::PersonaSet, "ps", &json!({})).unwrap();

        assert_eq!(writer.writes().len(), 1);
        assert_eq!(store.pending(), 1);
    }

    #[test]
    fn test_board_write_shape() {
        let write = BoardWrite {
            kind: ArtifactKind::ReputationDelta,
            success: true,
            reference: "artifact:b:reputation_delta:d".into(),
        };
        assert_eq!(
            serde_json::to_value(&write).unwrap(),
            json!({"type": "reputation_delta", "success": true, "ref": "artifact:b:reputation_delta:d"})
        );
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("external_agent".parse::<OperatingMode>().unwrap(), OperatingMode::ExternalAgent);
        assert!("robot".parse::<OperatingMode>().is_err());
    }
}
