//! Persona generation and reputation pipelines.

use super::{field, ConsensusEngine};
use crate::board::{ArtifactKind, BoardWriter, OperatingMode};
use crate::consensus::{FinalDecision, VoteBatch};
use crate::core::fingerprint::{fingerprint, fingerprint_of};
use crate::core::{Error, Result};
use crate::engine::{GenerationResponse, ReputationResponse};
use crate::persona::GenerationRequest;
use crate::reputation::ReputationUpdater;
use crate::schema::RequestKind;
use crate::state::{keys, StateEntry, StateStore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

/// Decision reference in a persona-engine request.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct DecisionRef {
    #[serde(default)]
    decision_id: Option<String>,
    final_decision: FinalDecision,
}

impl<S: StateStore> ConsensusEngine<S> {
    pub(super) fn run_generation(&mut self, input: &Value) -> Result<GenerationResponse> {
        let request: GenerationRequest = serde_json::from_value(input.clone())
            .map_err(|e| Error::invalid("task_context", format!("request is invalid: {}", e)))?;
        let fp = fingerprint_of(RequestKind::PersonaGenerator.as_str(), &request)?;
        let replay_key = keys::generation(&fp);

        if let Some(stored) = self.store.replay(&replay_key) {
            info!(fingerprint = %fp.short(12), "replaying generated persona set");
            return Ok(serde_json::from_value(stored.clone())?);
        }

        let set = self.generator.generate(&request, &fp);
        self.store.put_persona_set(&set);

        let mut writer = BoardWriter::new(&request.board_id, OperatingMode::Persona);
        writer.emit(&mut self.store, ArtifactKind::PersonaSet, &set.persona_set_id, &set)?;

        let response = GenerationResponse {
            board_id: request.board_id.clone(),
            persona_set_id: set.persona_set_id.clone(),
            persona_pack: request.persona_pack,
            personas: set.personas.clone(),
            created_at: set.created_at,
            board_writes: writer.finish(),
        };
        self.store
            .put(replay_key, StateEntry::Replay(serde_json::to_value(&response)?));
        self.store.flush()?;

        info!(
            board_id = %response.board_id,
            persona_set_id = %response.persona_set_id,
            pack = %request.persona_pack,
            count = response.personas.len(),
            "generated persona set"
        );
        Ok(response)
    }

    pub(super) fn run_reputation(&mut self, input: &Value) -> Result<ReputationResponse> {
        let board_id: String = field(input, "board_id")?;
        let decision: DecisionRef = field(input, "decision")?;
        let batch: VoteBatch = field(input, "vote_batch")?;
        let ruleset = self.effective_ruleset(input)?;

        let fp = fingerprint(
            RequestKind::PersonaEngine.as_str(),
            &json!({
                "board_id": board_id,
                "decision": serde_json::to_value(&decision)?,
                "votes": serde_json::to_value(&batch)?,
                "persona_set": input.get("persona_set"),
                "persona_set_id": input.get("persona_set_id"),
                "ruleset": serde_json::to_value(&ruleset)?,
            }),
        );
        let replay_key = keys::reputation(&fp);

        if let Some(stored) = self.store.replay(&replay_key) {
            info!(fingerprint = %fp.short(12), "replaying reputation update");
            return Ok(serde_json::from_value(stored.clone())?);
        }

        let mut personas = match self.inline_personas(&board_id, input, &ruleset.reputation)? {
            Some(set) => set,
            None => {
                let id: String = field(input, "persona_set_id")?;
                self.stored_personas(&board_id, &id)?
            }
        };

        let decision_id = decision
            .decision_id
            .clone()
            .unwrap_or_else(|| fp.to_uuid().to_string());
        let ruleset_ref = ruleset.ruleset_ref()?;
        let outcome = ReputationUpdater::new(ruleset.reputation.clone()).apply(
            decision.final_decision,
            &decision_id,
            &batch,
            &mut personas,
            &ruleset_ref,
        )?;
        self.store.put_persona_set(&personas);

        let mut writer = BoardWriter::new(&board_id, OperatingMode::Persona);
        writer.emit(&mut self.store, ArtifactKind::ReputationDelta, &decision_id, &outcome.delta)?;
        writer.emit(&mut self.store, ArtifactKind::PersonaSet, &personas.persona_set_id, &personas)?;

        let response = ReputationResponse {
            board_id: board_id.clone(),
            decision_id,
            final_decision: decision.final_decision,
            persona_set_id: personas.persona_set_id.clone(),
            ruleset_ref,
            warnings: outcome.warnings(),
            persona_updates: outcome.delta.updates,
            updated_persona_set: personas,
            board_writes: writer.finish(),
        };
        self.store
            .put(replay_key, StateEntry::Replay(serde_json::to_value(&response)?));
        self.store.flush()?;

        info!(
            board_id = %board_id,
            decision_id = %response.decision_id,
            updated = response.persona_updates.len(),
            "applied reputation updates"
        );
        Ok(response)
    }
}
