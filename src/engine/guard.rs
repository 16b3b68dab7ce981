//! Guard request pipeline.

use super::{field, optional_field, ConsensusEngine, InlinePersonaSet};
use crate::board::{ArtifactKind, BoardWriter, OperatingMode};
use crate::consensus::guards::{required_actions, GuardFamily};
use crate::consensus::{
    AggregationSummary, Decision, DecisionResolver, VoteAggregator, VoteBatch,
};
use crate::core::fingerprint::{fingerprint, fingerprint_of};
use crate::core::{Error, Fingerprint, Result};
use crate::engine::GuardResponse;
use crate::persona::PersonaSet;
use crate::reputation::{ReputationRules, ReputationUpdater};
use crate::state::{keys, DecisionRecord, StateEntry, StateStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

impl<S: StateStore> ConsensusEngine<S> {
    pub(super) fn evaluate_guard<G>(&mut self, input: &Value) -> Result<GuardResponse>
    where
        G: GuardFamily,
        G::Proposal: DeserializeOwned + Serialize,
    {
        let board_id: String = field(input, "board_id")?;
        let proposal: G::Proposal = field(input, G::PROPOSAL_FIELD)?;
        let batch: VoteBatch = field(input, "vote_batch")?;
        let constraints: G::Constraints = optional_field(input, "constraints")?.unwrap_or_default();
        let mode = optional_field::<OperatingMode>(input, "mode")?.unwrap_or(self.config.default_mode);
        let ruleset = self.effective_ruleset(input)?;
        let guard = G::with_constraints(constraints);

        let fp = fingerprint(
            G::KIND.as_str(),
            &json!({
                "board_id": board_id,
                "proposal": serde_json::to_value(&proposal)?,
                "votes": serde_json::to_value(&batch)?,
                "constraints": serde_json::to_value(guard.constraints())?,
                "persona_set": input.get("persona_set"),
                "persona_set_id": input.get("persona_set_id"),
                "ruleset": serde_json::to_value(&ruleset)?,
                "mode": mode,
            }),
        );

        if let Some(record) = self.store.decision(&fp) {
            info!(
                decision_id = %record.decision.decision_id,
                fingerprint = %fp.short(12),
                "replaying stored decision"
            );
            return Ok(serde_json::from_value(record.response.clone())?);
        }

        let mut personas = self.personas_for_guard(&board_id, input, &fp, &ruleset.reputation)?;
        if mode == OperatingMode::ExternalAgent {
            let admitted = personas.admit_external_voters(&batch, &ruleset.reputation);
            if admitted > 0 {
                debug!(board_id = %board_id, admitted, "admitted external voters");
            }
        }

        let aggregation = VoteAggregator::new(ruleset.aggregation.clone())
            .aggregate(&guard, &proposal, &batch, &personas)?;
        let final_decision = DecisionResolver::new().resolve(&aggregation.policy_flags);
        let decision = Decision::new(&fp, &board_id, final_decision, aggregation.policy_flags.clone());

        let mut writer = BoardWriter::new(&board_id, mode);
        writer.emit(&mut self.store, ArtifactKind::Decision, &decision.decision_id, &decision)?;

        let mut persona_updates = Vec::new();
        if mode == OperatingMode::Persona {
            let outcome = ReputationUpdater::new(ruleset.reputation.clone()).apply(
                final_decision,
                &decision.decision_id,
                &batch,
                &mut personas,
                &ruleset.ruleset_ref()?,
            )?;
            self.store.put_persona_set(&personas);
            writer.emit(
                &mut self.store,
                ArtifactKind::ReputationDelta,
                &decision.decision_id,
                &outcome.delta,
            )?;
            writer.emit(
                &mut self.store,
                ArtifactKind::PersonaSet,
                &personas.persona_set_id,
                &personas,
            )?;
            persona_updates = outcome.delta.updates;
        }

        let response = GuardResponse {
            board_id: board_id.clone(),
            decision_id: decision.decision_id.clone(),
            timestamp: decision.created_at,
            persona_set_id: personas.persona_set_id.clone(),
            mode,
            final_decision,
            policy_flags: aggregation.policy_flags.clone(),
            aggregation: AggregationSummary::from(&aggregation),
            required_actions: required_actions(final_decision, G::ACTION),
            persona_updates,
            warnings: aggregation.warnings(),
            board_writes: writer.finish(),
        };

        self.store.put(
            keys::decision(&fp),
            StateEntry::Decision(DecisionRecord {
                decision,
                response: serde_json::to_value(&response)?,
            }),
        );
        let committed = self.store.flush()?;

        info!(
            guard = G::KIND.as_str(),
            board_id = %board_id,
            decision_id = %response.decision_id,
            final_decision = %final_decision,
            hard = response.policy_flags.hard_flags.len(),
            rewrite = response.policy_flags.rewrite_flags.len(),
            committed,
            "resolved decision"
        );
        Ok(response)
    }

    /// Pick the persona set a guard request votes against.
    ///
    /// Inline set, then a stored set by id, then the board's latest set,
    /// then the default panel.
    fn personas_for_guard(
        &self,
        board_id: &str,
        input: &Value,
        fp: &Fingerprint,
        rules: &ReputationRules,
    ) -> Result<PersonaSet> {
        if let Some(set) = self.inline_personas(board_id, input, rules)? {
            return Ok(set);
        }
        if let Some(id) = optional_field::<String>(input, "persona_set_id")? {
            return self.stored_personas(board_id, &id);
        }
        if let Some(set) = self.store.latest_persona_set(board_id) {
            return Ok(set.clone());
        }

        let id = fingerprint("default-panel", &json!({ "board_id": board_id })).to_uuid();
        debug!(board_id, fingerprint = %fp.short(12), "using default persona panel");
        Ok(PersonaSet::default_panel(&id.to_string(), board_id))
    }

    /// Persona set given inline, if any.
    ///
    /// Reputations outside the ruleset bounds are rejected as invalid input.
    pub(super) fn inline_personas(
        &self,
        board_id: &str,
        input: &Value,
        rules: &ReputationRules,
    ) -> Result<Option<PersonaSet>> {
        let inline = match optional_field::<InlinePersonaSet>(input, "persona_set")? {
            Some(inline) => inline,
            None => return Ok(None),
        };

        for (i, persona) in inline.personas.iter().enumerate() {
            if rules.clamp(persona.reputation) != persona.reputation {
                let path = format!("persona_set.personas[{}].reputation", i);
                return Err(Error::invalid(
                    &path,
                    format!(
                        "{} must be within {}..{}, got {}",
                        path, rules.min_rep, rules.max_rep, persona.reputation
                    ),
                ));
            }
        }

        let id = match inline
            .persona_set_id
            .clone()
            .or(optional_field::<String>(input, "persona_set_id")?)
        {
            Some(id) => id,
            None => fingerprint_of("persona-set", &inline.personas)?.to_uuid().to_string(),
        };
        Ok(Some(PersonaSet::new(&id, board_id, inline.personas)))
    }

    /// Persona set stored for this board.
    pub(super) fn stored_personas(&self, board_id: &str, persona_set_id: &str) -> Result<PersonaSet> {
        self.store
            .persona_set(board_id, persona_set_id)
            .cloned()
            .ok_or_else(|| Error::PersonaSetNotFound(persona_set_id.to_string()))
    }
}
