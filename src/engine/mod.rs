//! Engine Module
//!
//! The request boundary. Each request is validated, fingerprinted, replayed
//! if already computed, otherwise run through the pipeline and committed to
//! the state store in one batch:
//! - Guard requests: aggregate, resolve, update reputations, write artifacts
//! - Persona generation
//! - Standalone reputation updates
//!
//! Every failure leaves the store untouched and is returned as an
//! [`ErrorEnvelope`].

mod guard;
mod persona;
pub mod responses;

pub use responses::{GenerationResponse, GuardResponse, ReputationResponse};

use crate::config::EngineConfig;
use crate::consensus::{DeploymentGuard, PermissionEscalationGuard};
use crate::core::{Error, ErrorEnvelope, Result};
use crate::persona::{Persona, PersonaGenerator};
use crate::reputation::Ruleset;
use crate::schema::{validate_request, RequestKind};
use crate::state::StateStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

/// Consensus engine bound to one state handle.
pub struct ConsensusEngine<S: StateStore> {
    store: S,
    config: EngineConfig,
    generator: PersonaGenerator,
}

impl<S: StateStore> ConsensusEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            generator: PersonaGenerator::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Evaluate a proposed deployment.
    pub fn deployment_guard(&mut self, input: &Value) -> std::result::Result<GuardResponse, ErrorEnvelope> {
        self.boundary(RequestKind::DeploymentGuard, input, |engine| {
            engine.evaluate_guard::<DeploymentGuard>(input)
        })
    }

    /// Evaluate a proposed permission escalation.
    pub fn permission_escalation_guard(
        &mut self,
        input: &Value,
    ) -> std::result::Result<GuardResponse, ErrorEnvelope> {
        self.boundary(RequestKind::PermissionEscalationGuard, input, |engine| {
            engine.evaluate_guard::<PermissionEscalationGuard>(input)
        })
    }

    /// Generate a persona set for a task.
    pub fn generate_personas(
        &mut self,
        input: &Value,
    ) -> std::result::Result<GenerationResponse, ErrorEnvelope> {
        self.boundary(RequestKind::PersonaGenerator, input, |engine| {
            engine.run_generation(input)
        })
    }

    /// Apply a decision's outcome to persona reputations.
    pub fn update_reputation(
        &mut self,
        input: &Value,
    ) -> std::result::Result<ReputationResponse, ErrorEnvelope> {
        self.boundary(RequestKind::PersonaEngine, input, |engine| {
            engine.run_reputation(input)
        })
    }

    /// Dispatch by kind and render the outcome as JSON.
    pub fn handle(&mut self, kind: RequestKind, input: &Value) -> Value {
        let board_id = board_id_of(input);
        match kind {
            RequestKind::DeploymentGuard => render(&board_id, kind, self.deployment_guard(input)),
            RequestKind::PermissionEscalationGuard => {
                render(&board_id, kind, self.permission_escalation_guard(input))
            }
            RequestKind::PersonaGenerator => render(&board_id, kind, self.generate_personas(input)),
            RequestKind::PersonaEngine => render(&board_id, kind, self.update_reputation(input)),
        }
    }

    /// Validate, run `f`, and convert failures into envelopes.
    fn boundary<T, F>(&mut self, kind: RequestKind, input: &Value, f: F) -> std::result::Result<T, ErrorEnvelope>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let board_id = board_id_of(input);
        info!(kind = %kind, board_id = %board_id, "handling request");

        if let Err(err) = validate_request(kind, input) {
            warn!(kind = %kind, board_id = %board_id, error = %err, "rejected invalid input");
            return Err(ErrorEnvelope::from_error(&board_id, kind.failure_code(), &err));
        }

        match f(self) {
            Ok(response) => Ok(response),
            Err(err) => {
                let dropped = self.store.rollback();
                if err.is_validation() {
                    warn!(kind = %kind, board_id = %board_id, error = %err, "rejected invalid input");
                } else {
                    error!(
                        kind = %kind,
                        board_id = %board_id,
                        error = %err,
                        dropped,
                        "request failed"
                    );
                }
                Err(ErrorEnvelope::from_error(&board_id, kind.failure_code(), &err))
            }
        }
    }

    /// Base ruleset merged with request overrides.
    fn effective_ruleset(&self, input: &Value) -> Result<Ruleset> {
        let ruleset = self.config.default_ruleset.with_overrides(input.get("ruleset"))?;
        ruleset.validate()?;
        Ok(ruleset)
    }
}

/// Persona set supplied inline with a request.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct InlinePersonaSet {
    #[serde(default)]
    persona_set_id: Option<String>,
    personas: Vec<Persona>,
}

fn board_id_of(input: &Value) -> String {
    input
        .get("board_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Deserialize a required field.
fn field<T: DeserializeOwned>(input: &Value, name: &str) -> Result<T> {
    let value = input.get(name).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| Error::invalid(name, format!("{} is invalid: {}", name, e)))
}

/// Deserialize an optional field.
fn optional_field<T: DeserializeOwned>(input: &Value, name: &str) -> Result<Option<T>> {
    match input.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => field(input, name).map(Some),
    }
}

fn render<T: Serialize>(
    board_id: &str,
    kind: RequestKind,
    outcome: std::result::Result<T, ErrorEnvelope>,
) -> Value {
    let rendered = match outcome {
        Ok(response) => serde_json::to_value(response),
        Err(envelope) => serde_json::to_value(envelope),
    };
    rendered.unwrap_or_else(|e| {
        let err = Error::Serialization(e.to_string());
        let envelope = ErrorEnvelope::from_error(board_id, kind.failure_code(), &err);
        serde_json::json!({
            "board_id": envelope.board_id,
            "error": {"code": envelope.error.code.as_str(), "message": envelope.error.message},
        })
    })
}
