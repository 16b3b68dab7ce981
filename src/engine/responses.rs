//! Response payloads.

use crate::board::{BoardWrite, OperatingMode};
use crate::consensus::{AggregationSummary, FinalDecision, PolicyFlags};
use crate::core::Timestamp;
use crate::persona::{Persona, PersonaPack, PersonaSet};
use crate::reputation::ReputationUpdate;
use serde::{Deserialize, Serialize};

/// Response of a guard request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuardResponse {
    pub board_id: String,
    pub decision_id: String,
    pub timestamp: Timestamp,
    pub persona_set_id: String,
    pub mode: OperatingMode,
    pub final_decision: FinalDecision,
    pub policy_flags: PolicyFlags,
    pub aggregation: AggregationSummary,
    pub required_actions: Vec<String>,
    /// Empty in external_agent mode
    pub persona_updates: Vec<ReputationUpdate>,
    pub warnings: Vec<String>,
    pub board_writes: Vec<BoardWrite>,
}

/// Response of a persona-generator request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub board_id: String,
    pub persona_set_id: String,
    pub persona_pack: PersonaPack,
    pub personas: Vec<Persona>,
    pub created_at: Timestamp,
    pub board_writes: Vec<BoardWrite>,
}

/// Response of a persona-engine request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReputationResponse {
    pub board_id: String,
    pub decision_id: String,
    pub final_decision: FinalDecision,
    pub persona_set_id: String,
    pub ruleset_ref: String,
    pub persona_updates: Vec<ReputationUpdate>,
    pub updated_persona_set: PersonaSet,
    pub warnings: Vec<String>,
    pub board_writes: Vec<BoardWrite>,
}
