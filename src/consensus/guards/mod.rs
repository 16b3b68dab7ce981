//! Guard families.
//!
//! Each family owns its proposal schema, its constraints and its flag
//! vocabulary, and plugs into the shared aggregator through
//! [`FlagDerivation`].

pub mod deployment;
pub mod permission;

pub use deployment::{DeploymentConstraints, DeploymentGuard, DeploymentProposal};
pub use permission::{EscalationConstraints, EscalationProposal, PermissionEscalationGuard};

use crate::consensus::flags::FlagDerivation;
use crate::consensus::resolver::FinalDecision;
use crate::consensus::voting::{ResolvedVotes, VoteType};
use crate::schema::RequestKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Minimum persona risk bias for a reviewer veto.
pub const REVIEWER_VETO_MIN_RISK_BIAS: f64 = 0.8;
/// Minimum vote confidence for a reviewer veto.
pub const REVIEWER_VETO_MIN_CONFIDENCE: f64 = 0.8;

/// A guard family usable by the engine.
///
/// The proposal type must round-trip through JSON; callers restate
/// `G::Proposal: DeserializeOwned + Serialize` where they need it.
pub trait GuardFamily: FlagDerivation + Sized {
    /// Request kind handled by this family.
    const KIND: RequestKind;
    /// Top-level request field holding the proposal.
    const PROPOSAL_FIELD: &'static str;
    /// Noun used in required actions.
    const ACTION: &'static str;

    type Constraints: DeserializeOwned + Serialize + Default + Clone;

    /// Build the guard for one request.
    fn with_constraints(constraints: Self::Constraints) -> Self;

    /// Effective constraints.
    fn constraints(&self) -> &Self::Constraints;
}

/// Target environment of a proposed action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

/// Follow-up actions for a decision.
pub fn required_actions(decision: FinalDecision, action: &str) -> Vec<String> {
    match decision {
        FinalDecision::Block => vec![format!("Do not apply the proposed {}", action)],
        FinalDecision::RequireRewrite => vec![format!(
            "Amend the proposed {} and resubmit with safeguards",
            action
        )],
        FinalDecision::Allow => Vec::new(),
    }
}

/// Whether a cautious reviewer voted NO with high confidence.
pub(crate) fn cautious_reviewer_objects(votes: &ResolvedVotes) -> bool {
    votes.counted.iter().any(|v| {
        v.vote == VoteType::No
            && v.confidence >= REVIEWER_VETO_MIN_CONFIDENCE
            && v.risk_bias.map(|b| b >= REVIEWER_VETO_MIN_RISK_BIAS).unwrap_or(false)
    })
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true)
}
