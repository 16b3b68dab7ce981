//! Decision resolution.
//!
//! A single-pass state machine from PENDING to one of three terminal states.
//! Hard flags take precedence over rewrite flags.

use crate::consensus::flags::PolicyFlags;
use crate::consensus::voting::VoteType;
use crate::core::{now, Fingerprint, Timestamp};
use serde::{Deserialize, Serialize};

/// Final outcome for a proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalDecision {
    Allow,
    Block,
    RequireRewrite,
}

impl FinalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalDecision::Allow => "ALLOW",
            FinalDecision::Block => "BLOCK",
            FinalDecision::RequireRewrite => "REQUIRE_REWRITE",
        }
    }

    /// The vote that agrees with this decision.
    pub fn aligned_vote(&self) -> VoteType {
        match self {
            FinalDecision::Allow => VoteType::Yes,
            FinalDecision::Block => VoteType::No,
            FinalDecision::RequireRewrite => VoteType::Rewrite,
        }
    }
}

impl std::fmt::Display for FinalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolver state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionState {
    Pending,
    Resolved(FinalDecision),
}

impl DecisionState {
    /// Advance once. Terminal states are absorbing.
    pub fn step(self, flags: &PolicyFlags) -> DecisionState {
        match self {
            DecisionState::Pending => {
                let decision = if flags.has_hard() {
                    FinalDecision::Block
                } else if flags.has_rewrite() {
                    FinalDecision::RequireRewrite
                } else {
                    FinalDecision::Allow
                };
                DecisionState::Resolved(decision)
            }
            resolved => resolved,
        }
    }
}

/// Maps policy flags to a final decision.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecisionResolver;

impl DecisionResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve flags to a final decision.
    pub fn resolve(&self, flags: &PolicyFlags) -> FinalDecision {
        match DecisionState::Pending.step(flags) {
            DecisionState::Resolved(decision) => decision,
            // step() never leaves Pending
            DecisionState::Pending => FinalDecision::Block,
        }
    }
}

/// A resolved decision. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: String,
    pub board_id: String,
    pub final_decision: FinalDecision,
    pub policy_flags: PolicyFlags,
    pub created_at: Timestamp,
}

impl Decision {
    /// Create a decision whose id is derived from the request fingerprint.
    pub fn new(
        fingerprint: &Fingerprint,
        board_id: &str,
        final_decision: FinalDecision,
        policy_flags: PolicyFlags,
    ) -> Self {
        Self {
            decision_id: fingerprint.to_uuid().to_string(),
            board_id: board_id.to_string(),
            final_decision,
            policy_flags,
            created_at: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::flags::FlagSeverity;

    fn flags(hard: &[&str], rewrite: &[&str]) -> PolicyFlags {
        let mut f = PolicyFlags::new();
        for h in hard {
            f.raise(h, FlagSeverity::Hard);
        }
        for r in rewrite {
            f.raise(r, FlagSeverity::Rewrite);
        }
        f
    }

    #[test]
    fn test_hard_flags_block() {
        let resolver = DecisionResolver::new();
        assert_eq!(resolver.resolve(&flags(&["SOD_CONFLICT"], &[])), FinalDecision::Block);
        assert_eq!(
            resolver.resolve(&flags(&["SOD_CONFLICT"], &["WEAK_CONSENSUS"])),
            FinalDecision::Block
        );
    }

    #[test]
    fn test_rewrite_flags_require_rewrite() {
        let resolver = DecisionResolver::new();
        assert_eq!(
            resolver.resolve(&flags(&[], &["PERSONA_OBJECTION"])),
            FinalDecision::RequireRewrite
        );
    }

    #[test]
    fn test_clean_allows() {
        assert_eq!(DecisionResolver::new().resolve(&PolicyFlags::new()), FinalDecision::Allow);
    }

    #[test]
    fn test_terminal_state_absorbs() {
        let state = DecisionState::Resolved(FinalDecision::Allow);
        assert_eq!(state.step(&flags(&["X"], &[])), state);
    }

    #[test]
    fn test_aligned_vote() {
        assert_eq!(FinalDecision::Allow.aligned_vote(), VoteType::Yes);
        assert_eq!(FinalDecision::Block.aligned_vote(), VoteType::No);
        assert_eq!(FinalDecision::RequireRewrite.aligned_vote(), VoteType::Rewrite);
    }

    #[test]
    fn test_decision_id_from_fingerprint() {
        let fp = Fingerprint::new([3u8; 32]);
        let a = Decision::new(&fp, "b", FinalDecision::Allow, PolicyFlags::new());
        let b = Decision::new(&fp, "b", FinalDecision::Allow, PolicyFlags::new());
        assert_eq!(a.decision_id, b.decision_id);
        assert_eq!(
            serde_json::to_value(a.final_decision).unwrap(),
            serde_json::json!("ALLOW")
        );
    }
}
