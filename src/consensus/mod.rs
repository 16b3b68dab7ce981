//! Consensus Module
//!
//! Turns persona votes on a proposed action into a final decision:
//! - Reputation-weighted vote resolution and tallies
//! - Policy flag vocabularies per guard family
//! - Shared vote aggregation
//! - Decision resolution (BLOCK > REQUIRE_REWRITE > ALLOW)

pub mod aggregator;
pub mod flags;
pub mod guards;
pub mod resolver;
pub mod voting;

pub use aggregator::{Aggregation, AggregationRules, AggregationSummary, VoteAggregator};
pub use flags::{FlagDerivation, FlagSeverity, FlagVocabulary, PolicyFlags};
pub use guards::{DeploymentGuard, GuardFamily, PermissionEscalationGuard};
pub use resolver::{Decision, DecisionResolver, FinalDecision};
pub use voting::{ResolvedVotes, Vote, VoteBatch, VoteTally, VoteType};
