//! Reputation Module
//!
//! Provides the feedback loop from decisions to persona weights:
//! - Rulesets (reputation bounds, rewards, penalties, aggregation thresholds)
//! - Alignment-based reputation updates with clamping

pub mod ruleset;
pub mod updater;

pub use ruleset::{ReputationRules, Ruleset};
pub use updater::{ReputationDelta, ReputationOutcome, ReputationUpdate, ReputationUpdater};
