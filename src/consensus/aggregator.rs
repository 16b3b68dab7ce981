//! Vote aggregation into policy flags.
//!
//! One pass per request: resolve votes against the persona set, tally the
//! weighted votes, raise the shared vote-signal flags and merge them with the
//! guard family's own flags.

use crate::consensus::flags::{
    FlagDerivation, PolicyFlags, NO_ELIGIBLE_VOTES, PERSONA_OBJECTION, PERSONA_REWRITE_REQUESTED,
    PERSONA_VETO, WEAK_CONSENSUS,
};
use crate::consensus::voting::{ResolvedVotes, VoteBatch, VoteTally, VoteType};
use crate::core::{Error, Result};
use crate::persona::PersonaSet;
use serde::{Deserialize, Serialize};

/// Aggregation method reported in responses.
pub const AGGREGATION_METHOD: &str = "WEIGHTED_APPROVAL_VOTE";

/// Thresholds used to turn votes into flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationRules {
    /// Scale weights by vote confidence
    pub confidence_weighting: bool,
    /// Minimum reputation for a NO vote to veto
    pub veto_min_reputation: f64,
    /// Minimum confidence for a NO vote to veto
    pub veto_min_confidence: f64,
    /// Minimum confidence for a non-veto NO vote to count as an objection
    pub objection_min_confidence: f64,
    /// Required weighted YES share
    pub approve_threshold: f64,
}

impl Default for AggregationRules {
    fn default() -> Self {
        Self {
            confidence_weighting: true,
            veto_min_reputation: 0.7,
            veto_min_confidence: 0.85,
            objection_min_confidence: 0.5,
            approve_threshold: 0.7,
        }
    }
}

impl AggregationRules {
    /// Check every threshold lies in [0, 1].
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("veto_min_reputation", self.veto_min_reputation),
            ("veto_min_confidence", self.veto_min_confidence),
            ("objection_min_confidence", self.objection_min_confidence),
            ("approve_threshold", self.approve_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::MalformedRuleset(format!(
                    "{} must be within 0..1, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Result of one aggregation pass.
#[derive(Clone, Debug)]
pub struct Aggregation {
    pub method: &'static str,
    pub tally: VoteTally,
    pub policy_flags: PolicyFlags,
    pub votes: ResolvedVotes,
}

impl Aggregation {
    /// Warnings for votes that were not counted.
    pub fn warnings(&self) -> Vec<String> {
        self.votes.skipped.iter().map(|s| s.warning()).collect()
    }
}

/// Serializable summary of an aggregation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregationSummary {
    pub method: String,
    pub weighted_yes: f64,
    pub weighted_no: f64,
    pub weighted_rewrite: f64,
    pub counted_votes: usize,
    pub skipped_votes: usize,
}

impl From<&Aggregation> for AggregationSummary {
    fn from(agg: &Aggregation) -> Self {
        Self {
            method: agg.method.to_string(),
            weighted_yes: round4(agg.tally.weighted_yes),
            weighted_no: round4(agg.tally.weighted_no),
            weighted_rewrite: round4(agg.tally.weighted_rewrite),
            counted_votes: agg.tally.counted_votes,
            skipped_votes: agg.tally.skipped_votes,
        }
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Shared vote aggregator.
#[derive(Clone, Debug, Default)]
pub struct VoteAggregator {
    rules: AggregationRules,
}

impl VoteAggregator {
    /// Create an aggregator with explicit rules.
    pub fn new(rules: AggregationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &AggregationRules {
        &self.rules
    }

    /// Aggregate a vote batch for a guard family.
    pub fn aggregate<G: FlagDerivation>(
        &self,
        guard: &G,
        proposal: &G::Proposal,
        batch: &VoteBatch,
        personas: &PersonaSet,
    ) -> Result<Aggregation> {
        self.rules.validate()?;

        let votes = batch.resolve(personas, self.rules.confidence_weighting);
        let tally = VoteTally::from_votes(&votes);

        let mut policy_flags = guard.derive_flags(proposal, &votes, personas)?;
        let signals = self.vote_signals(&votes, &tally);
        policy_flags.merge(guard.vocabulary().classify(signals)?);

        tracing::debug!(
            guard = guard.guard_name(),
            counted = tally.counted_votes,
            skipped = tally.skipped_votes,
            hard = policy_flags.hard_flags.len(),
            rewrite = policy_flags.rewrite_flags.len(),
            "aggregated votes"
        );

        Ok(Aggregation {
            method: AGGREGATION_METHOD,
            tally,
            policy_flags,
            votes,
        })
    }

    /// Shared flags raised purely from votes.
    pub fn vote_signals(&self, votes: &ResolvedVotes, tally: &VoteTally) -> Vec<&'static str> {
        let mut signals = Vec::new();

        if votes.counted.is_empty() {
            signals.push(NO_ELIGIBLE_VOTES);
            return signals;
        }

        for v in &votes.counted {
            match v.vote {
                VoteType::No => {
                    if v.reputation >= self.rules.veto_min_reputation
                        && v.confidence >= self.rules.veto_min_confidence
                    {
                        signals.push(PERSONA_VETO);
                    } else if v.confidence >= self.rules.objection_min_confidence {
                        signals.push(PERSONA_OBJECTION);
                    }
                }
                VoteType::Rewrite => signals.push(PERSONA_REWRITE_REQUESTED),
                VoteType::Yes => {}
            }
        }

        match tally.yes_share() {
            Some(share) if share < self.rules.approve_threshold => signals.push(WEAK_CONSENSUS),
            None => signals.push(WEAK_CONSENSUS),
            _ => {}
        }

        signals.sort_unstable();
        signals.dedup();
        signals
    }
}
