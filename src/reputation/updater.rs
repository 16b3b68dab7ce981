//! Reputation updates from decision alignment.
//!
//! A vote is aligned when it matches the final decision (YES/ALLOW,
//! NO/BLOCK, REWRITE/REQUIRE_REWRITE). Aligned personas gain reputation,
//! misaligned personas lose it, and confident misaligned personas lose more.

use crate::consensus::resolver::FinalDecision;
use crate::consensus::voting::{SkippedVote, VoteBatch};
use crate::core::{now, Result, Timestamp};
use crate::persona::PersonaSet;
use crate::reputation::ruleset::ReputationRules;
use serde::{Deserialize, Serialize};

/// One persona's reputation change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReputationUpdate {
    pub persona_id: String,
    pub reputation_before: f64,
    /// Effective change after clamping
    pub delta: f64,
    pub reputation_after: f64,
    pub reasons: Vec<String>,
}

/// Immutable record of the updates caused by one decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReputationDelta {
    pub decision_id: String,
    pub persona_set_id: String,
    pub ruleset_ref: String,
    pub updates: Vec<ReputationUpdate>,
    pub created_at: Timestamp,
}

/// Result of applying a decision to a persona set.
#[derive(Clone, Debug)]
pub struct ReputationOutcome {
    pub delta: ReputationDelta,
    pub skipped: Vec<SkippedVote>,
}

impl ReputationOutcome {
    pub fn warnings(&self) -> Vec<String> {
        self.skipped.iter().map(|s| s.warning()).collect()
    }
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

/// Applies reputation rules to a persona set.
#[derive(Clone, Debug, Default)]
pub struct ReputationUpdater {
    rules: ReputationRules,
}

impl ReputationUpdater {
    pub fn new(rules: ReputationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ReputationRules {
        &self.rules
    }

    /// Update reputations in `personas` for the votes in `batch`.
    ///
    /// Only the `reputation` field of voting personas changes. The set is
    /// touched once when at least one vote was counted.
    pub fn apply(
        &self,
        decision: FinalDecision,
        decision_id: &str,
        batch: &VoteBatch,
        personas: &mut PersonaSet,
        ruleset_ref: &str,
    ) -> Result<ReputationOutcome> {
        self.rules.validate()?;

        let resolved = batch.resolve(personas, false);
        let aligned_vote = decision.aligned_vote();
        let mut updates = Vec::with_capacity(resolved.counted.len());

        for vote in &resolved.counted {
            let persona = match personas.get_mut(&vote.persona_id) {
                Some(p) => p,
                None => continue,
            };
            let before = persona.reputation;
            let mut reasons = Vec::new();

            let mut nominal = if vote.vote == aligned_vote {
                reasons.push(format!("aligned with {}", decision));
                self.rules.reward_aligned
            } else {
                reasons.push(format!("misaligned with {}", decision));
                self.rules.penalize_misaligned
            };
            if vote.vote != aligned_vote && vote.confidence >= self.rules.high_confidence_threshold {
                nominal += self.rules.high_confidence_penalty_boost;
                reasons.push(format!(
                    "confidence {} at or above {}",
                    vote.confidence, self.rules.high_confidence_threshold
                ));
            }

            let raw = before + nominal;
            let after = round6(self.rules.clamp(raw));
            if after != round6(raw) {
                reasons.push(format!("clamped to [{}, {}]", self.rules.min_rep, self.rules.max_rep));
            }
            persona.reputation = after;

            updates.push(ReputationUpdate {
                persona_id: vote.persona_id.clone(),
                reputation_before: before,
                delta: round6(after - before),
                reputation_after: after,
                reasons,
            });
        }

        if !updates.is_empty() {
            personas.touch();
        }

        tracing::debug!(
            decision = %decision,
            persona_set_id = %personas.persona_set_id,
            updated = updates.len(),
            skipped = resolved.skipped.len(),
            "applied reputation updates"
        );

        Ok(ReputationOutcome {
            delta: ReputationDelta {
                decision_id: decision_id.to_string(),
                persona_set_id: personas.persona_set_id.clone(),
                ruleset_ref: ruleset_ref.to_string(),
                updates,
                created_at: now(),
            },
            skipped: resolved.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::voting::{Vote, VoteType};
    use crate::core::Error;
    use crate::persona::Persona;

    fn panel(reputation: f64) -> PersonaSet {
        PersonaSet::new("ps-1", "board-1", vec![Persona::new("p1", reputation)])
    }

    fn apply(decision: FinalDecision, vote: Vote, personas: &mut PersonaSet) -> ReputationOutcome {
        ReputationUpdater::default()
            .apply(decision, "d-1", &VoteBatch::new(vec![vote]), personas, "ruleset:test")
            .unwrap()
    }

    #[test]
    fn test_aligned_no_on_block() {
        let mut personas = panel(0.5);
        let outcome = apply(FinalDecision::Block, Vote::new("p1", VoteType::No, 0.9), &mut personas);

        let update = &outcome.delta.updates[0];
        assert_eq!(update.reputation_before, 0.5);
        assert_eq!(update.reputation_after, 0.52);
        assert_eq!(update.delta, 0.02);
        assert_eq!(personas.get("p1").unwrap().reputation, 0.52);
        assert_eq!(personas.version, 2);
    }

    #[test]
    fn test_misaligned_penalty() {
        let mut personas = panel(0.5);
        let outcome = apply(FinalDecision::Allow, Vote::new("p1", VoteType::No, 0.5), &mut personas);
        assert_eq!(outcome.delta.updates[0].reputation_after, 0.47);
    }

    #[test]
    fn test_confident_misalignment_costs_more() {
        let mut confident = panel(0.5);
        let mut unsure = panel(0.5);
        let a = apply(FinalDecision::Allow, Vote::new("p1", VoteType::No, 0.9), &mut confident);
        let b = apply(FinalDecision::Allow, Vote::new("p1", VoteType::No, 0.7), &mut unsure);

        assert_eq!(a.delta.updates[0].reputation_after, 0.45);
        assert!(a.delta.updates[0].reputation_after < b.delta.updates[0].reputation_after);
        assert_eq!(a.delta.updates[0].reasons.len(), 2);
    }

    #[test]
    fn test_clamped_to_bounds() {
        let mut high = panel(0.94);
        let out = apply(FinalDecision::Allow, Vote::new("p1", VoteType::Yes, 1.0), &mut high);
        let update = &out.delta.updates[0];
        assert_eq!(update.reputation_after, 0.95);
        assert_eq!(update.delta, 0.01);
        assert!(update.reasons.iter().any(|r| r.starts_with("clamped")));

        let mut low = panel(0.06);
        let out = apply(FinalDecision::Block, Vote::new("p1", VoteType::Yes, 1.0), &mut low);
        assert_eq!(out.delta.updates[0].reputation_after, 0.05);
    }

    #[test]
    fn test_rewrite_alignment() {
        let mut personas = panel(0.5);
        let out = apply(
            FinalDecision::RequireRewrite,
            Vote::new("p1", VoteType::Rewrite, 0.4),
            &mut personas,
        );
        assert_eq!(out.delta.updates[0].reputation_after, 0.52);
    }

    #[test]
    fn test_unknown_persona_skipped() {
        let mut personas = panel(0.5);
        let out = apply(FinalDecision::Allow, Vote::new("ghost", VoteType::Yes, 1.0), &mut personas);
        assert!(out.delta.updates.is_empty());
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(personas.version, 1);
        assert_eq!(out.warnings(), vec!["vote from unknown persona ghost skipped"]);
    }

    #[test]
    fn test_malformed_rules_rejected() {
        let updater = ReputationUpdater::new(ReputationRules {
            min_rep: 0.9,
            max_rep: 0.2,
            ..Default::default()
        });
        let mut personas = panel(0.5);
        let err = updater
            .apply(FinalDecision::Allow, "d", &VoteBatch::default(), &mut personas, "r")
            .unwrap_err();
        assert!(matches!(err, Error::MalformedRuleset(_)));
    }

    #[test]
    fn test_repeated_updates_stay_in_bounds() {
        let rules = ReputationRules::default();
        let mut personas = panel(0.5);

        for _ in 0..100 {
            apply(FinalDecision::Allow, Vote::new("p1", VoteType::Yes, 0.6), &mut personas);
            let rep = personas.get("p1").unwrap().reputation;
            assert!(rep >= rules.min_rep && rep <= rules.max_rep, "{} out of bounds", rep);
        }
        assert_eq!(personas.get("p1").unwrap().reputation, rules.max_rep);

        for _ in 0..100 {
            apply(FinalDecision::Allow, Vote::new("p1", VoteType::No, 0.95), &mut personas);
            let rep = personas.get("p1").unwrap().reputation;
            assert!(rep >= rules.min_rep && rep <= rules.max_rep, "{} out of bounds", rep);
        }
        assert_eq!(personas.get("p1").unwrap().reputation, rules.min_rep);
    }
}
