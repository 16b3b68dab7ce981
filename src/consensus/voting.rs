//! Reputation-weighted voting.
//!
//! Votes reference personas by id; each counted vote is weighted by the
//! persona's current reputation, optionally scaled by the vote's confidence.
//! Votes for unknown personas and repeat votes are skipped, never fatal.

use crate::persona::PersonaSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Type of vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteType {
    /// Approve the proposal
    Yes,
    /// Reject the proposal
    No,
    /// Approve only after changes
    Rewrite,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Yes => "YES",
            VoteType::No => "NO",
            VoteType::Rewrite => "REWRITE",
        }
    }
}

impl std::fmt::Display for VoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single vote from a persona.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Referenced persona
    pub persona_id: String,
    pub vote: VoteType,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Optional justification
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    /// Display name of an external voter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Self-reported reputation of an external voter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reputation_before: Option<f64>,
}

impl Vote {
    /// Create a new vote.
    pub fn new(persona_id: &str, vote: VoteType, confidence: f64) -> Self {
        Self {
            persona_id: persona_id.to_string(),
            vote,
            confidence,
            reasons: Vec::new(),
            name: None,
            reputation_before: None,
        }
    }

    /// Attach an external voter's own reputation.
    pub fn with_reputation_before(mut self, reputation: f64) -> Self {
        self.reputation_before = Some(reputation);
        self
    }

    /// Add a reason.
    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reasons.push(reason.to_string());
        self
    }
}

/// The votes cast on one proposal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteBatch {
    pub votes: Vec<Vote>,
}

impl VoteBatch {
    pub fn new(votes: Vec<Vote>) -> Self {
        Self { votes }
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Resolve votes against a persona set.
    pub fn resolve(&self, personas: &PersonaSet, confidence_weighting: bool) -> ResolvedVotes {
        let mut counted = Vec::new();
        let mut skipped = Vec::new();
        let mut seen = HashSet::new();

        for vote in &self.votes {
            let persona = match personas.get(&vote.persona_id) {
                Some(p) => p,
                None => {
                    skipped.push(SkippedVote::new(&vote.persona_id, SkipReason::UnknownPersona));
                    continue;
                }
            };

            if !seen.insert(vote.persona_id.as_str()) {
                skipped.push(SkippedVote::new(&vote.persona_id, SkipReason::DuplicateVote));
                continue;
            }

            let weight = if confidence_weighting {
                persona.reputation * vote.confidence
            } else {
                persona.reputation
            };

            counted.push(ResolvedVote {
                persona_id: vote.persona_id.clone(),
                vote: vote.vote,
                confidence: vote.confidence,
                reputation: persona.reputation,
                risk_bias: persona.risk_bias,
                weight,
            });
        }

        if !skipped.is_empty() {
            tracing::warn!(
                persona_set_id = %personas.persona_set_id,
                skipped = skipped.len(),
                "skipped votes that did not resolve to a persona"
            );
        }

        ResolvedVotes { counted, skipped }
    }
}

/// A vote matched to its persona.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedVote {
    pub persona_id: String,
    pub vote: VoteType,
    pub confidence: f64,
    /// Persona reputation at vote time
    pub reputation: f64,
    pub risk_bias: Option<f64>,
    pub weight: f64,
}

/// Why a vote was not counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnknownPersona,
    DuplicateVote,
}

/// A vote that was dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkippedVote {
    pub persona_id: String,
    pub reason: SkipReason,
}

impl SkippedVote {
    fn new(persona_id: &str, reason: SkipReason) -> Self {
        Self {
            persona_id: persona_id.to_string(),
            reason,
        }
    }

    /// Human-readable warning.
    pub fn warning(&self) -> String {
        match self.reason {
            SkipReason::UnknownPersona => {
                format!("vote from unknown persona {} skipped", self.persona_id)
            }
            SkipReason::DuplicateVote => {
                format!("duplicate vote from persona {} skipped", self.persona_id)
            }
        }
    }
}

/// Outcome of resolving a batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedVotes {
    pub counted: Vec<ResolvedVote>,
    pub skipped: Vec<SkippedVote>,
}

/// Weighted tally of counted votes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub weighted_yes: f64,
    pub weighted_no: f64,
    pub weighted_rewrite: f64,
    pub counted_votes: usize,
    pub skipped_votes: usize,
}

impl VoteTally {
    /// Tally resolved votes.
    pub fn from_votes(resolved: &ResolvedVotes) -> Self {
        let mut tally = VoteTally {
            skipped_votes: resolved.skipped.len(),
            ..Default::default()
        };

        for v in &resolved.counted {
            match v.vote {
                VoteType::Yes => tally.weighted_yes += v.weight,
                VoteType::No => tally.weighted_no += v.weight,
                VoteType::Rewrite => tally.weighted_rewrite += v.weight,
            }
            tally.counted_votes += 1;
        }

        tally
    }

    pub fn total_weight(&self) -> f64 {
        self.weighted_yes + self.weighted_no + self.weighted_rewrite
    }

    /// Share of weight behind YES, if any weight was cast.
    pub fn yes_share(&self) -> Option<f64> {
        let total = self.total_weight();
        if total > 0.0 {
            Some(self.weighted_yes / total)
        } else {
            None
        }
    }
}
