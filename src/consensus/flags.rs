//! Policy flags and their classification.
//!
//! Flags are plain string tags. Each guard family owns a vocabulary mapping
//! every tag it can raise to a severity; the shared vote-signal tags are part
//! of every vocabulary.

use crate::consensus::voting::ResolvedVotes;
use crate::core::{Error, Result};
use crate::persona::PersonaSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A high-reputation, high-confidence NO vote.
pub const PERSONA_VETO: &str = "PERSONA_VETO";
/// A NO vote at moderate confidence.
pub const PERSONA_OBJECTION: &str = "PERSONA_OBJECTION";
/// At least one REWRITE vote.
pub const PERSONA_REWRITE_REQUESTED: &str = "PERSONA_REWRITE_REQUESTED";
/// Weighted YES share below the approval threshold.
pub const WEAK_CONSENSUS: &str = "WEAK_CONSENSUS";
/// No vote resolved to a persona.
pub const NO_ELIGIBLE_VOTES: &str = "NO_ELIGIBLE_VOTES";

/// Severity of a flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagSeverity {
    /// Forces BLOCK
    Hard,
    /// Forces REQUIRE_REWRITE absent hard flags
    Rewrite,
}

/// Flags raised for one proposal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFlags {
    pub hard_flags: BTreeSet<String>,
    pub rewrite_flags: BTreeSet<String>,
}

impl PolicyFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a tag at a severity.
    pub fn raise(&mut self, tag: &str, severity: FlagSeverity) {
        match severity {
            FlagSeverity::Hard => self.hard_flags.insert(tag.to_string()),
            FlagSeverity::Rewrite => self.rewrite_flags.insert(tag.to_string()),
        };
    }

    /// Merge another set of flags into this one.
    pub fn merge(&mut self, other: PolicyFlags) {
        self.hard_flags.extend(other.hard_flags);
        self.rewrite_flags.extend(other.rewrite_flags);
    }

    pub fn has_hard(&self) -> bool {
        !self.hard_flags.is_empty()
    }

    pub fn has_rewrite(&self) -> bool {
        !self.rewrite_flags.is_empty()
    }

    /// No flags at all.
    pub fn is_clean(&self) -> bool {
        !self.has_hard() && !self.has_rewrite()
    }
}

/// Tag vocabulary for one guard family.
#[derive(Clone, Debug)]
pub struct FlagVocabulary {
    guard: &'static str,
    tags: BTreeMap<&'static str, FlagSeverity>,
}

impl FlagVocabulary {
    /// Create a vocabulary holding the shared vote-signal tags.
    pub fn new(guard: &'static str) -> Self {
        Self {
            guard,
            tags: BTreeMap::new(),
        }
        .with_hard(PERSONA_VETO)
        .with_rewrite(PERSONA_OBJECTION)
        .with_rewrite(PERSONA_REWRITE_REQUESTED)
        .with_rewrite(WEAK_CONSENSUS)
        .with_rewrite(NO_ELIGIBLE_VOTES)
    }

    /// Register a hard tag.
    pub fn with_hard(mut self, tag: &'static str) -> Self {
        self.tags.insert(tag, FlagSeverity::Hard);
        self
    }

    /// Register a rewrite tag.
    pub fn with_rewrite(mut self, tag: &'static str) -> Self {
        self.tags.insert(tag, FlagSeverity::Rewrite);
        self
    }

    pub fn guard(&self) -> &'static str {
        self.guard
    }

    /// Severity of a tag, if classified.
    pub fn severity(&self, tag: &str) -> Option<FlagSeverity> {
        self.tags.get(tag).copied()
    }

    /// Classify raised tags into policy flags.
    pub fn classify<'a, I>(&self, tags: I) -> Result<PolicyFlags>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut flags = PolicyFlags::new();
        for tag in tags {
            let severity = self.severity(tag).ok_or_else(|| Error::UnknownFlag {
                guard: self.guard.to_string(),
                flag: tag.to_string(),
            })?;
            flags.raise(tag, severity);
        }
        Ok(flags)
    }
}

/// Guard-family flag derivation strategy.
///
/// Implementations inspect the proposed action (and, where the family cares,
/// the resolved votes) and raise tags from their own vocabulary. The shared
/// aggregator adds the vote-signal flags on top.
pub trait FlagDerivation {
    /// The proposed action this guard family evaluates.
    type Proposal;

    /// Guard family name, e.g. `deployment-guard`.
    fn guard_name(&self) -> &'static str;

    /// Tags this guard can raise.
    fn vocabulary(&self) -> &FlagVocabulary;

    /// Derive the guard-specific flags.
    fn derive_flags(
        &self,
        proposal: &Self::Proposal,
        votes: &ResolvedVotes,
        personas: &PersonaSet,
    ) -> Result<PolicyFlags>;
}
