//! Rulesets for aggregation and reputation updates.

use crate::consensus::aggregator::AggregationRules;
use crate::core::fingerprint::{canonical_json, sha3_256};
use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reputation update rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationRules {
    /// Added when a vote agrees with the decision
    #[serde(alias = "rewardAligned")]
    pub reward_aligned: f64,
    /// Added when a vote disagrees
    #[serde(alias = "penalizeMisaligned")]
    pub penalize_misaligned: f64,
    /// Extra penalty for confident misaligned votes
    #[serde(alias = "highConfidencePenaltyBoost")]
    pub high_confidence_penalty_boost: f64,
    #[serde(alias = "highConfidenceThreshold")]
    pub high_confidence_threshold: f64,
    #[serde(alias = "minRep")]
    pub min_rep: f64,
    #[serde(alias = "maxRep")]
    pub max_rep: f64,
}

/// camelCase spellings accepted for reputation rule keys.
pub const REPUTATION_KEY_ALIASES: [(&str, &str); 6] = [
    ("rewardAligned", "reward_aligned"),
    ("penalizeMisaligned", "penalize_misaligned"),
    ("highConfidencePenaltyBoost", "high_confidence_penalty_boost"),
    ("highConfidenceThreshold", "high_confidence_threshold"),
    ("minRep", "min_rep"),
    ("maxRep", "max_rep"),
];

fn canonical_key(key: &str) -> &str {
    REPUTATION_KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, name)| *name)
        .unwrap_or(key)
}

impl Default for ReputationRules {
    fn default() -> Self {
        Self {
            reward_aligned: 0.02,
            penalize_misaligned: -0.03,
            high_confidence_penalty_boost: -0.02,
            high_confidence_threshold: 0.8,
            min_rep: 0.05,
            max_rep: 0.95,
        }
    }
}

impl ReputationRules {
    /// Reject rules that cannot produce bounded reputations.
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("reward_aligned", self.reward_aligned),
            ("penalize_misaligned", self.penalize_misaligned),
            ("high_confidence_penalty_boost", self.high_confidence_penalty_boost),
            ("high_confidence_threshold", self.high_confidence_threshold),
            ("min_rep", self.min_rep),
            ("max_rep", self.max_rep),
        ];
        if let Some((name, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::MalformedRuleset(format!("{} must be finite", name)));
        }

        for (name, value) in [("min_rep", self.min_rep), ("max_rep", self.max_rep)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::MalformedRuleset(format!(
                    "{} must be within 0..1, got {}",
                    name, value
                )));
            }
        }
        if self.min_rep >= self.max_rep {
            return Err(Error::MalformedRuleset(format!(
                "min_rep ({}) must be below max_rep ({})",
                self.min_rep, self.max_rep
            )));
        }
        if self.reward_aligned < 0.0 {
            return Err(Error::MalformedRuleset(
                "reward_aligned must not be negative".to_string(),
            ));
        }
        if self.penalize_misaligned > 0.0 || self.high_confidence_penalty_boost > 0.0 {
            return Err(Error::MalformedRuleset(
                "penalties must not be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.high_confidence_threshold) {
            return Err(Error::MalformedRuleset(
                "high_confidence_threshold must be within 0..1".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamp a reputation into bounds.
    pub fn clamp(&self, reputation: f64) -> f64 {
        reputation.clamp(self.min_rep, self.max_rep)
    }
}

/// Complete ruleset threaded through a request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    #[serde(flatten)]
    pub reputation: ReputationRules,
    #[serde(flatten)]
    pub aggregation: AggregationRules,
}

impl Ruleset {
    /// Apply per-request overrides on top of this ruleset.
    pub fn with_overrides(&self, overrides: Option<&Value>) -> Result<Ruleset> {
        let overrides = match overrides.and_then(Value::as_object) {
            Some(map) if !map.is_empty() => map,
            _ => return Ok(self.clone()),
        };

        let mut merged = serde_json::to_value(self)?;
        if let Some(base) = merged.as_object_mut() {
            for (key, value) in overrides {
                base.insert(canonical_key(key).to_string(), value.clone());
            }
        }
        Ok(serde_json::from_value(merged)?)
    }

    /// Validate both rule groups.
    pub fn validate(&self) -> Result<()> {
        self.reputation.validate()?;
        self.aggregation.validate()
    }

    /// Short content reference, e.g. `ruleset:1f2e3d4c5b6a`.
    pub fn ruleset_ref(&self) -> Result<String> {
        let value = serde_json::to_value(self)?;
        let digest = hex::encode(sha3_256(canonical_json(&value).as_bytes()));
        Ok(format!("ruleset:{}", &digest[..12]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_valid() {
        let ruleset = Ruleset::default();
        assert!(ruleset.validate().is_ok());
        assert_eq!(ruleset.reputation.reward_aligned, 0.02);
        assert_eq!(ruleset.aggregation.approve_threshold, 0.7);
    }

    #[test]
    fn test_flat_serialization() {
        let value = serde_json::to_value(Ruleset::default()).unwrap();
        assert_eq!(value["min_rep"], json!(0.05));
        assert_eq!(value["confidence_weighting"], json!(true));
    }

    #[test]
    fn test_overrides_merge() {
        let ruleset = Ruleset::default()
            .with_overrides(Some(&json!({"reward_aligned": 0.05, "approve_threshold": 0.6})))
            .unwrap();
        assert_eq!(ruleset.reputation.reward_aligned, 0.05);
        assert_eq!(ruleset.aggregation.approve_threshold, 0.6);
        assert_eq!(ruleset.reputation.max_rep, 0.95);

        assert_eq!(Ruleset::default().with_overrides(None).unwrap(), Ruleset::default());
    }

    #[test]
    fn test_camel_case_keys() {
        let camel = Ruleset::default()
            .with_overrides(Some(&json!({"rewardAligned": 0.05, "minRep": 0.1, "maxRep": 0.9})))
            .unwrap();
        let snake = Ruleset::default()
            .with_overrides(Some(&json!({"reward_aligned": 0.05, "min_rep": 0.1, "max_rep": 0.9})))
            .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.reputation.reward_aligned, 0.05);
        assert_eq!(camel.ruleset_ref().unwrap(), snake.ruleset_ref().unwrap());

        let rules: ReputationRules =
            serde_json::from_value(json!({"penalizeMisaligned": -0.1, "highConfidencePenaltyBoost": -0.05}))
                .unwrap();
        assert_eq!(rules.penalize_misaligned, -0.1);
        assert_eq!(rules.high_confidence_penalty_boost, -0.05);
        assert_eq!(rules.max_rep, 0.95);
    }

    #[test]
    fn test_malformed_rulesets() {
        let bad = [
            json!({"min_rep": 0.9, "max_rep": 0.1}),
            json!({"max_rep": 1.5}),
            json!({"reward_aligned": -0.1}),
            json!({"penalize_misaligned": 0.1}),
            json!({"high_confidence_penalty_boost": 0.2}),
        ];
        for overrides in bad {
            let ruleset = Ruleset::default().with_overrides(Some(&overrides)).unwrap();
            assert!(
                matches!(ruleset.validate(), Err(Error::MalformedRuleset(_))),
                "accepted {}",
                overrides
            );
        }
    }

    #[test]
    fn test_ruleset_ref() {
        let a = Ruleset::default().ruleset_ref().unwrap();
        assert!(a.starts_with("ruleset:"));
        assert_eq!(a.len(), "ruleset:".len() + 12);

        let b = Ruleset::default()
            .with_overrides(Some(&json!({"reward_aligned": 0.03})))
            .unwrap()
            .ruleset_ref()
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_clamp() {
        let rules = ReputationRules::default();
        assert_eq!(rules.clamp(1.2), 0.95);
        assert_eq!(rules.clamp(-0.3), 0.05);
        assert_eq!(rules.clamp(0.4), 0.4);
    }
}
