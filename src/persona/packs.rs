//! Persona pack templates.

use serde::{Deserialize, Serialize};

/// Known persona pack templates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaPack {
    #[default]
    General,
    Founder,
    Security,
    Compliance,
    Engineering,
}

/// A reviewer archetype within a pack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Archetype {
    pub name: &'static str,
    pub role: &'static str,
    /// Base caution, 0 = permissive, 1 = conservative
    pub risk_bias: f64,
}

const fn archetype(name: &'static str, role: &'static str, risk_bias: f64) -> Archetype {
    Archetype {
        name,
        role,
        risk_bias,
    }
}

const GENERAL: &[Archetype] = &[
    archetype("The Skeptic", "skeptic", 0.7),
    archetype("The Pragmatist", "pragmatist", 0.5),
    archetype("The Advocate", "advocate", 0.3),
    archetype("The Operator", "operator", 0.6),
    archetype("Customer Voice", "customer_voice", 0.4),
];

const FOUNDER: &[Archetype] = &[
    archetype("Visionary Founder", "visionary_founder", 0.3),
    archetype("Finance Lead", "cfo", 0.65),
    archetype("Head of Product", "head_of_product", 0.45),
    archetype("Growth Lead", "growth_lead", 0.35),
    archetype("Legal Counsel", "legal_counsel", 0.8),
    archetype("Early Customer", "early_customer", 0.5),
];

const SECURITY: &[Archetype] = &[
    archetype("Security Architect", "security_architect", 0.85),
    archetype("Red Teamer", "red_teamer", 0.9),
    archetype("Incident Responder", "incident_responder", 0.75),
    archetype("Identity Administrator", "identity_admin", 0.7),
    archetype("Risk Officer", "risk_officer", 0.8),
];

const COMPLIANCE: &[Archetype] = &[
    archetype("Compliance Officer", "compliance_officer", 0.85),
    archetype("Internal Auditor", "auditor", 0.8),
    archetype("Privacy Counsel", "privacy_counsel", 0.8),
    archetype("Policy Analyst", "policy_analyst", 0.65),
    archetype("Regulator Liaison", "regulator_liaison", 0.75),
];

const ENGINEERING: &[Archetype] = &[
    archetype("Site Reliability Engineer", "sre", 0.7),
    archetype("Release Manager", "release_manager", 0.6),
    archetype("Staff Engineer", "staff_engineer", 0.5),
    archetype("QA Lead", "qa_lead", 0.65),
    archetype("Platform Owner", "platform_owner", 0.55),
];

impl PersonaPack {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaPack::General => "general",
            PersonaPack::Founder => "founder",
            PersonaPack::Security => "security",
            PersonaPack::Compliance => "compliance",
            PersonaPack::Engineering => "engineering",
        }
    }

    /// Ordered archetypes of this pack.
    pub fn archetypes(&self) -> &'static [Archetype] {
        match self {
            PersonaPack::General => GENERAL,
            PersonaPack::Founder => FOUNDER,
            PersonaPack::Security => SECURITY,
            PersonaPack::Compliance => COMPLIANCE,
            PersonaPack::Engineering => ENGINEERING,
        }
    }

    /// Initial reputation for personas of this pack.
    pub fn default_reputation(&self) -> f64 {
        match self {
            PersonaPack::Security | PersonaPack::Compliance => 0.55,
            _ => 0.5,
        }
    }
}

impl std::fmt::Display for PersonaPack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::requests::PERSONA_PACKS;
    use std::collections::HashSet;

    #[test]
    fn test_every_schema_pack_parses() {
        for name in PERSONA_PACKS {
            let pack: PersonaPack = serde_json::from_value(serde_json::json!(name)).unwrap();
            assert_eq!(pack.as_str(), *name);
        }
    }

    #[test]
    fn test_roles_unique_within_pack() {
        for name in PERSONA_PACKS {
            let pack: PersonaPack = serde_json::from_value(serde_json::json!(name)).unwrap();
            let roles: HashSet<_> = pack.archetypes().iter().map(|a| a.role).collect();
            assert_eq!(roles.len(), pack.archetypes().len());
        }
    }

    #[test]
    fn test_default_reputation() {
        assert_eq!(PersonaPack::Founder.default_reputation(), 0.5);
        assert_eq!(PersonaPack::Security.default_reputation(), 0.55);
    }
}
