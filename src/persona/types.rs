//! Persona, persona set and task context types.

use crate::consensus::VoteBatch;
use crate::core::{now, Timestamp};
use crate::persona::packs::PersonaPack;
use crate::reputation::ReputationRules;
use serde::{Deserialize, Serialize};

/// How much risk the task owner is willing to accept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskTolerance {
    /// Shift applied to generated persona risk bias.
    pub fn bias_shift(&self) -> f64 {
        match self {
            RiskTolerance::Low => 0.1,
            RiskTolerance::Medium => 0.0,
            RiskTolerance::High => -0.1,
        }
    }
}

/// Context of the task a persona panel is generated for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    /// What the task is trying to achieve
    pub goal: String,
    /// Who the outcome is for
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    /// Ordered constraints
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

/// A simulated reviewer with a reputation weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Unique within its persona set
    pub persona_id: String,
    #[serde(default)]
    pub name: String,
    /// Archetype / role
    #[serde(default)]
    pub role: String,
    pub reputation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_bias: Option<f64>,
}

impl Persona {
    /// Create a persona with a reputation.
    pub fn new(persona_id: &str, reputation: f64) -> Self {
        Self {
            persona_id: persona_id.to_string(),
            name: persona_id.to_string(),
            role: String::new(),
            reputation,
            risk_bias: None,
        }
    }

    /// Set display name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set role.
    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    /// Set risk bias.
    pub fn with_risk_bias(mut self, risk_bias: f64) -> Self {
        self.risk_bias = Some(risk_bias);
        self
    }
}

/// A versioned collection of personas scoped to one board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonaSet {
    pub persona_set_id: String,
    #[serde(default)]
    pub board_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_pack: Option<PersonaPack>,
    /// Ordered personas
    pub personas: Vec<Persona>,
    #[serde(default = "now")]
    pub created_at: Timestamp,
    #[serde(default = "now")]
    pub updated_at: Timestamp,
    /// Incremented every time reputations change
    #[serde(default)]
    pub version: u32,
}

/// Number of personas in the fallback panel.
pub const DEFAULT_PANEL_SIZE: usize = 5;

impl PersonaSet {
    /// Create a new persona set.
    pub fn new(persona_set_id: &str, board_id: &str, personas: Vec<Persona>) -> Self {
        let created = now();
        Self {
            persona_set_id: persona_set_id.to_string(),
            board_id: board_id.to_string(),
            persona_pack: None,
            personas,
            created_at: created,
            updated_at: created,
            version: 1,
        }
    }

    /// Fallback panel used when a board has no persona set yet.
    pub fn default_panel(persona_set_id: &str, board_id: &str) -> Self {
        let personas = (1..=DEFAULT_PANEL_SIZE)
            .map(|n| {
                Persona::new(&format!("default-{}", n), 0.5)
                    .with_name(&format!("Default Persona {}", n))
                    .with_role("generalist")
            })
            .collect();
        Self::new(persona_set_id, board_id, personas)
    }

    /// Look up a persona by id.
    pub fn get(&self, persona_id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.persona_id == persona_id)
    }

    /// Look up a persona mutably.
    pub fn get_mut(&mut self, persona_id: &str) -> Option<&mut Persona> {
        self.personas.iter_mut().find(|p| p.persona_id == persona_id)
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Add a persona for each vote that carries its own `reputation_before`
    /// and names no persona in this set. Returns how many were added.
    pub fn admit_external_voters(&mut self, batch: &VoteBatch, rules: &ReputationRules) -> usize {
        let mut admitted = 0;
        for vote in &batch.votes {
            let reputation = match vote.reputation_before {
                Some(r) => rules.clamp(r),
                None => continue,
            };
            if self.get(&vote.persona_id).is_some() {
                continue;
            }
            let name = vote.name.as_deref().unwrap_or(vote.persona_id.as_str());
            self.personas.push(
                Persona::new(&vote.persona_id, reputation)
                    .with_name(name)
                    .with_role("external_agent"),
            );
            admitted += 1;
        }
        admitted
    }

    /// Mark the set as updated.
    pub fn touch(&mut self) {
        self.updated_at = now();
        self.version += 1;
    }
}
