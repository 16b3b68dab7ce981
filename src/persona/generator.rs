//! Persona set generation.
//!
//! Generation is deterministic given the request fingerprint: archetypes are
//! assigned by index and the per-persona risk jitter comes from an RNG seeded
//! with the fingerprint digest.

use crate::core::Fingerprint;
use crate::persona::packs::PersonaPack;
use crate::persona::types::{Persona, PersonaSet, TaskContext};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default number of generated personas.
pub const DEFAULT_PERSONA_COUNT: usize = 5;

/// Maximum risk-bias jitter applied per persona.
const RISK_JITTER: f64 = 0.05;

/// A persona generation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub board_id: String,
    pub task_context: TaskContext,
    #[serde(default = "default_count")]
    pub n_personas: usize,
    #[serde(default)]
    pub persona_pack: PersonaPack,
}

fn default_count() -> usize {
    DEFAULT_PERSONA_COUNT
}

/// Builds persona sets from packs.
#[derive(Clone, Debug, Default)]
pub struct PersonaGenerator;

impl PersonaGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a persona set for `request`.
    pub fn generate(&self, request: &GenerationRequest, fingerprint: &Fingerprint) -> PersonaSet {
        let pack = request.persona_pack;
        let archetypes = pack.archetypes();
        let shift = request.task_context.risk_tolerance.bias_shift();
        let mut rng = StdRng::from_seed(fingerprint.to_bytes());

        let personas = (0..request.n_personas)
            .map(|i| {
                let archetype = archetypes[i % archetypes.len()];
                let cycle = i / archetypes.len();
                let name = if cycle == 0 {
                    archetype.name.to_string()
                } else {
                    format!("{} {}", archetype.name, cycle + 1)
                };
                let jitter = rng.gen_range(-RISK_JITTER..=RISK_JITTER);
                let risk_bias = round3((archetype.risk_bias + shift + jitter).clamp(0.0, 1.0));

                Persona::new(
                    &format!("{}-{}-{}", pack.as_str(), i + 1, archetype.role),
                    pack.default_reputation(),
                )
                .with_name(&name)
                .with_role(archetype.role)
                .with_risk_bias(risk_bias)
            })
            .collect();

        let mut set = PersonaSet::new(
            &fingerprint.to_uuid().to_string(),
            &request.board_id,
            personas,
        );
        set.persona_pack = Some(pack);

        tracing::debug!(
            board_id = %request.board_id,
            persona_set_id = %set.persona_set_id,
            pack = %pack,
            count = set.len(),
            "generated persona set"
        );

        set
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::fingerprint_of;
    use crate::persona::types::RiskTolerance;
    use std::collections::HashSet;

    fn request(n: usize, pack: PersonaPack) -> GenerationRequest {
        GenerationRequest {
            board_id: "board-1".into(),
            task_context: TaskContext {
                goal: "Launch the beta".into(),
                audience: Some("founders".into()),
                risk_tolerance: RiskTolerance::Medium,
                constraints: vec!["no PII".into()],
                domain: Some("saas".into()),
            },
            n_personas: n,
            persona_pack: pack,
        }
    }

    #[test]
    fn test_generates_requested_count() {
        let req = request(4, PersonaPack::Founder);
        let fp = fingerprint_of("persona-generator", &req).unwrap();
        let set = PersonaGenerator::new().generate(&req, &fp);

        assert_eq!(set.len(), 4);
        assert_eq!(set.persona_pack, Some(PersonaPack::Founder));
        assert!(set.personas.iter().all(|p| p.reputation == 0.5));
        assert_eq!(set.personas[0].persona_id, "founder-1-visionary_founder");
    }

    #[test]
    fn test_generation_is_deterministic() {
        let req = request(7, PersonaPack::Security);
        let fp = fingerprint_of("persona-generator", &req).unwrap();
        let a = PersonaGenerator::new().generate(&req, &fp);
        let b = PersonaGenerator::new().generate(&req, &fp);

        assert_eq!(a.persona_set_id, b.persona_set_id);
        assert_eq!(a.personas, b.personas);
    }

    #[test]
    fn test_ids_unique_when_cycling() {
        let req = request(9, PersonaPack::General);
        let fp = fingerprint_of("persona-generator", &req).unwrap();
        let set = PersonaGenerator::new().generate(&req, &fp);

        let ids: HashSet<_> = set.personas.iter().map(|p| p.persona_id.as_str()).collect();
        assert_eq!(ids.len(), 9);
        assert_eq!(set.personas[5].name, "The Skeptic 2");
    }

    #[test]
    fn test_risk_bias_bounded() {
        let mut req = request(9, PersonaPack::Security);
        req.task_context.risk_tolerance = RiskTolerance::Low;
        let fp = fingerprint_of("persona-generator", &req).unwrap();
        let set = PersonaGenerator::new().generate(&req, &fp);

        for p in &set.personas {
            let bias = p.risk_bias.unwrap();
            assert!((0.0..=1.0).contains(&bias));
        }
    }

    #[test]
    fn test_pack_default_reputation() {
        let req = request(3, PersonaPack::Compliance);
        let fp = fingerprint_of("persona-generator", &req).unwrap();
        let set = PersonaGenerator::new().generate(&req, &fp);
        assert!(set.personas.iter().all(|p| p.reputation == 0.55));
    }
}
