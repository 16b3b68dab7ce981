//! Field sets for each request kind.

use crate::core::{Error, ErrorCode, Result};
use crate::schema::validator::{FieldType, ObjectRules};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Kind of request accepted by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    DeploymentGuard,
    PermissionEscalationGuard,
    PersonaGenerator,
    PersonaEngine,
}

impl RequestKind {
    pub const ALL: [RequestKind; 4] = [
        RequestKind::DeploymentGuard,
        RequestKind::PermissionEscalationGuard,
        RequestKind::PersonaGenerator,
        RequestKind::PersonaEngine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::DeploymentGuard => "deployment-guard",
            RequestKind::PermissionEscalationGuard => "permission-escalation-guard",
            RequestKind::PersonaGenerator => "persona-generator",
            RequestKind::PersonaEngine => "persona-engine",
        }
    }

    /// Code reported for internal failures of this request kind.
    pub fn failure_code(&self) -> ErrorCode {
        match self {
            RequestKind::DeploymentGuard => ErrorCode::DeploymentGuardFailed,
            RequestKind::PermissionEscalationGuard => ErrorCode::PermissionEscalationGuardFailed,
            RequestKind::PersonaGenerator => ErrorCode::PersonaGeneratorFailed,
            RequestKind::PersonaEngine => ErrorCode::PersonaEngineFailed,
        }
    }

    /// Top-level rules for this request kind.
    pub fn rules(&self) -> ObjectRules {
        match self {
            RequestKind::DeploymentGuard => deployment_guard_rules(),
            RequestKind::PermissionEscalationGuard => permission_escalation_rules(),
            RequestKind::PersonaGenerator => persona_generator_rules(),
            RequestKind::PersonaEngine => persona_engine_rules(),
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RequestKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown request kind: {}", s))
    }
}

pub const ENVIRONMENTS: &[&str] = &["dev", "staging", "prod"];
pub const MODES: &[&str] = &["persona", "external_agent"];
pub const VOTES: &[&str] = &["YES", "NO", "REWRITE"];
pub const DECISIONS: &[&str] = &["ALLOW", "BLOCK", "REQUIRE_REWRITE"];
pub const PERSONA_PACKS: &[&str] = &["general", "founder", "security", "compliance", "engineering"];
pub const RISK_TOLERANCES: &[&str] = &["low", "medium", "high"];

pub const MIN_PERSONAS: i64 = 3;
pub const MAX_PERSONAS: i64 = 9;

fn unit() -> FieldType {
    FieldType::Number { min: 0.0, max: 1.0 }
}

fn any_number() -> FieldType {
    FieldType::Number {
        min: f64::MIN,
        max: f64::MAX,
    }
}

fn vote_rules() -> ObjectRules {
    ObjectRules::new("vote")
        .required("persona_id", FieldType::NonEmptyString(1))
        .required("vote", FieldType::OneOf(VOTES))
        .required("confidence", unit())
        .optional("name", FieldType::String)
        .optional("reputation_before", unit())
        .optional("reasons", FieldType::StringArray { min_items: 0 })
        .optional("red_flags", FieldType::StringArray { min_items: 0 })
        .optional("suggested_edits", FieldType::StringArray { min_items: 0 })
        .strict()
}

fn vote_batch_rules() -> ObjectRules {
    ObjectRules::new("vote_batch")
        .required(
            "votes",
            FieldType::ObjectArray {
                rules: vote_rules(),
                min_items: 0,
            },
        )
        .strict()
}

fn persona_rules() -> ObjectRules {
    ObjectRules::new("persona")
        .required("persona_id", FieldType::NonEmptyString(1))
        .required("reputation", unit())
        .optional("name", FieldType::String)
        .optional("role", FieldType::String)
        .optional("risk_bias", unit())
}

fn persona_set_rules() -> ObjectRules {
    ObjectRules::new("persona_set")
        .optional("persona_set_id", FieldType::NonEmptyString(1))
        .required(
            "personas",
            FieldType::ObjectArray {
                rules: persona_rules(),
                min_items: 1,
            },
        )
}

fn ruleset_rules() -> ObjectRules {
    ObjectRules::new("ruleset")
        .optional("reward_aligned", any_number())
        .optional("penalize_misaligned", any_number())
        .optional("high_confidence_penalty_boost", any_number())
        .optional("high_confidence_threshold", any_number())
        .optional("min_rep", any_number())
        .optional("max_rep", any_number())
        .optional("rewardAligned", any_number())
        .optional("penalizeMisaligned", any_number())
        .optional("highConfidencePenaltyBoost", any_number())
        .optional("highConfidenceThreshold", any_number())
        .optional("minRep", any_number())
        .optional("maxRep", any_number())
        .optional("confidence_weighting", FieldType::Bool)
        .optional("veto_min_reputation", any_number())
        .optional("veto_min_confidence", any_number())
        .optional("objection_min_confidence", any_number())
        .optional("approve_threshold", any_number())
        .strict()
}

fn task_context_rules() -> ObjectRules {
    ObjectRules::new("task_context")
        .required("goal", FieldType::NonEmptyString(1))
        .optional("audience", FieldType::String)
        .optional("risk_tolerance", FieldType::OneOf(RISK_TOLERANCES))
        .optional("constraints", FieldType::StringArray { min_items: 0 })
        .optional("domain", FieldType::String)
        .strict()
}

fn guard_skeleton(proposal_field: &'static str, proposal: ObjectRules, constraints: ObjectRules) -> ObjectRules {
    ObjectRules::new("")
        .required("board_id", FieldType::NonEmptyString(1))
        .required(proposal_field, FieldType::Object(proposal))
        .required("vote_batch", FieldType::Object(vote_batch_rules()))
        .optional("constraints", FieldType::Object(constraints))
        .optional("persona_set", FieldType::Object(persona_set_rules()))
        .optional("persona_set_id", FieldType::NonEmptyString(1))
        .optional("ruleset", FieldType::Object(ruleset_rules()))
        .optional("mode", FieldType::OneOf(MODES))
        .strict()
}

/// Rules for `permission-escalation-guard`.
pub fn permission_escalation_rules() -> ObjectRules {
    let subject = ObjectRules::new("subject")
        .required("type", FieldType::OneOf(&["user", "service_account", "role"]))
        .required("id", FieldType::NonEmptyString(1))
        .optional("team", FieldType::String)
        .optional("manager_id", FieldType::String)
        .strict();
    let resource = ObjectRules::new("resource")
        .required("system", FieldType::NonEmptyString(1))
        .required("resource_id", FieldType::NonEmptyString(1))
        .optional("tenant_id", FieldType::String)
        .strict();
    let change = ObjectRules::new("change")
        .required("kind", FieldType::OneOf(&["grant", "expand_scope", "assume_role"]))
        .optional("current_permissions", FieldType::StringArray { min_items: 0 })
        .required("requested_permissions", FieldType::StringArray { min_items: 1 })
        .required("temporary", FieldType::Bool)
        .optional("expires_at", FieldType::Timestamp)
        .optional(
            "duration_minutes",
            FieldType::Integer {
                min: 1,
                max: i64::MAX,
            },
        )
        .optional("break_glass", FieldType::Bool)
        .strict();
    let escalation = ObjectRules::new("proposed_escalation")
        .required("request_id", FieldType::NonEmptyString(1))
        .required("environment", FieldType::OneOf(ENVIRONMENTS))
        .required("requested_at", FieldType::Timestamp)
        .required("justification", FieldType::NonEmptyString(8))
        .optional("ticket_ref", FieldType::String)
        .optional("incident_ref", FieldType::String)
        .required("subject", FieldType::Object(subject))
        .required("resource", FieldType::Object(resource))
        .required("change", FieldType::Object(change))
        .strict();
    let constraints = ObjectRules::new("constraints")
        .optional("require_ticket", FieldType::Bool)
        .optional("require_justification", FieldType::Bool)
        .optional("require_expiry_for_temporary", FieldType::Bool)
        .optional(
            "max_temporary_duration_minutes",
            FieldType::Integer {
                min: 1,
                max: i64::MAX,
            },
        )
        .optional("block_wildcard_permissions", FieldType::Bool)
        .optional("production_requires_human_confirm", FieldType::Bool)
        .optional("forbid_break_glass_without_incident", FieldType::Bool)
        .strict();

    guard_skeleton("proposed_escalation", escalation, constraints)
}

/// Rules for `deployment-guard`.
pub fn deployment_guard_rules() -> ObjectRules {
    let migration = ObjectRules::new("migration")
        .required("irreversible", FieldType::Bool)
        .optional("backup_ref", FieldType::String)
        .strict();
    let deployment = ObjectRules::new("proposed_deployment")
        .required("request_id", FieldType::NonEmptyString(1))
        .required("service", FieldType::NonEmptyString(1))
        .required("version", FieldType::NonEmptyString(1))
        .required("environment", FieldType::OneOf(ENVIRONMENTS))
        .required("requested_at", FieldType::Timestamp)
        .optional("change_ticket", FieldType::String)
        .optional("rollback_plan", FieldType::String)
        .optional("tests_passed", FieldType::Bool)
        .optional("canary", FieldType::Bool)
        .optional("during_freeze_window", FieldType::Bool)
        .optional("migration", FieldType::Object(migration))
        .strict();
    let constraints = ObjectRules::new("constraints")
        .optional("require_change_ticket_in_prod", FieldType::Bool)
        .optional("require_passing_tests", FieldType::Bool)
        .optional("block_during_freeze", FieldType::Bool)
        .optional("require_backup_for_irreversible_migration", FieldType::Bool)
        .optional("require_rollback_plan", FieldType::Bool)
        .optional("prod_requires_canary", FieldType::Bool)
        .optional("production_requires_human_confirm", FieldType::Bool)
        .strict();

    guard_skeleton("proposed_deployment", deployment, constraints)
}

/// Rules for `persona-generator`.
pub fn persona_generator_rules() -> ObjectRules {
    ObjectRules::new("")
        .required("board_id", FieldType::NonEmptyString(1))
        .required("task_context", FieldType::Object(task_context_rules()))
        .optional(
            "n_personas",
            FieldType::Integer {
                min: MIN_PERSONAS,
                max: MAX_PERSONAS,
            },
        )
        .optional("persona_pack", FieldType::OneOf(PERSONA_PACKS))
        .strict()
}

/// Rules for `persona-engine`.
pub fn persona_engine_rules() -> ObjectRules {
    let decision = ObjectRules::new("decision")
        .optional("decision_id", FieldType::NonEmptyString(1))
        .required("final_decision", FieldType::OneOf(DECISIONS))
        .strict();

    ObjectRules::new("")
        .required("board_id", FieldType::NonEmptyString(1))
        .required("decision", FieldType::Object(decision))
        .required("vote_batch", FieldType::Object(vote_batch_rules()))
        .optional("persona_set", FieldType::Object(persona_set_rules()))
        .optional("persona_set_id", FieldType::NonEmptyString(1))
        .optional("ruleset", FieldType::Object(ruleset_rules()))
        .strict()
}

/// Validate a full request of `kind`, including cross-field rules.
pub fn validate_request(kind: RequestKind, input: &Value) -> Result<()> {
    kind.rules().validate(input)?;

    if let Some(personas) = input.pointer("/persona_set/personas").and_then(Value::as_array) {
        let mut seen = HashSet::new();
        for persona in personas {
            if let Some(id) = persona.get("persona_id").and_then(Value::as_str) {
                if !seen.insert(id) {
                    return Err(Error::invalid(
                        "persona_set.personas[].persona_id",
                        format!("persona_set.personas[].persona_id must be unique (duplicate: {})", id),
                    ));
                }
            }
        }
    }

    match kind {
        RequestKind::DeploymentGuard | RequestKind::PermissionEscalationGuard => {
            let external = input.get("mode").and_then(Value::as_str) == Some("external_agent");
            let has_votes = input
                .pointer("/vote_batch/votes")
                .and_then(Value::as_array)
                .map(|v| !v.is_empty())
                .unwrap_or(false);
            if external && !has_votes {
                return Err(Error::invalid(
                    "vote_batch.votes",
                    "vote_batch.votes must not be empty when mode=external_agent",
                ));
            }
        }
        RequestKind::PersonaEngine => {
            if input.get("persona_set").is_none() && input.get("persona_set_id").is_none() {
                return Err(Error::invalid(
                    "persona_set",
                    "persona_set or persona_set_id is required",
                ));
            }
        }
        RequestKind::PersonaGenerator => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn escalation_request() -> Value {
        json!({
            "board_id": "board-1",
            "proposed_escalation": {
                "request_id": "req-1",
                "environment": "staging",
                "requested_at": "2026-03-01T10:00:00Z",
                "justification": "Rotate billing credentials for incident follow-up",
                "ticket_ref": "SEC-42",
                "subject": {"type": "user", "id": "u-1"},
                "resource": {"system": "billing", "resource_id": "db-1"},
                "change": {
                    "kind": "grant",
                    "requested_permissions": ["billing:read"],
                    "temporary": false
                }
            },
            "vote_batch": {"votes": [{"persona_id": "p1", "vote": "YES", "confidence": 0.8}]}
        })
    }

    #[test]
    fn test_request_kind_roundtrip_names() {
        for kind in RequestKind::ALL {
            assert_eq!(kind.as_str().parse::<RequestKind>().unwrap(), kind);
        }
        assert!("nope".parse::<RequestKind>().is_err());
    }

    #[test]
    fn test_valid_escalation_passes() {
        assert!(validate_request(RequestKind::PermissionEscalationGuard, &escalation_request()).is_ok());
    }

    #[test]
    fn test_missing_board_id() {
        let mut req = escalation_request();
        req.as_object_mut().unwrap().remove("board_id");
        let err = validate_request(RequestKind::PermissionEscalationGuard, &req).unwrap_err();
        assert_eq!(err.to_string(), "board_id is required");
    }

    #[test]
    fn test_short_justification() {
        let mut req = escalation_request();
        req["proposed_escalation"]["justification"] = json!("asap");
        let err = validate_request(RequestKind::PermissionEscalationGuard, &req).unwrap_err();
        assert!(err.to_string().contains("proposed_escalation.justification"));
    }

    #[test]
    fn test_external_mode_requires_votes() {
        let mut req = escalation_request();
        req["mode"] = json!("external_agent");
        req["vote_batch"] = json!({"votes": []});
        let err = validate_request(RequestKind::PermissionEscalationGuard, &req).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_duplicate_persona_ids_rejected() {
        let mut req = escalation_request();
        req["persona_set"] = json!({"personas": [
            {"persona_id": "p1", "reputation": 0.5},
            {"persona_id": "p1", "reputation": 0.6}
        ]});
        let err = validate_request(RequestKind::PermissionEscalationGuard, &req).unwrap_err();
        assert!(err.to_string().contains("duplicate: p1"));
    }

    #[test]
    fn test_generator_rejects_unknown_top_level() {
        let req = json!({
            "board_id": "b",
            "task_context": {"goal": "launch"},
            "n_personas": 4,
            "persona_pack": "founder",
            "temperature": 0.3
        });
        let err = validate_request(RequestKind::PersonaGenerator, &req).unwrap_err();
        assert!(err.to_string().contains("unknown field: temperature"));
    }

    #[test]
    fn test_generator_bounds_and_pack() {
        let base = json!({"board_id": "b", "task_context": {"goal": "launch"}});
        let mut too_many = base.clone();
        too_many["n_personas"] = json!(40);
        assert!(validate_request(RequestKind::PersonaGenerator, &too_many).is_err());

        let mut bad_pack = base.clone();
        bad_pack["persona_pack"] = json!("pirates");
        assert!(validate_request(RequestKind::PersonaGenerator, &bad_pack).is_err());

        assert!(validate_request(RequestKind::PersonaGenerator, &base).is_ok());
    }

    #[test]
    fn test_persona_engine_needs_a_persona_source() {
        let req = json!({
            "board_id": "b",
            "decision": {"final_decision": "BLOCK"},
            "vote_batch": {"votes": []}
        });
        let err = validate_request(RequestKind::PersonaEngine, &req).unwrap_err();
        assert_eq!(err.to_string(), "persona_set or persona_set_id is required");
    }

    #[test]
    fn test_persona_entries_are_permissive() {
        let req = json!({
            "board_id": "b",
            "decision": {"final_decision": "ALLOW"},
            "vote_batch": {"votes": []},
            "persona_set": {"personas": [{"persona_id": "p1", "reputation": 0.5, "mood": "grumpy"}]}
        });
        assert!(validate_request(RequestKind::PersonaEngine, &req).is_ok());
    }

    #[test]
    fn test_ruleset_accepts_both_spellings() {
        let mut req = escalation_request();
        req["ruleset"] = json!({"rewardAligned": 0.05, "max_rep": 0.9});
        assert!(validate_request(RequestKind::PermissionEscalationGuard, &req).is_ok());

        req["ruleset"] = json!({"rewardBonus": 0.05});
        let err = validate_request(RequestKind::PermissionEscalationGuard, &req).unwrap_err();
        assert!(err.to_string().contains("unknown field: rewardBonus"));
    }
}
