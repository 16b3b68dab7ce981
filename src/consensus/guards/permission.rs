//! Permission escalation guard.
//!
//! Evaluates requests to grant, widen or assume permissions:
//! - Wildcard grants and owner-level jumps
//! - Separation-of-duties conflicts
//! - Ticket, justification and expiry hygiene
//! - Break-glass without an incident

use crate::consensus::flags::{FlagDerivation, FlagVocabulary, PolicyFlags};
use crate::consensus::guards::{cautious_reviewer_objects, is_blank, Environment, GuardFamily};
use crate::consensus::voting::ResolvedVotes;
use crate::core::Result;
use crate::persona::PersonaSet;
use crate::schema::RequestKind;
use serde::{Deserialize, Serialize};

pub const WILDCARD_PERMISSION: &str = "WILDCARD_PERMISSION";
pub const MISSING_TICKET: &str = "MISSING_TICKET";
pub const MISSING_JUSTIFICATION: &str = "MISSING_JUSTIFICATION";
pub const TEMP_NO_EXPIRY: &str = "TEMP_NO_EXPIRY";
pub const BREAK_GLASS_NO_INCIDENT: &str = "BREAK_GLASS_NO_INCIDENT";
pub const SOD_CONFLICT: &str = "SOD_CONFLICT";
pub const FORBIDDEN_ROLE_JUMP: &str = "FORBIDDEN_ROLE_JUMP";
pub const SECURITY_REVIEWER_VETO: &str = "SECURITY_REVIEWER_VETO";
pub const JUSTIFICATION_TOO_WEAK: &str = "JUSTIFICATION_TOO_WEAK";
pub const TEMP_DURATION_TOO_LONG: &str = "TEMP_DURATION_TOO_LONG";
pub const PROD_REQUIRES_HUMAN_CONFIRM: &str = "PROD_REQUIRES_HUMAN_CONFIRM";

/// Justifications that carry no information.
const WEAK_JUSTIFICATIONS: &[&str] = &["need it asap", "please approve", "urgent access", "need access"];

/// Minimum justification length.
const MIN_JUSTIFICATION_LEN: usize = 8;

/// Permission pairs no single subject may hold together.
const SOD_PAIRS: &[(&str, &str)] = &[("payments:create", "payments:approve")];

/// Who is asking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    User,
    ServiceAccount,
    Role,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(rename = "type")]
    pub subject_type: SubjectType,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub system: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Grant,
    ExpandScope,
    AssumeRole,
}

/// The permission change itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PermissionChange {
    pub kind: ChangeKind,
    #[serde(default)]
    pub current_permissions: Vec<String>,
    pub requested_permissions: Vec<String>,
    pub temporary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u64>,
    #[serde(default)]
    pub break_glass: bool,
}

/// A proposed permission escalation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscalationProposal {
    pub request_id: String,
    pub environment: Environment,
    pub requested_at: String,
    pub justification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_ref: Option<String>,
    pub subject: Subject,
    pub resource: Resource,
    pub change: PermissionChange,
}

impl EscalationProposal {
    fn all_permissions(&self) -> impl Iterator<Item = &str> {
        self.change
            .current_permissions
            .iter()
            .chain(self.change.requested_permissions.iter())
            .map(String::as_str)
    }
}

/// Effective constraints for an escalation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConstraints {
    pub require_ticket: bool,
    pub require_justification: bool,
    pub require_expiry_for_temporary: bool,
    pub max_temporary_duration_minutes: u64,
    pub block_wildcard_permissions: bool,
    pub production_requires_human_confirm: bool,
    pub forbid_break_glass_without_incident: bool,
}

impl Default for EscalationConstraints {
    fn default() -> Self {
        Self {
            require_ticket: true,
            require_justification: true,
            require_expiry_for_temporary: true,
            max_temporary_duration_minutes: 240,
            block_wildcard_permissions: true,
            production_requires_human_confirm: true,
            forbid_break_glass_without_incident: true,
        }
    }
}

fn is_wildcard(permission: &str) -> bool {
    let p = permission.trim();
    p == "*" || p.contains(":*") || p.contains(".*")
}

fn is_weak_justification(justification: &str) -> bool {
    let normalized = justification.trim().to_lowercase();
    WEAK_JUSTIFICATIONS.contains(&normalized.as_str())
}

/// Permission escalation guard.
#[derive(Clone, Debug)]
pub struct PermissionEscalationGuard {
    constraints: EscalationConstraints,
    vocabulary: FlagVocabulary,
}

impl PermissionEscalationGuard {
    pub fn new(constraints: EscalationConstraints) -> Self {
        let vocabulary = FlagVocabulary::new("permission-escalation-guard")
            .with_hard(WILDCARD_PERMISSION)
            .with_hard(MISSING_TICKET)
            .with_hard(MISSING_JUSTIFICATION)
            .with_hard(TEMP_NO_EXPIRY)
            .with_hard(BREAK_GLASS_NO_INCIDENT)
            .with_hard(SOD_CONFLICT)
            .with_hard(FORBIDDEN_ROLE_JUMP)
            .with_hard(SECURITY_REVIEWER_VETO)
            .with_rewrite(JUSTIFICATION_TOO_WEAK)
            .with_rewrite(TEMP_DURATION_TOO_LONG)
            .with_rewrite(PROD_REQUIRES_HUMAN_CONFIRM);
        Self {
            constraints,
            vocabulary,
        }
    }

    /// Hard tags raised by the proposal content alone.
    fn hard_tags(&self, p: &EscalationProposal) -> Vec<&'static str> {
        let c = &self.constraints;
        let change = &p.change;
        let mut tags = Vec::new();

        if c.block_wildcard_permissions && change.requested_permissions.iter().any(|r| is_wildcard(r)) {
            tags.push(WILDCARD_PERMISSION);
        }
        if c.require_ticket && is_blank(&p.ticket_ref) {
            tags.push(MISSING_TICKET);
        }
        if c.require_justification && p.justification.trim().len() < MIN_JUSTIFICATION_LEN {
            tags.push(MISSING_JUSTIFICATION);
        }
        if c.require_expiry_for_temporary
            && change.temporary
            && is_blank(&change.expires_at)
            && change.duration_minutes.is_none()
        {
            tags.push(TEMP_NO_EXPIRY);
        }
        if c.forbid_break_glass_without_incident && change.break_glass && is_blank(&p.incident_ref) {
            tags.push(BREAK_GLASS_NO_INCIDENT);
        }
        let sod = SOD_PAIRS.iter().any(|(a, b)| {
            p.all_permissions().any(|x| x.contains(a)) && p.all_permissions().any(|x| x.contains(b))
        });
        if sod {
            tags.push(SOD_CONFLICT);
        }
        let had_owner = change.current_permissions.iter().any(|x| x.contains("owner"));
        let wants_owner = change.requested_permissions.iter().any(|x| x.contains("owner"));
        if wants_owner && !had_owner {
            tags.push(FORBIDDEN_ROLE_JUMP);
        }

        tags
    }

    fn rewrite_tags(&self, p: &EscalationProposal) -> Vec<&'static str> {
        let c = &self.constraints;
        let mut tags = Vec::new();

        if is_weak_justification(&p.justification) {
            tags.push(JUSTIFICATION_TOO_WEAK);
        }
        if p.change.temporary
            && p.change
                .duration_minutes
                .map(|d| d > c.max_temporary_duration_minutes)
                .unwrap_or(false)
        {
            tags.push(TEMP_DURATION_TOO_LONG);
        }
        if p.environment == Environment::Prod && c.production_requires_human_confirm {
            tags.push(PROD_REQUIRES_HUMAN_CONFIRM);
        }

        tags
    }
}

impl Default for PermissionEscalationGuard {
    fn default() -> Self {
        Self::new(EscalationConstraints::default())
    }
}

impl FlagDerivation for PermissionEscalationGuard {
    type Proposal = EscalationProposal;

    fn guard_name(&self) -> &'static str {
        "permission-escalation-guard"
    }

    fn vocabulary(&self) -> &FlagVocabulary {
        &self.vocabulary
    }

    fn derive_flags(
        &self,
        proposal: &EscalationProposal,
        votes: &ResolvedVotes,
        _personas: &PersonaSet,
    ) -> Result<PolicyFlags> {
        let mut tags = self.hard_tags(proposal);
        if tags.is_empty() {
            tags = self.rewrite_tags(proposal);
        }
        if proposal.environment == Environment::Prod && cautious_reviewer_objects(votes) {
            tags.push(SECURITY_REVIEWER_VETO);
        }
        self.vocabulary.classify(tags)
    }
}

impl GuardFamily for PermissionEscalationGuard {
    const KIND: RequestKind = RequestKind::PermissionEscalationGuard;
    const PROPOSAL_FIELD: &'static str = "proposed_escalation";
    const ACTION: &'static str = "permission escalation";

    type Constraints = EscalationConstraints;

    fn with_constraints(constraints: EscalationConstraints) -> Self {
        Self::new(constraints)
    }

    fn constraints(&self) -> &EscalationConstraints {
        &self.constraints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::voting::{VoteBatch, Vote, VoteType};
    use crate::persona::Persona;
    use serde_json::json;

    fn proposal() -> EscalationProposal {
        serde_json::from_value(json!({
            "request_id": "req-1",
            "environment": "staging",
            "requested_at": "2026-03-01T10:00:00Z",
            "justification": "Rotate billing credentials after audit",
            "ticket_ref": "SEC-42",
            "subject": {"type": "user", "id": "u-1"},
            "resource": {"system": "billing", "resource_id": "db-1"},
            "change": {
                "kind": "grant",
                "current_permissions": ["billing:read"],
                "requested_permissions": ["billing:write"],
                "temporary": true,
                "duration_minutes": 60
            }
        }))
        .unwrap()
    }

    fn panel() -> PersonaSet {
        PersonaSet::new(
            "ps",
            "b",
            vec![
                Persona::new("sec", 0.6).with_risk_bias(0.9),
                Persona::new("eng", 0.5).with_risk_bias(0.3),
            ],
        )
    }

    fn derive(p: &EscalationProposal, votes: Vec<Vote>) -> PolicyFlags {
        let personas = panel();
        let resolved = VoteBatch::new(votes).resolve(&personas, true);
        PermissionEscalationGuard::default()
            .derive_flags(p, &resolved, &personas)
            .unwrap()
    }

    #[test]
    fn test_clean_proposal() {
        assert!(derive(&proposal(), vec![]).is_clean());
    }

    #[test]
    fn test_wildcard_blocks() {
        let mut p = proposal();
        p.change.requested_permissions = vec!["billing:*".into()];
        assert!(derive(&p, vec![]).hard_flags.contains(WILDCARD_PERMISSION));

        p.change.requested_permissions = vec!["*".into()];
        assert!(derive(&p, vec![]).hard_flags.contains(WILDCARD_PERMISSION));
    }

    #[test]
    fn test_wildcard_allowed_when_unconstrained() {
        let mut p = proposal();
        p.change.requested_permissions = vec!["billing:*".into()];
        let guard = PermissionEscalationGuard::new(EscalationConstraints {
            block_wildcard_permissions: false,
            ..Default::default()
        });
        let flags = guard
            .derive_flags(&p, &ResolvedVotes::default(), &panel())
            .unwrap();
        assert!(!flags.hard_flags.contains(WILDCARD_PERMISSION));
    }

    #[test]
    fn test_missing_ticket() {
        let mut p = proposal();
        p.ticket_ref = Some("   ".into());
        assert!(derive(&p, vec![]).hard_flags.contains(MISSING_TICKET));
    }

    #[test]
    fn test_temporary_without_expiry() {
        let mut p = proposal();
        p.change.duration_minutes = None;
        assert!(derive(&p, vec![]).hard_flags.contains(TEMP_NO_EXPIRY));

        p.change.expires_at = Some("2026-03-01T12:00:00Z".into());
        assert!(!derive(&p, vec![]).hard_flags.contains(TEMP_NO_EXPIRY));
    }

    #[test]
    fn test_break_glass_needs_incident() {
        let mut p = proposal();
        p.change.break_glass = true;
        assert!(derive(&p, vec![]).hard_flags.contains(BREAK_GLASS_NO_INCIDENT));

        p.incident_ref = Some("INC-7".into());
        assert!(derive(&p, vec![]).is_clean());
    }

    #[test]
    fn test_sod_conflict_across_current_and_requested() {
        let mut p = proposal();
        p.change.current_permissions = vec!["payments:create".into()];
        p.change.requested_permissions = vec!["payments:approve".into()];
        assert!(derive(&p, vec![]).hard_flags.contains(SOD_CONFLICT));
    }

    #[test]
    fn test_owner_jump() {
        let mut p = proposal();
        p.change.requested_permissions = vec!["billing:owner".into()];
        assert!(derive(&p, vec![]).hard_flags.contains(FORBIDDEN_ROLE_JUMP));

        p.change.current_permissions = vec!["billing:owner".into()];
        assert!(!derive(&p, vec![]).hard_flags.contains(FORBIDDEN_ROLE_JUMP));
    }

    #[test]
    fn test_rewrite_flags() {
        let mut p = proposal();
        p.justification = "Need access".into();
        p.change.duration_minutes = Some(600);
        let flags = derive(&p, vec![]);
        assert!(!flags.has_hard());
        assert!(flags.rewrite_flags.contains(JUSTIFICATION_TOO_WEAK));
        assert!(flags.rewrite_flags.contains(TEMP_DURATION_TOO_LONG));
    }

    #[test]
    fn test_prod_requires_confirm() {
        let mut p = proposal();
        p.environment = Environment::Prod;
        assert!(derive(&p, vec![]).rewrite_flags.contains(PROD_REQUIRES_HUMAN_CONFIRM));
    }

    #[test]
    fn test_rewrite_suppressed_by_hard() {
        let mut p = proposal();
        p.environment = Environment::Prod;
        p.ticket_ref = None;
        let flags = derive(&p, vec![Vote::new("sec", VoteType::No, 0.9)]);
        assert!(flags.hard_flags.contains(MISSING_TICKET));
        assert!(flags.hard_flags.contains(SECURITY_REVIEWER_VETO));
        assert!(flags.rewrite_flags.is_empty());
    }

    #[test]
    fn test_security_reviewer_veto_in_prod() {
        let mut p = proposal();
        p.environment = Environment::Prod;
        let flags = derive(&p, vec![Vote::new("sec", VoteType::No, 0.9)]);
        assert!(flags.hard_flags.contains(SECURITY_REVIEWER_VETO));
        assert!(flags.rewrite_flags.contains(PROD_REQUIRES_HUMAN_CONFIRM));

        let flags = derive(&p, vec![Vote::new("eng", VoteType::No, 0.9)]);
        assert!(!flags.has_hard());

        p.environment = Environment::Staging;
        let flags = derive(&p, vec![Vote::new("sec", VoteType::No, 0.9)]);
        assert!(flags.is_clean());
    }

    #[test]
    fn test_constraints_defaults_from_partial_json() {
        let c: EscalationConstraints =
            serde_json::from_value(json!({"max_temporary_duration_minutes": 30})).unwrap();
        assert_eq!(c.max_temporary_duration_minutes, 30);
        assert!(c.require_ticket);
    }
}
