//! Deployment guard.

use crate::consensus::flags::{FlagDerivation, FlagVocabulary, PolicyFlags};
use crate::consensus::guards::{cautious_reviewer_objects, is_blank, Environment, GuardFamily};
use crate::consensus::voting::ResolvedVotes;
use crate::core::Result;
use crate::persona::PersonaSet;
use crate::schema::RequestKind;
use serde::{Deserialize, Serialize};

pub const MISSING_CHANGE_TICKET: &str = "MISSING_CHANGE_TICKET";
pub const TESTS_FAILING: &str = "TESTS_FAILING";
pub const DEPLOY_DURING_FREEZE: &str = "DEPLOY_DURING_FREEZE";
pub const IRREVERSIBLE_MIGRATION_NO_BACKUP: &str = "IRREVERSIBLE_MIGRATION_NO_BACKUP";
pub const SAFETY_REVIEWER_VETO: &str = "SAFETY_REVIEWER_VETO";
pub const MISSING_ROLLBACK_PLAN: &str = "MISSING_ROLLBACK_PLAN";
pub const PROD_WITHOUT_CANARY: &str = "PROD_WITHOUT_CANARY";
pub const TESTS_NOT_REPORTED: &str = "TESTS_NOT_REPORTED";
pub const PROD_REQUIRES_HUMAN_CONFIRM: &str = "PROD_REQUIRES_HUMAN_CONFIRM";

/// Schema migration shipped with a deployment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    pub irreversible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_ref: Option<String>,
}

/// A proposed deployment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeploymentProposal {
    pub request_id: String,
    pub service: String,
    pub version: String,
    pub environment: Environment,
    pub requested_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_ticket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_plan: Option<String>,
    /// Absent means the pipeline did not report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<bool>,
    #[serde(default)]
    pub during_freeze_window: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<Migration>,
}

/// Effective constraints for a deployment request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConstraints {
    pub require_change_ticket_in_prod: bool,
    pub require_passing_tests: bool,
    pub block_during_freeze: bool,
    pub require_backup_for_irreversible_migration: bool,
    pub require_rollback_plan: bool,
    pub prod_requires_canary: bool,
    pub production_requires_human_confirm: bool,
}

impl Default for DeploymentConstraints {
    fn default() -> Self {
        Self {
            require_change_ticket_in_prod: true,
            require_passing_tests: true,
            block_during_freeze: true,
            require_backup_for_irreversible_migration: true,
            require_rollback_plan: true,
            prod_requires_canary: true,
            production_requires_human_confirm: false,
        }
    }
}

/// Deployment guard.
#[derive(Clone, Debug)]
pub struct DeploymentGuard {
    constraints: DeploymentConstraints,
    vocabulary: FlagVocabulary,
}

impl DeploymentGuard {
    pub fn new(constraints: DeploymentConstraints) -> Self {
        let vocabulary = FlagVocabulary::new("deployment-guard")
            .with_hard(MISSING_CHANGE_TICKET)
            .with_hard(TESTS_FAILING)
            .with_hard(DEPLOY_DURING_FREEZE)
            .with_hard(IRREVERSIBLE_MIGRATION_NO_BACKUP)
            .with_hard(SAFETY_REVIEWER_VETO)
            .with_rewrite(MISSING_ROLLBACK_PLAN)
            .with_rewrite(PROD_WITHOUT_CANARY)
            .with_rewrite(TESTS_NOT_REPORTED)
            .with_rewrite(PROD_REQUIRES_HUMAN_CONFIRM);
        Self {
            constraints,
            vocabulary,
        }
    }

    fn hard_tags(&self, p: &DeploymentProposal) -> Vec<&'static str> {
        let c = &self.constraints;
        let prod = p.environment == Environment::Prod;
        let mut tags = Vec::new();

        if c.require_change_ticket_in_prod && prod && is_blank(&p.change_ticket) {
            tags.push(MISSING_CHANGE_TICKET);
        }
        if c.require_passing_tests && p.tests_passed == Some(false) {
            tags.push(TESTS_FAILING);
        }
        if c.block_during_freeze && p.during_freeze_window {
            tags.push(DEPLOY_DURING_FREEZE);
        }
        if let Some(migration) = &p.migration {
            if c.require_backup_for_irreversible_migration
                && migration.irreversible
                && is_blank(&migration.backup_ref)
            {
                tags.push(IRREVERSIBLE_MIGRATION_NO_BACKUP);
            }
        }

        tags
    }

    fn rewrite_tags(&self, p: &DeploymentProposal) -> Vec<&'static str> {
        let c = &self.constraints;
        let prod = p.environment == Environment::Prod;
        let mut tags = Vec::new();

        // dev deployments are disposable
        if c.require_rollback_plan && p.environment != Environment::Dev && is_blank(&p.rollback_plan) {
            tags.push(MISSING_ROLLBACK_PLAN);
        }
        if c.prod_requires_canary && prod && p.canary != Some(true) {
            tags.push(PROD_WITHOUT_CANARY);
        }
        if c.require_passing_tests && p.tests_passed.is_none() {
            tags.push(TESTS_NOT_REPORTED);
        }
        if c.production_requires_human_confirm && prod {
            tags.push(PROD_REQUIRES_HUMAN_CONFIRM);
        }

        tags
    }
}

impl Default for DeploymentGuard {
    fn default() -> Self {
        Self::new(DeploymentConstraints::default())
    }
}

impl FlagDerivation for DeploymentGuard {
    type Proposal = DeploymentProposal;

    fn guard_name(&self) -> &'static str {
        "deployment-guard"
    }

    fn vocabulary(&self) -> &FlagVocabulary {
        &self.vocabulary
    }

    fn derive_flags(
        &self,
        proposal: &DeploymentProposal,
        votes: &ResolvedVotes,
        _personas: &PersonaSet,
    ) -> Result<PolicyFlags> {
        let mut tags = self.hard_tags(proposal);
        if tags.is_empty() {
            tags = self.rewrite_tags(proposal);
        }
        // vote-derived, so it never suppresses rewrite tags
        if proposal.environment == Environment::Prod && cautious_reviewer_objects(votes) {
            tags.push(SAFETY_REVIEWER_VETO);
        }
        self.vocabulary.classify(tags)
    }
}

impl GuardFamily for DeploymentGuard {
    const KIND: RequestKind = RequestKind::DeploymentGuard;
    const PROPOSAL_FIELD: &'static str = "proposed_deployment";
    const ACTION: &'static str = "deployment";

    type Constraints = DeploymentConstraints;

    fn with_constraints(constraints: DeploymentConstraints) -> Self {
        Self::new(constraints)
    }

    fn constraints(&self) -> &DeploymentConstraints {
        &self.constraints
    }
}
