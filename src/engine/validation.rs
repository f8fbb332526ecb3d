//! Validation pipeline — rule sequence over one candidate decision
//!
//! Each check implements `ValidationRule` and appends to the shared error
//! and warning lists. Rules are independent: one rule failing never stops
//! the next from running. After the last rule the original confidence is
//! downgraded by the violation counts and the verdict bundle is assembled.

use crate::decision::{ConfidenceLevel, ReuseDecisionType, ReuseScope, ReuseableDecision};
use crate::duplicates::validate_checksum_format;
use crate::model::{ClearingState, Release, User, UserGroup};
use crate::policy::PolicyEngine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const YEAR_DAYS: i64 = 365;
const THREE_YEARS_DAYS: i64 = 1095;

// ─── Rule Context ──────────────────────────────────────────────────

/// Everything a rule may look at; immutable for the whole run
pub struct ValidationContext<'a> {
    pub decision: &'a ReuseableDecision,
    pub target: &'a Release,
    pub user: &'a User,
    pub policy: &'a PolicyEngine,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Findings {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Findings {
    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

// ─── Rule Trait ────────────────────────────────────────────────────

/// A single validation check
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, ctx: &ValidationContext<'_>, findings: &mut Findings);
}

pub struct RequiredFields;

impl ValidationRule for RequiredFields {
    fn name(&self) -> &str {
        "required-fields"
    }

    fn check(&self, ctx: &ValidationContext<'_>, findings: &mut Findings) {
        if ctx.decision.checksum.trim().is_empty() {
            findings.error("Missing required checksum");
        }
        if ctx.decision.decision_type.is_none() {
            findings.error("Missing required decision type");
        }
        if ctx.decision.confidence.is_none() {
            findings.error("Missing confidence level");
        }
    }
}

pub struct ChecksumFormat;

impl ValidationRule for ChecksumFormat {
    fn name(&self) -> &str {
        "checksum-format"
    }

    fn check(&self, ctx: &ValidationContext<'_>, findings: &mut Findings) {
        let checksum = &ctx.decision.checksum;
        if !checksum.trim().is_empty() && validate_checksum_format(checksum).is_none() {
            findings.error(format!("Invalid checksum format: {}", checksum));
        }
    }
}

/// Per-decision-type role checks
pub struct Authorization;

impl ValidationRule for Authorization {
    fn name(&self) -> &str {
        "authorization"
    }

    fn check(&self, ctx: &ValidationContext<'_>, findings: &mut Findings) {
        let group = match ctx.user.group {
            Some(g) => g,
            None => {
                findings.warn("User has no assigned group - limited authorization");
                return;
            }
        };
        let decision_type = match ctx.decision.decision_type {
            Some(t) => t,
            None => return,
        };

        match decision_type {
            ReuseDecisionType::LicenseConclusion => {
                if !group.is_clearing_role() {
                    findings.error("User not authorized to inherit license conclusions");
                }
            }
            ReuseDecisionType::ExportRestriction => {
                if !matches!(group, UserGroup::Admin | UserGroup::ClearingAdmin) {
                    findings.error("User not authorized to inherit export restriction decisions");
                }
            }
            ReuseDecisionType::ComponentLevel => {
                if group == UserGroup::User {
                    findings.warn("Component-level inheritance requires elevated permissions");
                }
            }
            ReuseDecisionType::SimilarFile => {
                if group == UserGroup::User {
                    findings.warn("Similar file inheritance may require review");
                }
            }
            ReuseDecisionType::CopyrightStatement => {
                if !group.is_clearing_role() {
                    findings.warn("Copyright statement inheritance requires clearing permissions");
                }
            }
            ReuseDecisionType::IdenticalFile => {}
        }
    }
}

pub struct OrganizationContext;

impl ValidationRule for OrganizationContext {
    fn name(&self) -> &str {
        "organization"
    }

    fn check(&self, ctx: &ValidationContext<'_>, findings: &mut Findings) {
        if ctx.decision.scope != ReuseScope::OrganizationLevel {
            return;
        }
        let user_org = ctx.policy.organization_for(ctx.user);
        if ctx.decision.organization_id.as_deref() != Some(user_org.as_str()) {
            findings.warn("Cross-organization inheritance - verify policy compliance");
        }
    }
}

/// Age warnings; both fire for decisions past three years
pub struct Temporal;

impl ValidationRule for Temporal {
    fn name(&self) -> &str {
        "temporal"
    }

    fn check(&self, ctx: &ValidationContext<'_>, findings: &mut Findings) {
        let age = match ctx.decision.age_days_at(ctx.now) {
            Some(days) => days,
            None => return,
        };
        let config = ctx.policy.config();
        if age > config.age_warning_days {
            findings.warn(format!(
                "Decision is older than {} - consider verification",
                describe_days(config.age_warning_days)
            ));
        }
        if age > config.decision_expiry_days {
            findings.warn(format!(
                "Decision is older than {} - manual review strongly recommended",
                describe_days(config.decision_expiry_days)
            ));
        }
    }
}

pub struct LicenseCompatibility;

impl ValidationRule for LicenseCompatibility {
    fn name(&self) -> &str {
        "license-compatibility"
    }

    fn check(&self, ctx: &ValidationContext<'_>, findings: &mut Findings) {
        let licenses = &ctx.decision.license_ids;
        if licenses.is_empty() {
            return;
        }
        let conflicts = ctx.policy.conflicts();

        let incompatible = conflicts.find_incompatible(licenses, &ctx.target.main_license_ids);
        if !incompatible.is_empty() {
            findings.error(format!(
                "Incompatible licenses detected: {}",
                join_display(&incompatible)
            ));
        }

        let internal = conflicts.find_internal(licenses);
        if !internal.is_empty() {
            findings.warn(format!("License conflicts detected: {}", join_display(&internal)));
        }
    }
}

pub struct DecisionTypeRules;

impl ValidationRule for DecisionTypeRules {
    fn name(&self) -> &str {
        "decision-type"
    }

    fn check(&self, ctx: &ValidationContext<'_>, findings: &mut Findings) {
        let decision = ctx.decision;
        match decision.decision_type {
            Some(ReuseDecisionType::SimilarFile) => {
                findings.warn("Similar file decision requires manual verification");
            }
            Some(ReuseDecisionType::ComponentLevel) => {
                let same_component = decision.metadata.source_component_id.as_deref()
                    == Some(ctx.target.component_id.as_str());
                if !same_component {
                    findings.error("Component level decision not applicable to different component");
                }
            }
            Some(ReuseDecisionType::LicenseConclusion) => {
                if decision.license_ids.is_empty() {
                    findings.error("License conclusion decision missing license information");
                }
            }
            Some(ReuseDecisionType::CopyrightStatement) => {
                if decision.copyright_statements.is_empty() {
                    findings.error("Copyright decision missing copyright statements");
                }
            }
            Some(ReuseDecisionType::ExportRestriction) => {
                findings.warn("Export restriction decision - verify applicability to target context");
            }
            Some(ReuseDecisionType::IdenticalFile) | None => {}
        }
    }
}

/// Advisory only: some target file should share the donor's file family
pub struct FileTypeCompatibility;

impl ValidationRule for FileTypeCompatibility {
    fn name(&self) -> &str {
        "file-type"
    }

    fn check(&self, ctx: &ValidationContext<'_>, findings: &mut Findings) {
        let filename = match ctx.decision.filename() {
            Some(f) => f,
            None => return,
        };
        let compatible = ctx
            .target
            .attachments
            .iter()
            .any(|a| ctx.policy.file_types_compatible(Some(filename), &a.filename));
        if !compatible {
            findings.warn("No compatible file types found in target release");
        }
    }
}

pub struct ClearingStateCompatibility;

impl ValidationRule for ClearingStateCompatibility {
    fn name(&self) -> &str {
        "clearing-state"
    }

    fn check(&self, ctx: &ValidationContext<'_>, findings: &mut Findings) {
        if let (Some(source), Some(target)) = (ctx.decision.clearing_state, ctx.target.clearing_state) {
            if !clearing_states_compatible(source, target) {
                findings.warn("Clearing state mismatch - review inheritance applicability");
            }
        }
    }
}

pub fn clearing_states_compatible(source: ClearingState, target: ClearingState) -> bool {
    source == target
        || (source == ClearingState::Approved && target != ClearingState::NewClearing)
        || (source == ClearingState::ReportAvailable && target == ClearingState::UnderClearing)
}

// ─── Verdict ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Minimal => "MINIMAL",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        };
        f.write_str(s)
    }
}

/// Pass flags per validation concern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub checksum_validation: bool,
    pub license_validation: bool,
    pub authorization_validation: bool,
    pub temporal_validation: bool,
}

impl ValidationMetrics {
    fn from_findings(findings: &Findings) -> Self {
        let no_error_mentions = |keyword: &str| {
            !findings
                .errors
                .iter()
                .any(|e| e.to_lowercase().contains(keyword))
        };
        Self {
            checksum_validation: no_error_mentions("checksum"),
            license_validation: no_error_mentions("license"),
            authorization_validation: no_error_mentions("authoriz"),
            temporal_validation: !findings.warnings.iter().any(|w| w.contains("old")),
        }
    }
}

/// Verdict for one candidate against one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub confidence: ConfidenceLevel,
    pub confidence_score: u32,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub recommendation: String,
    pub risk_level: RiskLevel,
    pub metrics: ValidationMetrics,
    pub validated_by: Option<String>,
    pub validated_at: DateTime<Utc>,
    pub requires_manual_review: bool,
    pub can_auto_apply: bool,
}

impl ValidationOutcome {
    fn from_findings(
        original: Option<ConfidenceLevel>,
        findings: Findings,
        user: &User,
        now: DateTime<Utc>,
    ) -> Self {
        let errors = findings.errors.len();
        let warnings = findings.warnings.len();
        let confidence = adjust_confidence(original.unwrap_or(ConfidenceLevel::Low), warnings, errors);

        let recommendation = if errors > 0 {
            "Manual review required - validation errors must be resolved".to_string()
        } else if warnings > 0 {
            format!("{} (Note: {} warnings)", confidence.recommendation(), warnings)
        } else {
            confidence.recommendation().to_string()
        };

        Self {
            valid: errors == 0,
            confidence,
            confidence_score: confidence.score(),
            recommendation,
            risk_level: risk_level(confidence, warnings, errors),
            metrics: ValidationMetrics::from_findings(&findings),
            validated_by: user.email.clone(),
            validated_at: now,
            requires_manual_review: confidence == ConfidenceLevel::Low || errors > 0,
            can_auto_apply: confidence == ConfidenceLevel::High && errors == 0 && warnings <= 1,
            warnings: findings.warnings,
            errors: findings.errors,
        }
    }
}

/// Downgrade confidence by violation counts. Never raises it.
pub fn adjust_confidence(original: ConfidenceLevel, warnings: usize, errors: usize) -> ConfidenceLevel {
    if errors > 0 {
        return ConfidenceLevel::Low;
    }
    if warnings > 2 {
        return if original == ConfidenceLevel::High {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };
    }
    if warnings > 0 && original == ConfidenceLevel::High {
        return ConfidenceLevel::Medium;
    }
    original
}

pub fn risk_level(confidence: ConfidenceLevel, warnings: usize, errors: usize) -> RiskLevel {
    if errors > 0 {
        RiskLevel::High
    } else if confidence == ConfidenceLevel::Low || warnings > 3 {
        RiskLevel::Medium
    } else if warnings > 0 || confidence == ConfidenceLevel::Medium {
        RiskLevel::Low
    } else {
        RiskLevel::Minimal
    }
}

// ─── Error Categories ──────────────────────────────────────────────

/// Coarse error buckets for aggregate reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Checksum,
    License,
    Authorization,
    Organization,
    Validation,
    General,
}

impl ErrorCategory {
    /// First matching keyword wins, in declaration order
    pub fn categorize(error: &str) -> Self {
        let lower = error.to_lowercase();
        if lower.contains("checksum") {
            Self::Checksum
        } else if lower.contains("license") {
            Self::License
        } else if lower.contains("authoriz") {
            Self::Authorization
        } else if lower.contains("organization") {
            Self::Organization
        } else if lower.contains("validation") {
            Self::Validation
        } else {
            Self::General
        }
    }
}

// ─── Pipeline ──────────────────────────────────────────────────────

/// Runs the fixed rule sequence
#[derive(Clone)]
pub struct DecisionValidator {
    policy: Arc<PolicyEngine>,
    rules: Arc<Vec<Box<dyn ValidationRule>>>,
}

impl DecisionValidator {
    pub fn new(policy: Arc<PolicyEngine>) -> Self {
        let rules: Vec<Box<dyn ValidationRule>> = vec![
            Box::new(RequiredFields),
            Box::new(ChecksumFormat),
            Box::new(Authorization),
            Box::new(OrganizationContext),
            Box::new(Temporal),
            Box::new(LicenseCompatibility),
            Box::new(DecisionTypeRules),
            Box::new(FileTypeCompatibility),
            Box::new(ClearingStateCompatibility),
        ];
        Self {
            policy,
            rules: Arc::new(rules),
        }
    }

    pub fn validate(&self, decision: &ReuseableDecision, target: &Release, user: &User) -> ValidationOutcome {
        self.validate_at(decision, target, user, Utc::now())
    }

    pub fn validate_at(
        &self,
        decision: &ReuseableDecision,
        target: &Release,
        user: &User,
        now: DateTime<Utc>,
    ) -> ValidationOutcome {
        let ctx = ValidationContext {
            decision,
            target,
            user,
            policy: &self.policy,
            now,
        };
        let mut findings = Findings::default();
        for rule in self.rules.iter() {
            let (errors_before, warnings_before) = (findings.errors.len(), findings.warnings.len());
            rule.check(&ctx, &mut findings);
            tracing::trace!(
                "rule {}: +{} errors, +{} warnings",
                rule.name(),
                findings.errors.len() - errors_before,
                findings.warnings.len() - warnings_before
            );
        }

        let outcome = ValidationOutcome::from_findings(decision.confidence, findings, user, now);
        tracing::debug!(
            "Validated decision from {} for {} (checksum {}): valid={}, confidence={}, {} warnings, {} errors",
            decision.source_release_id,
            target.id,
            decision.checksum,
            outcome.valid,
            outcome.confidence,
            outcome.warnings.len(),
            outcome.errors.len()
        );
        outcome
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }
}

fn describe_days(days: i64) -> String {
    match days {
        YEAR_DAYS => "1 year".to_string(),
        THREE_YEARS_DAYS => "3 years".to_string(),
        d if d % YEAR_DAYS == 0 => format!("{} years", d / YEAR_DAYS),
        d => format!("{} days", d),
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
