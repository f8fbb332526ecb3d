//! Inheritance evidence
//!
//! Two persisted artifacts per executed inheritance:
//! - `AuditEntry`: full decision context plus the validation verdict,
//!   sealed with a SHA-256 content hash for tamper detection
//! - `InheritanceApplicationRecord`: the applied decision itself, handed to
//!   the record sink

use crate::decision::{ConfidenceLevel, ReuseDecisionType, ReuseScope, ReuseableDecision};
use crate::duplicates::ChecksumAlgorithm;
use crate::engine::validation::ValidationOutcome;
use crate::model::{ClearingState, Release, User, UserGroup};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const INHERITANCE_METHOD: &str = "checksum_reuse_v2";

/// Append-only audit record of one inheritance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub action: String,
    pub recorded_at: DateTime<Utc>,
    pub inheritance_method: String,

    pub actor_id: String,
    pub actor_email: Option<String>,
    pub actor_department: Option<String>,
    pub actor_group: Option<UserGroup>,

    pub target_release_id: String,
    pub target_release_label: String,
    pub target_component_id: String,
    pub source_release_id: String,
    pub source_attachment_id: String,
    pub checksum: String,
    pub checksum_type: Option<ChecksumAlgorithm>,

    pub decision_type: Option<ReuseDecisionType>,
    pub decision_type_description: Option<String>,
    pub scope: ReuseScope,
    pub scope_description: String,
    pub confidence: Option<ConfidenceLevel>,
    pub confidence_score: u32,
    pub validation: ValidationOutcome,

    pub original_created_by: Option<String>,
    pub original_created_date: Option<DateTime<Utc>>,
    pub clearing_team: Option<String>,
    pub upload_id: Option<String>,
    pub license_ids: Vec<String>,
    pub copyright_statements: Vec<String>,
    pub comment: Option<String>,
    pub additional_data: BTreeMap<String, String>,
    pub organization_id: Option<String>,
    pub approved: bool,
    pub reviewer_comments: Option<String>,
    pub clearing_state: Option<ClearingState>,

    /// SHA-256 over the identifying fields and the verdict
    pub content_hash: String,
}

impl AuditEntry {
    pub fn new(
        decision: &ReuseableDecision,
        target: &Release,
        user: &User,
        validation: &ValidationOutcome,
        now: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self {
            id: Uuid::new_v4().to_string(),
            action: "clearing_decision_inheritance".to_string(),
            recorded_at: now,
            inheritance_method: INHERITANCE_METHOD.to_string(),
            actor_id: user.id.clone(),
            actor_email: user.email.clone(),
            actor_department: user.department.clone(),
            actor_group: user.group,
            target_release_id: target.id.clone(),
            target_release_label: target.label(),
            target_component_id: target.component_id.clone(),
            source_release_id: decision.source_release_id.clone(),
            source_attachment_id: decision.source_attachment_id.clone(),
            checksum: decision.checksum.clone(),
            checksum_type: decision.checksum_type,
            decision_type: decision.decision_type,
            decision_type_description: decision.decision_type.map(|t| t.description().to_string()),
            scope: decision.scope,
            scope_description: decision.scope.description().to_string(),
            confidence: decision.confidence,
            confidence_score: decision.confidence_score(),
            validation: validation.clone(),
            original_created_by: decision.created_by.clone(),
            original_created_date: decision.created_date,
            clearing_team: decision.clearing_team.clone(),
            upload_id: decision.upload_id.clone(),
            license_ids: decision.license_ids.clone(),
            copyright_statements: decision.copyright_statements.clone(),
            comment: decision.comment.clone(),
            additional_data: decision.additional_data.clone(),
            organization_id: decision.organization_id.clone(),
            approved: decision.approved,
            reviewer_comments: decision.reviewer_comments.clone(),
            clearing_state: decision.clearing_state,
            content_hash: String::new(),
        };
        entry.content_hash = entry.compute_hash();

        tracing::debug!(
            "Created audit entry {} for inheritance from {} to {}",
            entry.id,
            entry.source_release_id,
            entry.target_release_id
        );
        entry
    }

    fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.id.as_bytes());
        hasher.update(self.recorded_at.to_rfc3339().as_bytes());
        hasher.update(self.actor_id.as_bytes());
        hasher.update(self.target_release_id.as_bytes());
        hasher.update(self.source_release_id.as_bytes());
        hasher.update(self.source_attachment_id.as_bytes());
        hasher.update(self.checksum.as_bytes());
        if let Some(t) = self.decision_type {
            hasher.update(t.as_str().as_bytes());
        }
        if let Some(c) = self.confidence {
            hasher.update(c.as_str().as_bytes());
        }
        for license in &self.license_ids {
            hasher.update(license.as_bytes());
        }
        for statement in &self.copyright_statements {
            hasher.update(statement.as_bytes());
        }
        if let Some(ref org) = self.organization_id {
            hasher.update(org.as_bytes());
        }
        hasher.update([self.approved as u8, self.validation.valid as u8]);
        hasher.update(self.validation.confidence.as_str().as_bytes());
        for msg in self.validation.errors.iter().chain(&self.validation.warnings) {
            hasher.update(msg.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Re-compute the content hash and compare
    pub fn verify_integrity(&self) -> bool {
        !self.content_hash.is_empty() && self.compute_hash() == self.content_hash
    }
}

impl std::fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AuditEntry[{}]: {} -> {} ({}), integrity={}",
            prefix(&self.id, 8),
            self.source_release_id,
            self.target_release_id,
            prefix(&self.checksum, 12),
            if self.verify_integrity() { "OK" } else { "TAMPERED" }
        )
    }
}

/// First `n` characters, never splitting a multi-byte character
fn prefix(value: &str, n: usize) -> String {
    value.chars().take(n).collect()
}

/// The applied decision, as stored by the record sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritanceApplicationRecord {
    pub id: String,
    pub target_release_id: String,
    pub source_release_id: String,
    pub source_attachment_id: String,
    pub checksum: String,
    pub inherited_at: DateTime<Utc>,
    pub inherited_by: Option<String>,
    pub decision_type: Option<ReuseDecisionType>,
    pub confidence: Option<ConfidenceLevel>,
    pub license_ids: Vec<String>,
    pub copyright_statements: Vec<String>,
    pub upload_id: Option<String>,
    pub organization_id: Option<String>,
}

impl InheritanceApplicationRecord {
    pub fn new(decision: &ReuseableDecision, target: &Release, user: &User, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target_release_id: target.id.clone(),
            source_release_id: decision.source_release_id.clone(),
            source_attachment_id: decision.source_attachment_id.clone(),
            checksum: decision.checksum.clone(),
            inherited_at: now,
            inherited_by: user.email.clone(),
            decision_type: decision.decision_type,
            confidence: decision.confidence,
            license_ids: decision.license_ids.clone(),
            copyright_statements: decision.copyright_statements.clone(),
            upload_id: decision.upload_id.clone(),
            organization_id: decision.organization_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::Checksum;
    use crate::engine::validation::DecisionValidator;
    use crate::policy::PolicyEngine;
    use std::sync::Arc;

    fn fixture() -> (ReuseableDecision, Release, User, ValidationOutcome) {
        let checksum = Checksum::parse(&"cd".repeat(20)).unwrap();
        let decision = ReuseableDecision::identical_file("donor", "att-9", &checksum).with_licenses(["MIT"]);
        let target = Release::new("target", "zlib", "1.3", "comp");
        let user = User::new("u1", "lead@example.com", UserGroup::ClearingExpert);
        let outcome = DecisionValidator::new(Arc::new(PolicyEngine::default())).validate(&decision, &target, &user);
        (decision, target, user, outcome)
    }

    #[test]
    fn test_audit_entry_integrity() {
        let (decision, target, user, outcome) = fixture();
        let mut entry = AuditEntry::new(&decision, &target, &user, &outcome, Utc::now());
        assert!(entry.verify_integrity());
        assert_eq!(entry.content_hash.len(), 64);
        assert_eq!(entry.decision_type_description.as_deref(), Some("File with identical checksum"));
        assert_eq!(entry.scope_description, "Individual file");
        assert_eq!(entry.target_release_label, "zlib 1.3");

        entry.license_ids.push("GPL-3.0".into());
        assert!(!entry.verify_integrity(), "edited entry no longer verifies");
    }

    #[test]
    fn test_display_with_multibyte_identifiers() {
        let (decision, target, user, outcome) = fixture();
        let mut entry = AuditEntry::new(&decision, &target, &user, &outcome, Utc::now());
        entry.id = "ééééééééé".into();
        entry.checksum = "ab€€€€€€€€€€€€".into();

        let shown = entry.to_string();
        assert!(shown.starts_with("AuditEntry[éééééééé]: donor -> target (ab€€€€€€€€€€)"), "{}", shown);
        assert!(shown.ends_with("integrity=TAMPERED"));
    }

    #[test]
    fn test_record_carries_decision_context() {
        let (decision, target, user, _) = fixture();
        let record = InheritanceApplicationRecord::new(&decision, &target, &user, Utc::now());
        assert_eq!(record.inherited_by.as_deref(), Some("lead@example.com"));
        assert_eq!(record.license_ids, vec!["MIT"]);
        assert!(Uuid::parse_str(&record.id).is_ok());
    }
}
