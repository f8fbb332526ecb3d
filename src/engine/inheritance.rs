//! Inheritance applier
//!
//! Walks the ranked candidates of one checksum, validates each and applies
//! the first valid one whose execution succeeds; nothing after it is
//! attempted. Candidates are processed strictly in order on the calling
//! thread.

use super::cache::{InheritanceCache, InheritanceRecord};
use super::validation::{DecisionValidator, ErrorCategory};
use crate::collaborators::Collaborators;
use crate::decision::ReuseableDecision;
use crate::duplicates::normalize_checksum;
use crate::duplicates::statistics::round2;
use crate::evidence::{AuditEntry, InheritanceApplicationRecord};
use crate::model::{ClearingState, Release, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Outcome for one target checksum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumApplication {
    pub checksum: String,
    pub applied: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub audit_trail: Vec<AuditEntry>,
    pub processing_log: Vec<String>,
    pub candidate_count: usize,
    /// A fresh cached inheritance already covered this checksum
    pub already_satisfied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Success,
    PartialSuccess,
    CompletedWithErrors,
    Failed,
}

impl OverallStatus {
    pub fn from_counts(applied: usize, skipped: usize, errors: usize) -> Self {
        if errors == 0 && skipped == 0 {
            Self::Success
        } else if applied > 0 && errors == 0 {
            Self::PartialSuccess
        } else if applied > 0 {
            Self::CompletedWithErrors
        } else {
            Self::Failed
        }
    }
}

/// Aggregate report over every checksum of one target release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InheritanceReport {
    pub status: OverallStatus,
    pub release_id: String,
    pub release_label: String,
    pub total_decisions: usize,
    pub applied_decisions: usize,
    pub skipped_decisions: usize,
    pub already_satisfied: usize,
    /// applied / total × 100, 2 decimals
    pub success_rate: f64,
    pub validation_errors: Vec<String>,
    pub error_categories: BTreeMap<ErrorCategory, usize>,
    pub details: BTreeMap<String, ChecksumApplication>,
    pub audit_trail: Vec<AuditEntry>,
    pub applied_by: Option<String>,
    pub applied_by_department: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub recommended_clearing_state: Option<ClearingState>,
}

#[derive(Clone)]
pub struct InheritanceApplier {
    validator: DecisionValidator,
    cache: Arc<InheritanceCache>,
    collaborators: Collaborators,
}

impl InheritanceApplier {
    pub fn new(validator: DecisionValidator, cache: Arc<InheritanceCache>, collaborators: Collaborators) -> Self {
        Self {
            validator,
            cache,
            collaborators,
        }
    }

    /// Apply at most one of `candidates` to `target` for `checksum`
    pub fn apply_for_checksum_at(
        &self,
        target: &Release,
        checksum: &str,
        candidates: &[ReuseableDecision],
        user: &User,
        now: DateTime<Utc>,
    ) -> ChecksumApplication {
        let mut result = ChecksumApplication {
            checksum: checksum.to_string(),
            applied: 0,
            skipped: 0,
            errors: Vec::new(),
            audit_trail: Vec::new(),
            processing_log: Vec::new(),
            candidate_count: candidates.len(),
            already_satisfied: false,
        };

        if self.cache.is_satisfied_at(&target.id, checksum, now) {
            tracing::debug!("Using cached inheritance decision for checksum {}", checksum);
            result.already_satisfied = true;
            result
                .processing_log
                .push(format!("Already inherited within the cache window for checksum: {}", checksum));
            return result;
        }

        for decision in candidates {
            result
                .processing_log
                .push(format!("Processing decision from release: {}", decision.source_release_id));

            let outcome = self.validator.validate_at(decision, target, user, now);
            if !outcome.valid {
                tracing::debug!(
                    "Skipped decision for checksum {} due to validation errors: {:?}",
                    checksum,
                    outcome.errors
                );
                result
                    .processing_log
                    .push(format!("Skipped decision due to validation errors: {:?}", outcome.errors));
                result.errors.extend(outcome.errors);
                result.skipped += 1;
                continue;
            }

            let entry = AuditEntry::new(decision, target, user, &outcome, now);
            if let Err(e) = self.collaborators.sink.append_audit(&entry) {
                tracing::warn!("Failed to persist audit entry {}: {}", entry.id, e);
            }
            result.audit_trail.push(entry);

            if self.execute(decision, target, user, now) {
                result.applied += 1;
                result
                    .processing_log
                    .push(format!("Successfully applied decision for checksum: {}", checksum));
                self.cache.put(InheritanceRecord {
                    target_release_id: target.id.clone(),
                    source_release_id: decision.source_release_id.clone(),
                    checksum: normalize_checksum(checksum),
                    inherited_at: now,
                    inherited_by: user.email.clone(),
                    confidence: decision.confidence,
                    successful: true,
                });
                break;
            }

            result
                .errors
                .push(format!("Failed to execute decision inheritance for checksum: {}", checksum));
            result.skipped += 1;
            result
                .processing_log
                .push(format!("Failed to apply decision for checksum: {}", checksum));
        }

        result
    }

    /// Store the record, then best-effort status update and notification.
    ///
    /// Only the store step decides success; once the record is stored the
    /// follow-up steps can neither fail nor unwind the application.
    fn execute(&self, decision: &ReuseableDecision, target: &Release, user: &User, now: DateTime<Utc>) -> bool {
        let record = InheritanceApplicationRecord::new(decision, target, user, now);
        let stored = catch_unwind(AssertUnwindSafe(|| self.collaborators.sink.store(&record)));
        match stored {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                tracing::error!("Failed to store inheritance record {}", record.id);
                return false;
            }
            Ok(Err(e)) => {
                tracing::error!("Failed to store inheritance record {}: {}", record.id, e);
                return false;
            }
            Err(panic) => {
                tracing::error!("Storing inheritance record {} panicked: {:?}", record.id, panic);
                return false;
            }
        }

        match catch_unwind(AssertUnwindSafe(|| {
            self.collaborators.status_updater.update(target, decision, user)
        })) {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => tracing::warn!("Failed to update clearing status for release {}", target.id),
            Ok(Err(e)) => tracing::warn!("Failed to update clearing status for release {}: {}", target.id, e),
            Err(panic) => tracing::warn!("Clearing status update for release {} panicked: {:?}", target.id, panic),
        }

        match catch_unwind(AssertUnwindSafe(|| self.collaborators.notifier.notify(decision, target, user))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to send inheritance notification for {}: {}", target.id, e),
            Err(panic) => tracing::warn!("Inheritance notification for {} panicked: {:?}", target.id, panic),
        }

        tracing::info!(
            "Applied clearing decision inheritance from {} to {} for checksum {}",
            decision.source_release_id,
            target.id,
            decision.checksum
        );
        true
    }

    /// Apply every checksum group and fold the results into one report
    pub fn apply_all_at(
        &self,
        target: &Release,
        decisions: &BTreeMap<String, Vec<ReuseableDecision>>,
        user: &User,
        now: DateTime<Utc>,
    ) -> InheritanceReport {
        tracing::info!(
            "Applying clearing decision inheritance for release {} with {} decision groups",
            target.id,
            decisions.len()
        );

        let mut total = 0usize;
        let mut applied = 0usize;
        let mut skipped = 0usize;
        let mut already_satisfied = 0usize;
        let mut validation_errors = Vec::new();
        let mut error_categories: BTreeMap<ErrorCategory, usize> = BTreeMap::new();
        let mut audit_trail = Vec::new();
        let mut details = BTreeMap::new();

        for (checksum, candidates) in decisions {
            let application = self.apply_for_checksum_at(target, checksum, candidates, user, now);

            if application.already_satisfied {
                already_satisfied += 1;
            } else {
                total += candidates.len();
            }
            applied += application.applied;
            skipped += application.skipped;
            for error in &application.errors {
                *error_categories.entry(ErrorCategory::categorize(error)).or_insert(0) += 1;
            }
            validation_errors.extend(application.errors.iter().cloned());
            audit_trail.extend(application.audit_trail.iter().cloned());
            details.insert(checksum.clone(), application);
        }

        let success_rate = if total > 0 {
            round2(applied as f64 / total as f64 * 100.0)
        } else {
            0.0
        };
        let status = OverallStatus::from_counts(applied, skipped, validation_errors.len());

        tracing::info!(
            "Applied inheritance for release {}: {}/{} decisions applied ({:.1}%), {} errors",
            target.id,
            applied,
            total,
            success_rate,
            validation_errors.len()
        );

        InheritanceReport {
            status,
            release_id: target.id.clone(),
            release_label: target.label(),
            total_decisions: total,
            applied_decisions: applied,
            skipped_decisions: skipped,
            already_satisfied,
            success_rate,
            validation_errors,
            error_categories,
            details,
            audit_trail,
            applied_by: user.email.clone(),
            applied_by_department: user.department.clone(),
            applied_at: now,
            recommended_clearing_state: (success_rate > 50.0).then_some(ClearingState::UnderClearing),
        }
    }

    pub fn cache(&self) -> &InheritanceCache {
        &self.cache
    }
}
