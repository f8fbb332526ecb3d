//! Clearing decision reuse — find, validate and apply donor decisions

use super::cache::InheritanceCache;
use super::index::ChecksumIndex;
use super::inheritance::{InheritanceApplier, InheritanceReport};
use super::ranking::{advanced_filter_at, rank_candidates};
use super::validation::{DecisionValidator, ValidationOutcome};
use super::EngineConfig;
use crate::collaborators::Collaborators;
use crate::decision::ReuseableDecision;
use crate::duplicates::valid_checksum;
use crate::evidence::AuditEntry;
use crate::model::{Release, User};
use crate::policy::PolicyEngine;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Candidate decisions per target checksum, best first
pub type ReuseCandidates = BTreeMap<String, Vec<ReuseableDecision>>;

#[derive(Clone)]
pub struct ClearingDecisionReuse {
    policy: Arc<PolicyEngine>,
    validator: DecisionValidator,
    cache: Arc<InheritanceCache>,
    applier: InheritanceApplier,
    max_candidates: usize,
}

impl ClearingDecisionReuse {
    pub fn new(policy: Arc<PolicyEngine>, config: &EngineConfig, collaborators: Collaborators) -> Self {
        let cache = Arc::new(InheritanceCache::new(config.cache_freshness_hours));
        Self::with_cache(policy, config, collaborators, cache)
    }

    /// Use a caller-owned cache, e.g. one shared between engines
    pub fn with_cache(
        policy: Arc<PolicyEngine>,
        config: &EngineConfig,
        collaborators: Collaborators,
        cache: Arc<InheritanceCache>,
    ) -> Self {
        let validator = DecisionValidator::new(policy.clone());
        let applier = InheritanceApplier::new(validator.clone(), cache.clone(), collaborators);
        Self {
            policy,
            validator,
            cache,
            applier,
            max_candidates: config.max_candidates,
        }
    }

    pub fn find_reuseable_decisions(&self, target: &Release, sources: &[Release], user: &User) -> ReuseCandidates {
        self.find_reuseable_decisions_at(target, sources, user, Utc::now())
    }

    /// Ranked, filtered donor decisions for every target file without a
    /// fresh cached inheritance
    pub fn find_reuseable_decisions_at(
        &self,
        target: &Release,
        sources: &[Release],
        user: &User,
        now: DateTime<Utc>,
    ) -> ReuseCandidates {
        let mut found = ReuseCandidates::new();
        if target.attachments.is_empty() {
            tracing::debug!("No attachments in target release {}", target.id);
            return found;
        }

        tracing::info!(
            "Finding reuseable clearing decisions for release {} from {} source releases",
            target.id,
            sources.len()
        );
        let index = ChecksumIndex::build_at(sources, user, &self.policy, now);

        for attachment in &target.attachments {
            let checksum = match valid_checksum(attachment) {
                Some(c) => c,
                None => continue,
            };
            if self.cache.is_satisfied_at(&target.id, checksum.value(), now) {
                tracing::debug!("Using cached inheritance decision for checksum {}", checksum);
                continue;
            }

            let ranked = rank_candidates(index.candidates(checksum.value()), attachment, user, &self.policy);
            if ranked.is_empty() {
                continue;
            }
            let filtered = advanced_filter_at(ranked, target, user, &self.policy, self.max_candidates, now);
            if !filtered.is_empty() {
                tracing::debug!(
                    "Found {} reuseable decisions for {} ({})",
                    filtered.len(),
                    attachment.filename,
                    checksum
                );
                found.insert(checksum.value().to_string(), filtered);
            }
        }

        tracing::info!(
            "Found reuseable decisions for {} out of {} attachments in release {}",
            found.len(),
            target.attachments.len(),
            target.id
        );
        found
    }

    pub fn apply_inheritance(&self, target: &Release, decisions: &ReuseCandidates, user: &User) -> InheritanceReport {
        self.apply_inheritance_at(target, decisions, user, Utc::now())
    }

    pub fn apply_inheritance_at(
        &self,
        target: &Release,
        decisions: &ReuseCandidates,
        user: &User,
        now: DateTime<Utc>,
    ) -> InheritanceReport {
        self.applier.apply_all_at(target, decisions, user, now)
    }

    pub fn validate(&self, decision: &ReuseableDecision, target: &Release, user: &User) -> ValidationOutcome {
        self.validator.validate(decision, target, user)
    }

    pub fn validate_at(
        &self,
        decision: &ReuseableDecision,
        target: &Release,
        user: &User,
        now: DateTime<Utc>,
    ) -> ValidationOutcome {
        self.validator.validate_at(decision, target, user, now)
    }

    /// Audit entry for a decision already validated against `target`
    pub fn audit_entry(
        &self,
        decision: &ReuseableDecision,
        target: &Release,
        user: &User,
        outcome: &ValidationOutcome,
    ) -> AuditEntry {
        AuditEntry::new(decision, target, user, outcome, Utc::now())
    }

    pub fn cache(&self) -> &InheritanceCache {
        &self.cache
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }
}
