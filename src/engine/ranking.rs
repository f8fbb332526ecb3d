//! Candidate ranking and filtering
//!
//! `rank_candidates` keeps the applicable candidates for one target file
//! and orders them with `compare_priority`, a total order:
//!
//! 1. higher confidence score
//! 2. approved before unapproved
//! 3. newer creation date (dated before undated)
//! 4. named clearing team before none
//! 5. more license ids
//!
//! `advanced_filter_at` is the second, policy-driven pass used by the
//! top-level finder.

use crate::decision::{ConfidenceLevel, ReuseDecisionType, ReuseableDecision};
use crate::model::{Attachment, Release, User, UserGroup};
use crate::policy::PolicyEngine;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Role check for applying a decision without review
pub fn user_may_apply(user: &User, decision: &ReuseableDecision) -> bool {
    match user.group {
        Some(UserGroup::Admin) | Some(UserGroup::ClearingAdmin) => true,
        Some(UserGroup::ClearingExpert) => {
            decision.decision_type != Some(ReuseDecisionType::ExportRestriction)
        }
        Some(UserGroup::User) => {
            decision.confidence == Some(ConfidenceLevel::High)
                && decision.decision_type == Some(ReuseDecisionType::IdenticalFile)
        }
        _ => false,
    }
}

fn organization_compatible(decision: &ReuseableDecision, user: &User, policy: &PolicyEngine) -> bool {
    match decision.organization_id.as_deref() {
        None => true,
        Some(org) => org == policy.organization_for(user),
    }
}

/// Whether `decision` may be considered for `target_attachment` at all
pub fn is_applicable(
    decision: &ReuseableDecision,
    target_attachment: &Attachment,
    user: &User,
    policy: &PolicyEngine,
) -> bool {
    if decision.confidence == Some(ConfidenceLevel::Low) {
        return false;
    }
    if !policy.file_types_compatible(decision.filename(), &target_attachment.filename) {
        return false;
    }
    user_may_apply(user, decision) && organization_compatible(decision, user, policy)
}

/// `Less` means `a` ranks ahead of `b`
pub fn compare_priority(a: &ReuseableDecision, b: &ReuseableDecision) -> Ordering {
    let has_team = |d: &ReuseableDecision| {
        d.clearing_team
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    };

    b.confidence_score()
        .cmp(&a.confidence_score())
        .then_with(|| b.approved.cmp(&a.approved))
        .then_with(|| b.created_date.cmp(&a.created_date))
        .then_with(|| has_team(b).cmp(&has_team(a)))
        .then_with(|| b.license_ids.len().cmp(&a.license_ids.len()))
}

/// Applicable candidates, best first; ties keep index order
pub fn rank_candidates(
    candidates: &[ReuseableDecision],
    target_attachment: &Attachment,
    user: &User,
    policy: &PolicyEngine,
) -> Vec<ReuseableDecision> {
    let mut ranked: Vec<ReuseableDecision> = candidates
        .iter()
        .filter(|d| is_applicable(d, target_attachment, user, policy))
        .cloned()
        .collect();
    ranked.sort_by(compare_priority);

    tracing::debug!(
        "Ranked {}/{} candidates for {}",
        ranked.len(),
        candidates.len(),
        target_attachment.filename
    );
    ranked
}

/// Drop organization mismatches, license conflicts with the target and
/// expired decisions, then cap at `max_candidates`.
pub fn advanced_filter_at(
    ranked: Vec<ReuseableDecision>,
    target: &Release,
    user: &User,
    policy: &PolicyEngine,
    max_candidates: usize,
    now: DateTime<Utc>,
) -> Vec<ReuseableDecision> {
    ranked
        .into_iter()
        .filter(|d| organization_compatible(d, user, policy))
        .filter(|d| {
            policy
                .conflicts()
                .find_incompatible(&d.license_ids, &target.main_license_ids)
                .is_empty()
        })
        .filter(|d| !policy.is_expired_at(d.created_date, now))
        .take(max_candidates)
        .collect()
}
