//! Checksum index — donor decisions keyed by file checksum
//!
//! Pure projection over already-loaded releases. Only REPORT_AVAILABLE and
//! APPROVED releases donate, and only attachments carrying both a valid
//! checksum and an upload reference produce a decision.

use crate::decision::ReuseableDecision;
use crate::duplicates::{normalize_checksum, valid_checksum};
use crate::model::{Release, User};
use crate::policy::PolicyEngine;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ChecksumIndex {
    by_checksum: BTreeMap<String, Vec<ReuseableDecision>>,
    donor_releases: usize,
}

impl ChecksumIndex {
    pub fn build(sources: &[Release], user: &User, policy: &PolicyEngine) -> Self {
        Self::build_at(sources, user, policy, Utc::now())
    }

    /// `now` stands in for the creation date of releases that have none
    pub fn build_at(sources: &[Release], user: &User, policy: &PolicyEngine, now: DateTime<Utc>) -> Self {
        let organization = policy.organization_for(user);
        let mut by_checksum: BTreeMap<String, Vec<ReuseableDecision>> = BTreeMap::new();
        let mut donor_releases = 0usize;

        for release in sources.iter().filter(|r| r.is_donor()) {
            donor_releases += 1;
            for attachment in &release.attachments {
                if attachment.upload_reference().is_none() {
                    continue;
                }
                let checksum = match valid_checksum(attachment) {
                    Some(c) => c,
                    None => continue,
                };
                let decision = ReuseableDecision::from_donor(
                    release,
                    attachment,
                    &checksum,
                    Some(organization.clone()),
                    now,
                );
                by_checksum
                    .entry(checksum.value().to_string())
                    .or_default()
                    .push(decision);
            }
        }

        tracing::debug!(
            "Built checksum index with {} unique checksums from {} donor releases ({} candidates)",
            by_checksum.len(),
            donor_releases,
            sources.len()
        );

        Self {
            by_checksum,
            donor_releases,
        }
    }

    /// Donor decisions for `checksum`, in index order
    pub fn candidates(&self, checksum: &str) -> &[ReuseableDecision] {
        self.by_checksum
            .get(&normalize_checksum(checksum))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn donor_releases(&self) -> usize {
        self.donor_releases
    }

    pub fn len(&self) -> usize {
        self.by_checksum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_checksum.is_empty()
    }
}
