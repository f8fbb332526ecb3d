//! Duplicate detection
//!
//! Four independent read-only operations over loaded releases:
//!
//! - `detect_in_release` — checksum collisions inside one release
//! - `detect_across_releases` — checksum collisions across many releases
//! - `find_by_checksums` — catalogue-wide lookup through the checksum repository
//! - `find_by_metadata` — filename similarity fallback when checksums are absent
//!
//! Only syntactically valid checksums (see [`checksum`]) take part in any of
//! the checksum-based operations.

pub mod checksum;
pub mod statistics;

pub use checksum::*;
pub use statistics::*;

use crate::collaborators::ChecksumRepository;
use crate::model::{Attachment, AttachmentType, Release};
use crate::ReuseResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

static VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\d+\.\d+(\.\d+)?").unwrap());
static ARCHIVE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(tar\.gz|tar\.bz2|zip|tgz)$").unwrap());

/// Attachments sharing one checksum, keyed by release id
pub type ReleaseOccurrences = BTreeMap<String, Vec<Attachment>>;

/// One catalogue hit for a looked-up checksum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub attachment_id: String,
    pub filename: String,
    pub checksum_type: ChecksumAlgorithm,
    pub checksum_value: String,
    pub attachment_type: AttachmentType,
    /// Every checksum known for the matched file, for cross-verification
    pub sha1: Option<String>,
    pub md5: Option<String>,
    pub sha256: Option<String>,
}

impl MatchInfo {
    fn from_attachment(attachment: &Attachment, checksum: &Checksum) -> Self {
        let known = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        Self {
            attachment_id: attachment.attachment_content_id.clone(),
            filename: attachment.filename.clone(),
            checksum_type: checksum.algorithm(),
            checksum_value: checksum.value().to_string(),
            attachment_type: attachment.attachment_type,
            sha1: known(&attachment.sha1),
            md5: known(&attachment.md5),
            sha256: known(&attachment.sha256),
        }
    }
}

/// Checksum-based duplicate finder backed by the catalogue repository
#[derive(Clone)]
pub struct DuplicateDetector {
    repository: Arc<dyn ChecksumRepository>,
}

impl DuplicateDetector {
    pub fn new(repository: Arc<dyn ChecksumRepository>) -> Self {
        Self { repository }
    }

    /// Groups of more than one attachment sharing a checksum within `release`
    pub fn detect_in_release(&self, release: &Release) -> BTreeMap<String, Vec<Attachment>> {
        if release.attachments.is_empty() {
            tracing::debug!("No attachments found in release {}", release.id);
            return BTreeMap::new();
        }

        let mut groups: BTreeMap<String, Vec<Attachment>> = BTreeMap::new();
        for attachment in &release.attachments {
            if let Some(checksum) = valid_checksum(attachment) {
                groups
                    .entry(checksum.value().to_string())
                    .or_default()
                    .push(attachment.clone());
            }
        }
        groups.retain(|_, group| group.len() > 1);

        tracing::info!(
            "Found {} duplicate groups in release {} ({} attachments)",
            groups.len(),
            release.id,
            release.attachments.len()
        );
        groups
    }

    /// Checksums appearing in more than one release, or more than once in one
    pub fn detect_across_releases(
        &self,
        releases: &[Release],
    ) -> BTreeMap<String, ReleaseOccurrences> {
        let mut index: BTreeMap<String, ReleaseOccurrences> = BTreeMap::new();
        for release in releases {
            for attachment in &release.attachments {
                if let Some(checksum) = valid_checksum(attachment) {
                    index
                        .entry(checksum.value().to_string())
                        .or_default()
                        .entry(release.id.clone())
                        .or_default()
                        .push(attachment.clone());
                }
            }
        }

        index.retain(|_, by_release| {
            by_release.len() > 1 || by_release.values().any(|list| list.len() > 1)
        });

        tracing::info!(
            "Found {} duplicate checksums across {} releases",
            index.len(),
            releases.len()
        );
        index
    }

    /// Look every valid checksum up in the catalogue repository.
    ///
    /// Invalid and blank checksums are skipped; checksums with no hit are
    /// absent from the result.
    pub fn find_by_checksums<S: AsRef<str>>(
        &self,
        checksums: &[S],
    ) -> ReuseResult<BTreeMap<String, Vec<MatchInfo>>> {
        let mut results = BTreeMap::new();
        if checksums.is_empty() {
            return Ok(results);
        }

        for raw in checksums {
            let checksum = match Checksum::try_from_str(raw.as_ref()) {
                Some(c) => c,
                None => continue,
            };
            let matches: Vec<MatchInfo> = self
                .repository
                .attachments_by_checksum(checksum.value(), checksum.algorithm())?
                .iter()
                .map(|a| MatchInfo::from_attachment(a, &checksum))
                .collect();

            if !matches.is_empty() {
                tracing::debug!("Found {} matches for checksum {}", matches.len(), checksum);
                results.insert(checksum.value().to_string(), matches);
            }
        }

        tracing::info!(
            "Found duplicates for {} out of {} checksums",
            results.len(),
            checksums.len()
        );
        Ok(results)
    }

    /// Filename-similarity groups; a lower-confidence substitute for checksums
    pub fn find_by_metadata(&self, releases: &[Release]) -> BTreeMap<String, Vec<Attachment>> {
        let mut groups: BTreeMap<String, Vec<Attachment>> = BTreeMap::new();
        for release in releases {
            for attachment in &release.attachments {
                if attachment.filename.trim().is_empty() {
                    continue;
                }
                groups
                    .entry(similarity_key(&attachment.filename))
                    .or_default()
                    .push(attachment.clone());
            }
        }
        groups.retain(|_, group| group.len() > 1);

        tracing::info!("Found {} potential duplicate groups by metadata", groups.len());
        groups
    }

    pub fn statistics(&self, releases: &[Release]) -> DuplicationStatistics {
        DuplicationStatistics::compute(releases)
    }
}

/// The attachment's primary checksum, if syntactically valid
pub fn valid_checksum(attachment: &Attachment) -> Option<Checksum> {
    attachment.checksum().and_then(Checksum::try_from_str)
}

/// Normalized filename used to group likely-identical files without checksums
///
/// Lower-cases, strips `-X.Y[.Z]` version fragments and common archive
/// suffixes, then drops the final extension.
pub fn similarity_key(filename: &str) -> String {
    let lowered = filename.to_lowercase();
    let unversioned = VERSION_SUFFIX.replace_all(&lowered, "");
    let mut key = ARCHIVE_SUFFIX.replace(&unversioned, "").into_owned();
    if let Some(dot) = key.rfind('.') {
        if dot > 0 {
            key.truncate(dot);
        }
    }
    key
}
