//! Catalogue-wide duplication statistics

use super::valid_checksum;
use crate::model::Release;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const TOP_DUPLICATES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumOccurrence {
    pub checksum: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicationStatistics {
    pub analyzed_releases: usize,
    pub total_attachments: usize,
    /// Checksums seen exactly once
    pub unique_files: usize,
    /// Attachments whose checksum is seen more than once
    pub duplicate_files: usize,
    pub unique_checksums: usize,
    /// duplicate_files / total_attachments × 100, 2 decimals
    pub duplication_percentage: f64,
    /// Most-duplicated checksums, by occurrence count
    pub top_duplicates: Vec<ChecksumOccurrence>,
}

impl DuplicationStatistics {
    pub fn compute(releases: &[Release]) -> Self {
        let mut total_attachments = 0usize;
        let mut counts: HashMap<String, usize> = HashMap::new();

        for release in releases {
            total_attachments += release.attachments.len();
            for attachment in &release.attachments {
                if let Some(checksum) = valid_checksum(attachment) {
                    *counts.entry(checksum.value().to_string()).or_insert(0) += 1;
                }
            }
        }

        let unique_files = counts.values().filter(|&&c| c == 1).count();
        let duplicate_files: usize = counts.values().filter(|&&c| c > 1).sum();
        let duplication_percentage = if total_attachments > 0 {
            round2(duplicate_files as f64 / total_attachments as f64 * 100.0)
        } else {
            0.0
        };

        let mut top: Vec<ChecksumOccurrence> = counts
            .iter()
            .filter(|(_, &c)| c > 1)
            .map(|(checksum, &occurrences)| ChecksumOccurrence {
                checksum: checksum.clone(),
                occurrences,
            })
            .collect();
        top.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| a.checksum.cmp(&b.checksum))
        });
        top.truncate(TOP_DUPLICATES);

        tracing::info!(
            "Duplication statistics: {:.2}% duplication ({} unique, {} duplicate files)",
            duplication_percentage,
            unique_files,
            duplicate_files
        );

        Self {
            analyzed_releases: releases.len(),
            total_attachments,
            unique_files,
            duplicate_files,
            unique_checksums: counts.len(),
            duplication_percentage,
            top_duplicates: top,
        }
    }
}

/// How far identical files are shared between components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentReuse {
    pub components_analyzed: usize,
    /// Checksums found in releases of more than one component
    pub cross_component_checksums: usize,
}

impl ComponentReuse {
    pub fn compute(releases: &[Release]) -> Self {
        let mut components: BTreeSet<&str> = BTreeSet::new();
        let mut by_checksum: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();

        for release in releases {
            components.insert(release.component_id.as_str());
            for attachment in &release.attachments {
                if let Some(checksum) = valid_checksum(attachment) {
                    by_checksum
                        .entry(checksum.value().to_string())
                        .or_default()
                        .insert(release.component_id.as_str());
                }
            }
        }

        Self {
            components_analyzed: components.len(),
            cross_component_checksums: by_checksum.values().filter(|c| c.len() > 1).count(),
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attachment;

    fn sha(c: char) -> String {
        std::iter::repeat(c).take(40).collect()
    }

    #[test]
    fn test_statistics_counts_and_percentage() {
        let r1 = Release::new("r1", "a", "1", "c1")
            .with_attachment(Attachment::new("1", "a").with_sha1(sha('a')))
            .with_attachment(Attachment::new("2", "b").with_sha1(sha('a')))
            .with_attachment(Attachment::new("3", "c").with_sha1(sha('b')));
        let r2 = Release::new("r2", "a", "2", "c2")
            .with_attachment(Attachment::new("4", "a").with_sha1(sha('a')))
            .with_attachment(Attachment::new("5", "d").with_sha1(sha('c')))
            .with_attachment(Attachment::new("6", "e").with_sha1(sha('c')))
            .with_attachment(Attachment::new("7", "no-checksum"));

        let stats = DuplicationStatistics::compute(&[r1.clone(), r2.clone()]);
        assert_eq!(stats.total_attachments, 7);
        assert_eq!(stats.unique_files, 1);
        assert_eq!(stats.duplicate_files, 5);
        assert_eq!(stats.unique_checksums, 3);
        assert_eq!(stats.duplication_percentage, 71.43);
        assert_eq!(stats.top_duplicates[0].checksum, sha('a'));
        assert_eq!(stats.top_duplicates[0].occurrences, 3);
        assert_eq!(stats.top_duplicates.len(), 2);

        let reuse = ComponentReuse::compute(&[r1, r2]);
        assert_eq!(reuse.components_analyzed, 2);
        assert_eq!(reuse.cross_component_checksums, 1);
    }

    #[test]
    fn test_top_duplicates_capped_at_ten() {
        let mut release = Release::new("r", "a", "1", "c");
        for (i, c) in "0123456789abcdef".chars().enumerate() {
            for j in 0..2 {
                release = release.with_attachment(
                    Attachment::new(format!("{}-{}", i, j), "f").with_sha1(sha(c)),
                );
            }
        }
        let stats = DuplicationStatistics::compute(&[release]);
        assert_eq!(stats.top_duplicates.len(), 10);
        assert_eq!(stats.duplication_percentage, 100.0);
    }

    #[test]
    fn test_empty_catalogue() {
        let stats = DuplicationStatistics::compute(&[]);
        assert_eq!(stats.total_attachments, 0);
        assert_eq!(stats.duplication_percentage, 0.0);
        assert!(stats.top_duplicates.is_empty());
    }
}
