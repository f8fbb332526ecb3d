//! # Reuse Engine — Orchestrator
//!
//! The reuse pipeline is split into:
//!
//! - `index` — donor decisions keyed by checksum
//! - `ranking` — applicability filter, total-order comparator, policy filter
//! - `validation` — rule sequence producing a `ValidationOutcome`
//! - `inheritance` — at-most-one application per checksum with audit trail
//! - `cache` — 24h inheritance cache shared by finder and applier
//! - `reuse` — `ClearingDecisionReuse`, the find/validate/apply facade
//! - `batch` — chunked concurrent release analysis
//!
//! `ReuseManager` ties these to the duplicate detector for single-release
//! analysis, catalogue statistics and optimization recommendations.

pub mod batch;
pub mod cache;
pub mod index;
pub mod inheritance;
pub mod ranking;
pub mod reuse;
pub mod validation;

pub use batch::{BatchReport, BatchResult, BatchStatus};
pub use cache::{InheritanceCache, InheritanceRecord};
pub use index::ChecksumIndex;
pub use inheritance::{ChecksumApplication, InheritanceApplier, InheritanceReport, OverallStatus};
pub use reuse::{ClearingDecisionReuse, ReuseCandidates};
pub use validation::{DecisionValidator, ErrorCategory, RiskLevel, ValidationOutcome};

use crate::collaborators::{ChecksumRepository, Collaborators};
use crate::duplicates::statistics::round2;
use crate::duplicates::{
    valid_checksum, ComponentReuse, DuplicateDetector, DuplicationStatistics, MatchInfo,
};
use crate::model::{Attachment, Release, User};
use crate::policy::PolicyEngine;
use crate::ReuseResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ─── Configuration ─────────────────────────────────────────────────

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Releases per batch chunk
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Concurrent release analyses within a chunk
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// How long a successful inheritance short-circuits re-application
    #[serde(default = "default_cache_freshness_hours")]
    pub cache_freshness_hours: i64,
    /// Cap on ranked candidates kept per checksum
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

fn default_batch_size() -> usize {
    100
}
fn default_max_concurrency() -> usize {
    5
}
fn default_cache_freshness_hours() -> i64 {
    24
}
fn default_max_candidates() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            cache_freshness_hours: default_cache_freshness_hours(),
            max_candidates: default_max_candidates(),
        }
    }
}

// ─── Analysis Results ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Completed,
    Error,
}

/// Reuse-potential bands over the external-match percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReuseClass {
    Excellent,
    High,
    Medium,
    Low,
    None,
}

impl ReuseClass {
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            Self::Excellent
        } else if score >= 50.0 {
            Self::High
        } else if score >= 25.0 {
            Self::Medium
        } else if score > 0.0 {
            Self::Low
        } else {
            Self::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReusePotential {
    pub total_files: usize,
    pub files_with_checksums: usize,
    /// Files whose checksum occurs more than once in the catalogue
    pub files_with_external_matches: usize,
    /// files_with_external_matches / total_files × 100, 2 decimals
    pub score: f64,
    pub classification: ReuseClass,
}

impl ReusePotential {
    /// Share of the release's files found more than once in the catalogue,
    /// taken from the release's already-fetched catalogue matches
    pub fn compute(release: &Release, catalogue_matches: &BTreeMap<String, Vec<MatchInfo>>) -> Self {
        let total_files = release.attachments.len();
        let files_with_checksums = release
            .attachments
            .iter()
            .filter(|a| a.checksum().is_some())
            .count();
        let files_with_external_matches = release
            .attachments
            .iter()
            .filter_map(valid_checksum)
            .filter(|c| catalogue_matches.get(c.value()).map_or(false, |m| m.len() > 1))
            .count();

        let score = if total_files > 0 {
            round2(files_with_external_matches as f64 / total_files as f64 * 100.0)
        } else {
            0.0
        };

        Self {
            total_files,
            files_with_checksums,
            files_with_external_matches,
            score,
            classification: ReuseClass::from_score(score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadCorrelation {
    pub has_uploads: bool,
    pub total_attachments: usize,
    pub attachments_with_uploads: usize,
    pub upload_ids: Vec<String>,
    pub upload_percentage: f64,
}

impl UploadCorrelation {
    pub fn compute(release: &Release) -> Self {
        let upload_ids: Vec<String> = release
            .attachments
            .iter()
            .filter_map(Attachment::upload_reference)
            .map(str::to_string)
            .collect();
        let total = release.attachments.len();
        let percentage = if total > 0 {
            round2(upload_ids.len() as f64 / total as f64 * 100.0)
        } else {
            0.0
        };
        Self {
            has_uploads: !upload_ids.is_empty(),
            total_attachments: total,
            attachments_with_uploads: upload_ids.len(),
            upload_ids,
            upload_percentage: percentage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    HighReusePotential,
    ExternalDuplicates,
    CrossReleaseReuse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub description: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_count: Option<usize>,
}

/// Result of analysing one release. Analysis never fails; collaborator
/// errors land in `status` / `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAnalysis {
    pub release_id: String,
    pub release_label: String,
    pub analyzed_by: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    pub internal_duplicates: BTreeMap<String, Vec<Attachment>>,
    pub internal_duplicate_count: usize,
    pub external_duplicates: BTreeMap<String, Vec<MatchInfo>>,
    pub external_duplicate_count: usize,
    pub reuse_potential: Option<ReusePotential>,
    pub upload_correlation: Option<UploadCorrelation>,
    pub recommendations: Vec<Recommendation>,
    pub status: AnalysisStatus,
    pub error: Option<String>,
}

impl ReleaseAnalysis {
    fn empty(release: &Release, user: &User) -> Self {
        Self {
            release_id: release.id.clone(),
            release_label: release.label(),
            analyzed_by: user.email.clone(),
            analyzed_at: Utc::now(),
            internal_duplicates: BTreeMap::new(),
            internal_duplicate_count: 0,
            external_duplicates: BTreeMap::new(),
            external_duplicate_count: 0,
            reuse_potential: None,
            upload_correlation: None,
            recommendations: Vec::new(),
            status: AnalysisStatus::Completed,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Completed
    }
}

// ─── Catalogue Results ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStatistics {
    pub releases_with_uploads: usize,
    pub total_uploads: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueStatistics {
    pub total_releases: usize,
    pub duplication: DuplicationStatistics,
    pub component_reuse: ComponentReuse,
    pub uploads: UploadStatistics,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    pub kind: RecommendationKind,
    pub checksum: String,
    pub affected_releases: Vec<String>,
    pub total_occurrences: usize,
    pub priority: Priority,
    pub description: String,
}

// ─── Manager ───────────────────────────────────────────────────────

/// Entry point for release analysis and decision reuse
pub struct ReuseManager {
    config: EngineConfig,
    detector: DuplicateDetector,
    reuse: ClearingDecisionReuse,
}

impl ReuseManager {
    pub fn new(config: EngineConfig, policy: Arc<PolicyEngine>, collaborators: Collaborators) -> Self {
        let repository: Arc<dyn ChecksumRepository> = collaborators.repository.clone();
        let reuse = ClearingDecisionReuse::new(policy, &config, collaborators);
        Self {
            config,
            detector: DuplicateDetector::new(repository),
            reuse,
        }
    }

    /// Duplicate, reuse-potential and upload analysis for one release
    pub fn analyze_release(&self, release: &Release, user: &User) -> ReleaseAnalysis {
        tracing::info!(
            "Performing reuse analysis for release {} by user {}",
            release.id,
            user.email_or_unknown()
        );

        let mut analysis = ReleaseAnalysis::empty(release, user);
        match self.run_analysis(release, &mut analysis) {
            Ok(()) => {
                tracing::info!(
                    "Completed reuse analysis for release {}: {} internal, {} external duplicates",
                    release.id,
                    analysis.internal_duplicate_count,
                    analysis.external_duplicate_count
                );
            }
            Err(e) => {
                tracing::error!("Error performing reuse analysis for release {}: {}", release.id, e);
                analysis.status = AnalysisStatus::Error;
                analysis.error = Some(e.to_string());
            }
        }
        analysis
    }

    fn run_analysis(&self, release: &Release, analysis: &mut ReleaseAnalysis) -> ReuseResult<()> {
        analysis.internal_duplicates = self.detector.detect_in_release(release);
        analysis.internal_duplicate_count = analysis.internal_duplicates.len();

        let checksums: Vec<&str> = release.attachments.iter().filter_map(Attachment::checksum).collect();
        analysis.external_duplicates = self.detector.find_by_checksums(&checksums)?;
        analysis.external_duplicate_count = analysis.external_duplicates.len();

        let potential = ReusePotential::compute(release, &analysis.external_duplicates);
        analysis.recommendations =
            recommendations(potential.score, analysis.external_duplicate_count);
        analysis.reuse_potential = Some(potential);
        analysis.upload_correlation = Some(UploadCorrelation::compute(release));
        Ok(())
    }

    /// Duplication, component reuse and upload counts over `releases`
    pub fn comprehensive_statistics(&self, releases: &[Release]) -> CatalogueStatistics {
        tracing::info!("Generating comprehensive reuse statistics for {} releases", releases.len());

        let releases_with_uploads = releases
            .iter()
            .filter(|r| r.attachments.iter().any(|a| a.upload_reference().is_some()))
            .count();
        let total_uploads = releases
            .iter()
            .flat_map(|r| r.attachments.iter())
            .filter(|a| a.upload_reference().is_some())
            .count();

        CatalogueStatistics {
            total_releases: releases.len(),
            duplication: self.detector.statistics(releases),
            component_reuse: ComponentReuse::compute(releases),
            uploads: UploadStatistics {
                releases_with_uploads,
                total_uploads,
            },
            generated_at: Utc::now(),
        }
    }

    /// One recommendation per checksum shared by more than one release,
    /// highest priority first
    pub fn optimization_recommendations(&self, releases: &[Release]) -> Vec<OptimizationRecommendation> {
        let mut recommendations: Vec<OptimizationRecommendation> = self
            .detector
            .detect_across_releases(releases)
            .into_iter()
            .filter(|(_, by_release)| by_release.len() > 1)
            .map(|(checksum, by_release)| {
                let total_occurrences = by_release.values().map(Vec::len).sum();
                OptimizationRecommendation {
                    kind: RecommendationKind::CrossReleaseReuse,
                    checksum,
                    affected_releases: by_release.into_keys().collect(),
                    total_occurrences,
                    priority: occurrence_priority(total_occurrences),
                    description: "File appears in multiple releases - candidate for reuse optimization"
                        .into(),
                }
            })
            .collect();
        recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));

        tracing::info!("Generated {} optimization recommendations", recommendations.len());
        recommendations
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn detector(&self) -> &DuplicateDetector {
        &self.detector
    }

    pub fn reuse(&self) -> &ClearingDecisionReuse {
        &self.reuse
    }
}

fn recommendations(score: f64, external_duplicates: usize) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if score > 50.0 {
        out.push(Recommendation {
            kind: RecommendationKind::HighReusePotential,
            description: "Release has high reuse potential - consider enabling automatic decision reuse"
                .into(),
            priority: Priority::High,
            score: Some(score),
            duplicate_count: None,
        });
    }
    if external_duplicates > 5 {
        out.push(Recommendation {
            kind: RecommendationKind::ExternalDuplicates,
            description: "Multiple files have duplicates in other releases - optimize reuse".into(),
            priority: Priority::Medium,
            score: None,
            duplicate_count: Some(external_duplicates),
        });
    }
    out
}

fn occurrence_priority(occurrences: usize) -> Priority {
    if occurrences >= 10 {
        Priority::High
    } else if occurrences >= 5 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemoryChecksumRepository;
    use crate::model::UserGroup;
    use crate::{ChecksumAlgorithm, ReuseError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sha(c: char) -> String {
        std::iter::repeat(c).take(40).collect()
    }

    fn manager(catalogue: &[Release]) -> ReuseManager {
        let repository = Arc::new(InMemoryChecksumRepository::from_releases(catalogue));
        ReuseManager::new(
            EngineConfig::default(),
            Arc::new(PolicyEngine::default()),
            Collaborators::in_memory(repository),
        )
    }

    fn user() -> User {
        User::new("u1", "analyst@example.com", UserGroup::ClearingExpert)
    }

    struct BrokenRepository;

    impl ChecksumRepository for BrokenRepository {
        fn attachments_by_checksum(&self, _: &str, _: ChecksumAlgorithm) -> ReuseResult<Vec<Attachment>> {
            Err(ReuseError::Collaborator("repository offline".into()))
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.cache_freshness_hours, 24);
        assert_eq!(config.max_candidates, 10);

        let partial: EngineConfig = serde_json::from_str(r#"{"batch_size": 20}"#).unwrap();
        assert_eq!(partial.batch_size, 20);
        assert_eq!(partial.max_concurrency, 5);
    }

    #[test]
    fn test_classification_bands() {
        assert_eq!(ReuseClass::from_score(80.0), ReuseClass::Excellent);
        assert_eq!(ReuseClass::from_score(75.0), ReuseClass::Excellent);
        assert_eq!(ReuseClass::from_score(50.0), ReuseClass::High);
        assert_eq!(ReuseClass::from_score(25.0), ReuseClass::Medium);
        assert_eq!(ReuseClass::from_score(0.01), ReuseClass::Low);
        assert_eq!(ReuseClass::from_score(0.0), ReuseClass::None);
    }

    #[test]
    fn test_analyze_release() {
        let target = Release::new("t", "lib", "2", "c1")
            .with_attachment(Attachment::new("t1", "a.jar").with_sha1(sha('a')).with_upload_id("up-1"))
            .with_attachment(Attachment::new("t2", "a-copy.jar").with_sha1(sha('a')))
            .with_attachment(Attachment::new("t3", "b.jar").with_sha1(sha('b')))
            .with_attachment(Attachment::new("t4", "notes.txt"));
        let other = Release::new("o", "lib", "1", "c1")
            .with_attachment(Attachment::new("o1", "b.jar").with_sha1(sha('b')));
        let mgr = manager(&[target.clone(), other]);

        let analysis = mgr.analyze_release(&target, &user());
        assert!(analysis.is_success());
        assert_eq!(analysis.analyzed_by.as_deref(), Some("analyst@example.com"));
        assert_eq!(analysis.internal_duplicate_count, 1);
        assert_eq!(analysis.external_duplicate_count, 2, "self matches are kept");

        let potential = analysis.reuse_potential.unwrap();
        assert_eq!(potential.total_files, 4);
        assert_eq!(potential.files_with_checksums, 3);
        assert_eq!(potential.files_with_external_matches, 3);
        assert_eq!(potential.score, 75.0);
        assert_eq!(potential.classification, ReuseClass::Excellent);

        let uploads = analysis.upload_correlation.unwrap();
        assert!(uploads.has_uploads);
        assert_eq!(uploads.upload_ids, vec!["up-1"]);
        assert_eq!(uploads.upload_percentage, 25.0);

        assert_eq!(analysis.recommendations.len(), 1);
        assert_eq!(analysis.recommendations[0].kind, RecommendationKind::HighReusePotential);
        assert_eq!(analysis.recommendations[0].score, Some(75.0));
    }

    /// Counts lookups, delegating to an in-memory catalogue
    struct CountingRepository {
        inner: InMemoryChecksumRepository,
        calls: AtomicUsize,
    }

    impl ChecksumRepository for CountingRepository {
        fn attachments_by_checksum(&self, checksum: &str, algorithm: ChecksumAlgorithm) -> ReuseResult<Vec<Attachment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.attachments_by_checksum(checksum, algorithm)
        }
    }

    #[test]
    fn test_one_repository_lookup_per_checksum() {
        let target = Release::new("t", "lib", "2", "c1")
            .with_attachment(Attachment::new("t1", "a.jar").with_sha1(sha('a')))
            .with_attachment(Attachment::new("t2", "b.jar").with_sha1(sha('b')))
            .with_attachment(Attachment::new("t3", "c.jar").with_sha1("short"));
        let other = Release::new("o", "lib", "1", "c1")
            .with_attachment(Attachment::new("o1", "a.jar").with_sha1(sha('a')));
        let repository = Arc::new(CountingRepository {
            inner: InMemoryChecksumRepository::from_releases(&[target.clone(), other]),
            calls: AtomicUsize::new(0),
        });
        let mgr = ReuseManager::new(
            EngineConfig::default(),
            Arc::new(PolicyEngine::default()),
            Collaborators::in_memory(repository.clone()),
        );

        let analysis = mgr.analyze_release(&target, &user());
        assert_eq!(repository.calls.load(Ordering::SeqCst), 2, "invalid checksum is never looked up");
        let potential = analysis.reuse_potential.unwrap();
        assert_eq!(potential.files_with_external_matches, 1);
        assert_eq!(potential.score, 33.33);
        assert_eq!(potential.classification, ReuseClass::Medium);
    }

    #[test]
    fn test_release_without_attachments() {
        let mgr = manager(&[]);
        let analysis = mgr.analyze_release(&Release::new("e", "empty", "0", "c"), &user());
        assert!(analysis.is_success());
        let potential = analysis.reuse_potential.unwrap();
        assert_eq!(potential.score, 0.0);
        assert_eq!(potential.classification, ReuseClass::None);
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn test_repository_failure_is_reported_not_raised() {
        let mgr = ReuseManager::new(
            EngineConfig::default(),
            Arc::new(PolicyEngine::default()),
            Collaborators::in_memory(Arc::new(BrokenRepository)),
        );
        let release = Release::new("r", "x", "1", "c")
            .with_attachment(Attachment::new("a", "x.jar").with_sha1(sha('c')));
        let analysis = mgr.analyze_release(&release, &user());
        assert_eq!(analysis.status, AnalysisStatus::Error);
        assert!(analysis.error.unwrap().contains("repository offline"));
    }

    #[test]
    fn test_external_duplicates_recommendation() {
        let mut target = Release::new("t", "big", "1", "c");
        for (i, c) in ['1', '2', '3', '4', '5', '6'].iter().enumerate() {
            target = target.with_attachment(Attachment::new(format!("a{}", i), format!("f{}.c", i)).with_sha1(sha(*c)));
        }
        let mgr = manager(&[target.clone()]);
        let analysis = mgr.analyze_release(&target, &user());
        assert_eq!(analysis.external_duplicate_count, 6);
        assert_eq!(analysis.reuse_potential.as_ref().unwrap().score, 0.0);
        assert_eq!(analysis.recommendations.len(), 1);
        assert_eq!(analysis.recommendations[0].kind, RecommendationKind::ExternalDuplicates);
        assert_eq!(analysis.recommendations[0].duplicate_count, Some(6));
    }

    #[test]
    fn test_statistics_and_optimization() {
        let mut releases = Vec::new();
        for i in 0..10 {
            let mut r = Release::new(format!("r{}", i), "lib", i.to_string(), format!("c{}", i % 2))
                .with_attachment(Attachment::new(format!("x{}", i), "common.jar").with_sha1(sha('a')));
            if i < 3 {
                r = r.with_attachment(Attachment::new(format!("y{}", i), "shared.jar").with_sha1(sha('b')).with_upload_id("u"));
            }
            if i < 5 {
                r = r.with_attachment(Attachment::new(format!("z{}", i), "mid.jar").with_sha1(sha('d')));
            }
            releases.push(r);
        }
        let mgr = manager(&releases);

        let stats = mgr.comprehensive_statistics(&releases);
        assert_eq!(stats.total_releases, 10);
        assert_eq!(stats.duplication.total_attachments, 18);
        assert_eq!(stats.component_reuse.components_analyzed, 2);
        assert_eq!(stats.uploads.releases_with_uploads, 3);
        assert_eq!(stats.uploads.total_uploads, 3);

        let recs = mgr.optimization_recommendations(&releases);
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[0].checksum, sha('a'));
        assert_eq!(recs[0].total_occurrences, 10);
        assert_eq!(recs[1].priority, Priority::Medium);
        assert_eq!(recs[2].priority, Priority::Low);
        assert_eq!(recs[2].affected_releases, vec!["r0", "r1", "r2"]);
    }
}
