//! End-to-end reuse scenarios over in-memory collaborators

use chrono::{DateTime, Duration, TimeZone, Utc};
use clearing_reuse::collaborators::{Collaborators, InMemoryChecksumRepository, RecordingSink};
use clearing_reuse::engine::{ChecksumIndex, ReuseCandidates, RiskLevel};
use clearing_reuse::*;
use std::collections::BTreeMap;
use std::sync::Arc;

const SHA: &str = "abc1230000000000000000000000000000000000";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
}

fn donor(id: &str, licenses: &[&str]) -> Release {
    let mut release = Release::new(id, "zlib", "1.2.13", "comp-zlib")
        .with_state(ClearingState::Approved)
        .with_licenses(licenses.iter().copied())
        .with_attachment(
            Attachment::new(format!("{}-src", id), "zlib.tar.gz")
                .with_sha1(SHA)
                .with_upload_id(format!("upload-{}", id)),
        );
    release.created_on = Some(now() - Duration::days(10));
    release
}

fn target(licenses: &[&str]) -> Release {
    Release::new("target", "zlib", "1.3", "comp-zlib")
        .with_state(ClearingState::UnderClearing)
        .with_licenses(licenses.iter().copied())
        .with_attachment(Attachment::new("target-src", "zlib.tar.gz").with_sha1(SHA.to_uppercase()))
}

fn reuse_with(sink: Arc<RecordingSink>) -> ClearingDecisionReuse {
    let collaborators = Collaborators::in_memory(Arc::new(InMemoryChecksumRepository::new())).with_sink(sink);
    ClearingDecisionReuse::new(Arc::new(PolicyEngine::default()), &EngineConfig::default(), collaborators)
}

fn expert() -> User {
    User::new("e1", "expert@example.com", UserGroup::ClearingExpert)
}

#[test]
fn conflicting_license_blocks_inheritance() {
    let sink = Arc::new(RecordingSink::new());
    let reuse = reuse_with(sink.clone());
    let sources = vec![donor("donor-a", &["MIT"])];
    let target = target(&["GPL-2.0"]);

    let index = ChecksumIndex::build_at(&sources, &expert(), reuse.policy(), now());
    let candidates = index.candidates(SHA);
    assert_eq!(candidates.len(), 1, "donor decision is found");
    assert_eq!(candidates[0].confidence, Some(ConfidenceLevel::High));

    let outcome = reuse.validate_at(&candidates[0], &target, &expert(), now());
    assert!(!outcome.valid);
    assert_eq!(outcome.confidence, ConfidenceLevel::Low);
    assert_eq!(outcome.risk_level, RiskLevel::High);
    assert!(outcome.errors.iter().any(|e| e.contains("MIT") && e.contains("GPL-2.0")));
    assert!(!outcome.metrics.license_validation);

    let mut decisions = ReuseCandidates::new();
    decisions.insert(SHA.to_string(), candidates.to_vec());
    let report = reuse.apply_inheritance_at(&target, &decisions, &expert(), now());
    assert_eq!(report.applied_decisions, 0);
    assert!(sink.records().is_empty(), "no inheritance record");

    let found = reuse.find_reuseable_decisions_at(&target, &sources, &expert(), now());
    assert!(found.is_empty(), "finder filters the conflict out as well");
}

#[test]
fn plain_user_cannot_inherit_export_restriction() {
    let reuse = reuse_with(Arc::new(RecordingSink::new()));
    let checksum = Checksum::parse(SHA).unwrap();
    let decision = ReuseableDecision::identical_file("donor-a", "donor-a-src", &checksum)
        .with_type(ReuseDecisionType::ExportRestriction)
        .with_created(now() - Duration::days(1));
    let user = User::new("u1", "dev@example.com", UserGroup::User);

    let outcome = reuse.validate_at(&decision, &target(&[]), &user, now());
    assert!(!outcome.valid);
    assert!(outcome
        .errors
        .iter()
        .any(|e| e.contains("not authorized to inherit export restriction")));
    assert!(!outcome.can_auto_apply);
    assert!(outcome.requires_manual_review);
    assert!(!outcome.metrics.authorization_validation);
}

#[test]
fn at_most_one_decision_is_applied_per_checksum() {
    let sink = Arc::new(RecordingSink::new());
    let reuse = reuse_with(sink.clone());
    let sources = vec![donor("d1", &["MIT"]), donor("d2", &["MIT"]), donor("d3", &["MIT"])];
    let target = target(&["MIT"]);

    let found = reuse.find_reuseable_decisions_at(&target, &sources, &expert(), now());
    assert_eq!(found[SHA].len(), 3);

    let report = reuse.apply_inheritance_at(&target, &found, &expert(), now());
    assert_eq!(report.total_decisions, 3);
    assert_eq!(report.applied_decisions, 1);
    assert_eq!(report.skipped_decisions, 0);
    assert_eq!(sink.records().len(), 1);
    assert_eq!(report.details[SHA].audit_trail.len(), 1, "later candidates are never attempted");
    assert!(report.audit_trail.iter().all(AuditEntry::verify_integrity));
}

#[test]
fn cache_short_circuits_within_freshness_window() {
    let sink = Arc::new(RecordingSink::new());
    let reuse = reuse_with(sink.clone());
    let sources = vec![donor("d1", &["MIT"])];
    let target = target(&["MIT"]);

    let found = reuse.find_reuseable_decisions_at(&target, &sources, &expert(), now());
    reuse.apply_inheritance_at(&target, &found, &expert(), now());
    assert_eq!(sink.records().len(), 1);

    let rerun = reuse.apply_inheritance_at(&target, &found, &expert(), now() + Duration::hours(23));
    assert_eq!(rerun.already_satisfied, 1);
    assert_eq!(rerun.applied_decisions, 0);
    assert_eq!(sink.records().len(), 1, "no new record inside the window");

    let after = now() + Duration::hours(25);
    let refound = reuse.find_reuseable_decisions_at(&target, &sources, &expert(), after);
    assert_eq!(refound.len(), 1, "re-evaluated once the entry is stale");
    let reapplied = reuse.apply_inheritance_at(&target, &refound, &expert(), after);
    assert_eq!(reapplied.applied_decisions, 1);
    assert_eq!(sink.records().len(), 2);
}

#[test]
fn ranking_prefers_confidence_then_recency() {
    let checksum = Checksum::parse(SHA).unwrap();
    let base = ReuseableDecision::identical_file("d", "a", &checksum);
    let high_old = base.clone().with_created(now() - Duration::days(200));
    let high_new = base.clone().with_created(now() - Duration::days(2));
    let medium_new = base
        .with_confidence(ConfidenceLevel::Medium)
        .with_created(now() - Duration::days(1));

    let mut list = vec![medium_new.clone(), high_old.clone(), high_new.clone()];
    list.sort_by(clearing_reuse::engine::ranking::compare_priority);
    assert_eq!(list, vec![high_new, high_old, medium_new]);
}

#[test]
fn within_release_duplicates_form_one_group() {
    let release = Release::new("r", "pkg", "1", "c")
        .with_attachment(Attachment::new("a1", "pkg.zip").with_sha1(SHA))
        .with_attachment(Attachment::new("a2", "pkg-mirror.zip").with_sha1(SHA));
    let detector = DuplicateDetector::new(Arc::new(InMemoryChecksumRepository::new()));
    let groups: BTreeMap<String, Vec<Attachment>> = detector.detect_in_release(&release);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[SHA].len(), 2);
}

#[test]
fn checksum_format_classification() {
    assert_eq!(validate_checksum_format(&"a".repeat(32)), Some(ChecksumAlgorithm::Md5));
    assert_eq!(validate_checksum_format(&format!("  {}  ", "B".repeat(40))), Some(ChecksumAlgorithm::Sha1));
    assert_eq!(validate_checksum_format(&"0".repeat(64)), Some(ChecksumAlgorithm::Sha256));
    assert_eq!(validate_checksum_format(&"g".repeat(40)), None);
    assert_eq!(validate_checksum_format(&"a".repeat(41)), None);
    assert_eq!(validate_checksum_format(""), None);
}

#[test]
fn validation_never_recovers_with_more_errors() {
    let reuse = reuse_with(Arc::new(RecordingSink::new()));
    let checksum = Checksum::parse(SHA).unwrap();
    let clean = ReuseableDecision::identical_file("d", "a", &checksum)
        .with_licenses(["MIT"])
        .with_created(now() - Duration::days(3));
    let target = target(&["MIT"]);

    let baseline = reuse.validate_at(&clean, &target, &expert(), now());
    assert!(baseline.valid);
    assert_eq!(baseline.confidence, ConfidenceLevel::High);
    assert!(baseline.can_auto_apply);

    let mut broken = clean.clone();
    broken.checksum = "zz".into();
    let worse = reuse.validate_at(&broken, &target, &expert(), now());
    assert!(!worse.valid);
    assert!(worse.confidence <= baseline.confidence);

    let worse_still = reuse.validate_at(&broken.with_licenses(["GPL-3.0", "MIT"]), &target, &expert(), now());
    assert!(!worse_still.valid);
    assert!(worse_still.confidence <= worse.confidence);
}
