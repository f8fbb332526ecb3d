//! Collaborator contracts
//!
//! The engine owns no storage. Everything it reads beyond already-loaded
//! releases, and everything it writes, goes through these traits. In-memory
//! implementations are provided for embedding and tests.

use crate::decision::ReuseableDecision;
use crate::duplicates::{normalize_checksum, ChecksumAlgorithm};
use crate::evidence::{AuditEntry, InheritanceApplicationRecord};
use crate::model::{Attachment, Release, User};
use crate::ReuseResult;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Catalogue-wide lookup of attachments by checksum
pub trait ChecksumRepository: Send + Sync {
    fn attachments_by_checksum(
        &self,
        checksum: &str,
        algorithm: ChecksumAlgorithm,
    ) -> ReuseResult<Vec<Attachment>>;
}

/// Persists inheritance records and the audit trail.
///
/// `store` returning `Ok(false)` or `Err` aborts that candidate's application.
pub trait InheritanceRecordSink: Send + Sync {
    fn store(&self, record: &InheritanceApplicationRecord) -> ReuseResult<bool>;

    fn append_audit(&self, _entry: &AuditEntry) -> ReuseResult<()> {
        Ok(())
    }
}

/// Best-effort update of a release's clearing status after an inheritance
pub trait ClearingStatusUpdater: Send + Sync {
    fn update(&self, release: &Release, decision: &ReuseableDecision, user: &User) -> ReuseResult<bool>;
}

/// Fire-and-forget inheritance notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, decision: &ReuseableDecision, release: &Release, user: &User) -> ReuseResult<()>;
}

/// The full set of collaborators the engine is wired with
#[derive(Clone)]
pub struct Collaborators {
    pub repository: Arc<dyn ChecksumRepository>,
    pub sink: Arc<dyn InheritanceRecordSink>,
    pub status_updater: Arc<dyn ClearingStatusUpdater>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// `repository` plus the in-memory sink, a no-op status updater and a logging notifier
    pub fn in_memory(repository: Arc<dyn ChecksumRepository>) -> Self {
        Self {
            repository,
            sink: Arc::new(RecordingSink::new()),
            status_updater: Arc::new(NoopStatusUpdater),
            notifier: Arc::new(LoggingNotifier),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn InheritanceRecordSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_status_updater(mut self, updater: Arc<dyn ClearingStatusUpdater>) -> Self {
        self.status_updater = updater;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

// ─── In-memory implementations ─────────────────────────────────────

/// Checksum repository over a fixed set of releases
#[derive(Debug, Default)]
pub struct InMemoryChecksumRepository {
    by_checksum: HashMap<(ChecksumAlgorithm, String), Vec<Attachment>>,
}

impl InMemoryChecksumRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_releases(releases: &[Release]) -> Self {
        let mut repo = Self::new();
        for release in releases {
            for attachment in &release.attachments {
                repo.insert(attachment.clone());
            }
        }
        repo
    }

    /// Index an attachment under every checksum it carries
    pub fn insert(&mut self, attachment: Attachment) {
        let known = [
            (ChecksumAlgorithm::Sha1, attachment.sha1.clone()),
            (ChecksumAlgorithm::Md5, attachment.md5.clone()),
            (ChecksumAlgorithm::Sha256, attachment.sha256.clone()),
        ];
        for (algorithm, value) in known {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                self.by_checksum
                    .entry((algorithm, normalize_checksum(&value)))
                    .or_default()
                    .push(attachment.clone());
            }
        }
    }
}

impl ChecksumRepository for InMemoryChecksumRepository {
    fn attachments_by_checksum(
        &self,
        checksum: &str,
        algorithm: ChecksumAlgorithm,
    ) -> ReuseResult<Vec<Attachment>> {
        Ok(self
            .by_checksum
            .get(&(algorithm, normalize_checksum(checksum)))
            .cloned()
            .unwrap_or_default())
    }
}

/// Sink that keeps every stored record and audit entry in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<InheritanceApplicationRecord>>,
    audit: Mutex<Vec<AuditEntry>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<InheritanceApplicationRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl InheritanceRecordSink for RecordingSink {
    fn store(&self, record: &InheritanceApplicationRecord) -> ReuseResult<bool> {
        match self.records.lock() {
            Ok(mut records) => {
                records.push(record.clone());
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    fn append_audit(&self, entry: &AuditEntry) -> ReuseResult<()> {
        if let Ok(mut audit) = self.audit.lock() {
            audit.push(entry.clone());
        }
        Ok(())
    }
}

/// Status updater that accepts every update without doing anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatusUpdater;

impl ClearingStatusUpdater for NoopStatusUpdater {
    fn update(&self, release: &Release, _decision: &ReuseableDecision, _user: &User) -> ReuseResult<bool> {
        tracing::debug!("Clearing status update skipped for release {}", release.id);
        Ok(true)
    }
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, decision: &ReuseableDecision, release: &Release, user: &User) -> ReuseResult<()> {
        tracing::info!(
            "Inheritance notification: {} -> {} by {}",
            decision.source_release_id,
            release.id,
            user.email_or_unknown()
        );
        Ok(())
    }
}
