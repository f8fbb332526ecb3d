//! Reusable clearing decisions
//!
//! A [`ReuseableDecision`] is a read-only projection of one donor
//! attachment/release pair. It is synthesized per analysis run and never
//! persisted on its own; what gets persisted is the audit entry and the
//! inheritance record built from it (see [`crate::evidence`]).

use crate::duplicates::{Checksum, ChecksumAlgorithm};
use crate::model::{Attachment, AttachmentType, ClearingState, Release};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ─── Decision Type ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReuseDecisionType {
    IdenticalFile,
    SimilarFile,
    ComponentLevel,
    LicenseConclusion,
    CopyrightStatement,
    ExportRestriction,
}

impl ReuseDecisionType {
    pub fn description(&self) -> &'static str {
        match self {
            Self::IdenticalFile => "File with identical checksum",
            Self::SimilarFile => "File with similar content structure",
            Self::ComponentLevel => "Component-wide clearing decision",
            Self::LicenseConclusion => "Specific license identification",
            Self::CopyrightStatement => "Copyright ownership statement",
            Self::ExportRestriction => "Export control classification",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdenticalFile => "IDENTICAL_FILE",
            Self::SimilarFile => "SIMILAR_FILE",
            Self::ComponentLevel => "COMPONENT_LEVEL",
            Self::LicenseConclusion => "LICENSE_CONCLUSION",
            Self::CopyrightStatement => "COPYRIGHT_STATEMENT",
            Self::ExportRestriction => "EXPORT_RESTRICTION",
        }
    }
}

impl fmt::Display for ReuseDecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Reuse Scope ───────────────────────────────────────────────────

/// Breadth at which a decision applies; lower priority = narrower
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReuseScope {
    #[default]
    FileLevel,
    ComponentLevel,
    ProjectLevel,
    OrganizationLevel,
}

impl ReuseScope {
    pub fn priority(&self) -> u8 {
        match self {
            Self::FileLevel => 1,
            Self::ComponentLevel => 2,
            Self::ProjectLevel => 3,
            Self::OrganizationLevel => 4,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::FileLevel => "Individual file",
            Self::ComponentLevel => "Entire component",
            Self::ProjectLevel => "Project scope",
            Self::OrganizationLevel => "Organization-wide",
        }
    }
}

// ─── Confidence ────────────────────────────────────────────────────

/// Ordered LOW < MEDIUM < HIGH, so `max`/`min` and comparisons follow the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn score(&self) -> u32 {
        match self {
            Self::High => 90,
            Self::Medium => 60,
            Self::Low => 30,
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::High => "Automatic inheritance recommended",
            Self::Medium => "Manual review recommended",
            Self::Low => "Manual verification required",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Decision ──────────────────────────────────────────────────────

/// Context copied from the donor at synthesis time
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecisionMetadata {
    pub filename: Option<String>,
    pub attachment_type: Option<AttachmentType>,
    pub source_release_name: Option<String>,
    pub source_release_version: Option<String>,
    pub source_component_id: Option<String>,
    pub clearing_state: Option<ClearingState>,
    pub upload_id: Option<String>,
}

/// A candidate clearing decision that may be inherited by an identical file.
///
/// `decision_type` and `confidence` are optional so that incomplete
/// decisions coming from outside the index can still be validated and
/// rejected with a readable error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReuseableDecision {
    pub source_release_id: String,
    pub source_attachment_id: String,
    pub checksum: String,
    pub checksum_type: Option<ChecksumAlgorithm>,
    pub decision_type: Option<ReuseDecisionType>,
    pub scope: ReuseScope,
    pub confidence: Option<ConfidenceLevel>,
    #[serde(default)]
    pub metadata: DecisionMetadata,
    pub created_date: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub comment: Option<String>,
    #[serde(default)]
    pub license_ids: Vec<String>,
    #[serde(default)]
    pub copyright_statements: Vec<String>,
    pub clearing_team: Option<String>,
    pub upload_id: Option<String>,
    #[serde(default)]
    pub additional_data: BTreeMap<String, String>,
    pub clearing_state: Option<ClearingState>,
    pub organization_id: Option<String>,
    #[serde(default)]
    pub approved: bool,
    pub reviewer_comments: Option<String>,
}

impl ReuseableDecision {
    /// An identical-file, file-level, HIGH confidence decision
    pub fn identical_file(
        source_release_id: impl Into<String>,
        source_attachment_id: impl Into<String>,
        checksum: &Checksum,
    ) -> Self {
        Self {
            source_release_id: source_release_id.into(),
            source_attachment_id: source_attachment_id.into(),
            checksum: checksum.value().to_string(),
            checksum_type: Some(checksum.algorithm()),
            decision_type: Some(ReuseDecisionType::IdenticalFile),
            scope: ReuseScope::FileLevel,
            confidence: Some(ConfidenceLevel::High),
            ..Default::default()
        }
    }

    /// Project a donor attachment of a donor release into a decision
    pub fn from_donor(
        release: &Release,
        attachment: &Attachment,
        checksum: &Checksum,
        organization_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let upload_id = attachment.upload_reference().map(str::to_string);
        let mut decision = Self::identical_file(&release.id, &attachment.attachment_content_id, checksum);

        decision.metadata = DecisionMetadata {
            filename: Some(attachment.filename.clone()),
            attachment_type: Some(attachment.attachment_type),
            source_release_name: Some(release.name.clone()),
            source_release_version: Some(release.version.clone()),
            source_component_id: Some(release.component_id.clone()),
            clearing_state: release.clearing_state,
            upload_id: upload_id.clone(),
        };
        decision.created_date = Some(release.created_on.unwrap_or(now));
        decision.created_by = Some(
            release
                .created_by
                .clone()
                .unwrap_or_else(|| "system".to_string()),
        );
        decision.comment = Some(format!(
            "Inherited via checksum match from {}",
            release.label()
        ));
        decision.license_ids = release.main_license_ids.clone();
        decision.clearing_team = release.clearing_team.clone();
        decision.upload_id = upload_id;
        decision.clearing_state = release.clearing_state;
        decision.organization_id = organization_id;
        decision.approved = release.clearing_state == Some(ClearingState::Approved);
        decision
    }

    /// Numeric score of the stated confidence, 0 when absent
    pub fn confidence_score(&self) -> u32 {
        self.confidence.map(|c| c.score()).unwrap_or(0)
    }

    pub fn filename(&self) -> Option<&str> {
        self.metadata.filename.as_deref()
    }

    /// Whole days between creation and `now`, if the creation date is known
    pub fn age_days_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.created_date.map(|created| (now - created).num_days())
    }

    // Builders, mostly for callers assembling decisions outside the index

    pub fn with_type(mut self, decision_type: ReuseDecisionType) -> Self {
        self.decision_type = Some(decision_type);
        self
    }

    pub fn with_confidence(mut self, confidence: ConfidenceLevel) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_licenses<I, S>(mut self, licenses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.license_ids = licenses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_created(mut self, date: DateTime<Utc>) -> Self {
        self.created_date = Some(date);
        self
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.metadata.filename = Some(filename.into());
        self
    }

    pub fn with_clearing_team(mut self, team: impl Into<String>) -> Self {
        self.clearing_team = Some(team.into());
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.approved = approved;
        self
    }
}
