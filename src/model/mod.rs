//! Catalogue entities consumed by the reuse engine
//!
//! Releases, their attachments and the acting user are loaded by the
//! surrounding document store; the engine only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Clearing State ────────────────────────────────────────────────

/// Clearing progress of a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClearingState {
    NewClearing,
    SentToClearingTool,
    UnderClearing,
    ReportAvailable,
    Approved,
}

impl ClearingState {
    /// Only releases in these states may donate decisions to the checksum index
    pub fn is_donor(&self) -> bool {
        matches!(self, Self::ReportAvailable | Self::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewClearing => "NEW_CLEARING",
            Self::SentToClearingTool => "SENT_TO_CLEARING_TOOL",
            Self::UnderClearing => "UNDER_CLEARING",
            Self::ReportAvailable => "REPORT_AVAILABLE",
            Self::Approved => "APPROVED",
        }
    }
}

impl fmt::Display for ClearingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Attachment ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentType {
    Source,
    SourceSelf,
    Binary,
    BinarySelf,
    ClearingReport,
    ComponentLicenseInfoXml,
    Document,
    #[default]
    Other,
}

impl fmt::Display for AttachmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Source => "SOURCE",
            Self::SourceSelf => "SOURCE_SELF",
            Self::Binary => "BINARY",
            Self::BinarySelf => "BINARY_SELF",
            Self::ClearingReport => "CLEARING_REPORT",
            Self::ComponentLicenseInfoXml => "COMPONENT_LICENSE_INFO_XML",
            Self::Document => "DOCUMENT",
            Self::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// A file owned by exactly one release.
///
/// `sha1` is the content-identity key used by every index and grouping;
/// `md5` and `sha256` are carried for cross-verification only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attachment {
    pub attachment_content_id: String,
    pub filename: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    /// Upload reference in the external clearing-analysis tool
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub attachment_type: AttachmentType,
}

impl Attachment {
    pub fn new(content_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            attachment_content_id: content_id.into(),
            filename: filename.into(),
            ..Default::default()
        }
    }

    pub fn with_sha1(mut self, sha1: impl Into<String>) -> Self {
        self.sha1 = Some(sha1.into());
        self
    }

    pub fn with_upload_id(mut self, upload_id: impl Into<String>) -> Self {
        self.upload_id = Some(upload_id.into());
        self
    }

    pub fn with_type(mut self, attachment_type: AttachmentType) -> Self {
        self.attachment_type = attachment_type;
        self
    }

    /// Primary checksum, if present and not blank
    pub fn checksum(&self) -> Option<&str> {
        non_blank(self.sha1.as_deref())
    }

    pub fn upload_reference(&self) -> Option<&str> {
        non_blank(self.upload_id.as_deref())
    }
}

// ─── Release ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub name: String,
    pub version: String,
    pub component_id: String,
    #[serde(default)]
    pub clearing_state: Option<ClearingState>,
    #[serde(default)]
    pub main_license_ids: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub clearing_team: Option<String>,
}

impl Release {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        component_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            component_id: component_id.into(),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: ClearingState) -> Self {
        self.clearing_state = Some(state);
        self
    }

    pub fn with_licenses<I, S>(mut self, licenses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.main_license_ids = licenses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn is_donor(&self) -> bool {
        self.clearing_state.map(|s| s.is_donor()).unwrap_or(false)
    }

    /// "name version" label used in comments and logs
    pub fn label(&self) -> String {
        format!("{} {}", self.name, self.version)
    }
}

// ─── User ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserGroup {
    User,
    Admin,
    ClearingAdmin,
    ClearingExpert,
    EccAdmin,
    SecurityAdmin,
    SwAdmin,
}

impl UserGroup {
    pub fn is_clearing_role(&self) -> bool {
        matches!(self, Self::Admin | Self::ClearingAdmin | Self::ClearingExpert)
    }
}

impl fmt::Display for UserGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::ClearingAdmin => "CLEARING_ADMIN",
            Self::ClearingExpert => "CLEARING_EXPERT",
            Self::EccAdmin => "ECC_ADMIN",
            Self::SecurityAdmin => "SECURITY_ADMIN",
            Self::SwAdmin => "SW360_ADMIN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub group: Option<UserGroup>,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>, group: UserGroup) -> Self {
        Self {
            id: id.into(),
            email: Some(email.into()),
            department: None,
            group: Some(group),
        }
    }

    pub fn email_or_unknown(&self) -> &str {
        self.email.as_deref().unwrap_or("unknown")
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
