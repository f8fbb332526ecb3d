//! # clearing-reuse — Clearing Decision Reuse Engine
//!
//! Decides, for every file of a target release, whether a license-clearing
//! decision already made for a byte-identical file elsewhere in the catalogue
//! can be inherited, how confident that reuse is, and whether it is safe to
//! apply automatically.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ReuseManager                          │
//! │  ┌────────────┐ ┌──────────────┐ ┌────────────────────────┐  │
//! │  │ Duplicate  │ │ Checksum     │ │ Batch executor         │  │
//! │  │ Detector   │ │ Index        │ │ (bounded worker pool)  │  │
//! │  └─────┬──────┘ └──────┬───────┘ └───────────┬────────────┘  │
//! │        │               │                     │               │
//! │  ┌─────▼───────────────▼─────────────────────▼────────────┐  │
//! │  │ Rank → Filter → Validate (9 rules) → Apply → Cache     │  │
//! │  │       Audit trail (SHA-256 anchored, append-only)      │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Capabilities
//!
//! - **Checksum Index**: donor decisions from REPORT_AVAILABLE / APPROVED releases
//! - **Duplicate Detection**: within a release, across releases, via the checksum repository
//! - **Ranking**: deterministic multi-factor total order over candidate decisions
//! - **Validation Pipeline**: rule sequence producing errors, warnings and adjusted confidence
//! - **Inheritance**: at most one applied decision per checksum, with a 24h success cache
//! - **Batch Analysis**: chunked, concurrent single-release analysis with aggregate counts
//! - **Policy**: `.clearing-reuse.toml` for conflict pairs, age limits and organization domains
//!
//! Persistence, notification delivery and status updates are collaborators
//! supplied by the embedding service (see [`collaborators`]).

pub mod collaborators;
pub mod decision;
pub mod duplicates;
pub mod engine;
pub mod evidence;
pub mod license;
pub mod model;
pub mod policy;

// Re-exports for convenience
pub use collaborators::{ChecksumRepository, ClearingStatusUpdater, InheritanceRecordSink, Notifier};
pub use decision::{ConfidenceLevel, ReuseDecisionType, ReuseScope, ReuseableDecision};
pub use duplicates::{validate_checksum_format, Checksum, ChecksumAlgorithm, DuplicateDetector};
pub use engine::{ClearingDecisionReuse, EngineConfig, ReleaseAnalysis, ReuseManager};
pub use evidence::{AuditEntry, InheritanceApplicationRecord};
pub use license::LicenseId;
pub use model::{Attachment, AttachmentType, ClearingState, Release, User, UserGroup};
pub use policy::{PolicyConfig, PolicyEngine};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReuseError {
    #[error("Invalid checksum: {0}")]
    InvalidChecksum(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Policy file parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type ReuseResult<T> = Result<T, ReuseError>;
