//! Reuse policy — `.clearing-reuse.toml` configuration
//!
//! Holds the knobs that decide whether a donor decision is still acceptable
//! for a target: license pairs that must never be combined, age limits,
//! organization boundaries and the file-type families treated as
//! interchangeable.

use crate::license::LicenseConflictSet;
use crate::model::User;
use crate::ReuseResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Organization assigned to users without an email address
pub const UNKNOWN_ORGANIZATION: &str = "unknown.org";

/// Reuse policy (loaded from `.clearing-reuse.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Decisions older than this are dropped by advanced filtering
    #[serde(default = "default_expiry_days")]
    pub decision_expiry_days: i64,

    /// Decisions older than this get an age warning
    #[serde(default = "default_age_warning_days")]
    pub age_warning_days: i64,

    /// Unordered license pairs that must not be combined
    #[serde(default = "default_conflicts")]
    pub conflicting_licenses: Vec<(String, String)>,

    /// Organization id -> email domains belonging to it
    #[serde(default)]
    pub organization_domains: BTreeMap<String, Vec<String>>,

    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,

    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
}

fn default_expiry_days() -> i64 {
    1095
}
fn default_age_warning_days() -> i64 {
    365
}
fn default_conflicts() -> Vec<(String, String)> {
    crate::license::DEFAULT_CONFLICTS
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}
fn default_archive_extensions() -> Vec<String> {
    [".zip", ".tar", ".gz", ".bz2", ".tgz", ".tar.gz", ".tar.bz2", ".7z", ".rar"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_source_extensions() -> Vec<String> {
    [".java", ".c", ".cpp", ".h", ".hpp", ".py", ".js", ".ts", ".go", ".rs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            decision_expiry_days: default_expiry_days(),
            age_warning_days: default_age_warning_days(),
            conflicting_licenses: default_conflicts(),
            organization_domains: BTreeMap::new(),
            archive_extensions: default_archive_extensions(),
            source_extensions: default_source_extensions(),
        }
    }
}

/// Policy with pre-normalized lookup sets
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    config: PolicyConfig,
    conflicts: LicenseConflictSet,
    domain_to_org: HashMap<String, String>,
    archive_extensions: HashSet<String>,
    source_extensions: HashSet<String>,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

impl PolicyEngine {
    /// Load policy from a TOML file
    pub fn from_file(path: &Path) -> ReuseResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PolicyConfig = toml::from_str(&content)?;
        Ok(Self::new(config))
    }

    /// Try `.clearing-reuse.toml` then `clearing-reuse.toml` in `dir`, else defaults
    pub fn from_dir(dir: &Path) -> Self {
        for name in [".clearing-reuse.toml", "clearing-reuse.toml"] {
            let policy_path = dir.join(name);
            if !policy_path.exists() {
                continue;
            }
            match Self::from_file(&policy_path) {
                Ok(engine) => {
                    tracing::info!("Loaded reuse policy from {}", policy_path.display());
                    return engine;
                }
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}, using defaults", policy_path.display(), e);
                }
            }
        }

        Self::default()
    }

    pub fn new(config: PolicyConfig) -> Self {
        let conflicts = LicenseConflictSet::new(config.conflicting_licenses.iter().cloned());
        let mut domain_to_org = HashMap::new();
        for (org, domains) in &config.organization_domains {
            for domain in domains {
                domain_to_org.insert(domain.trim().to_lowercase(), org.clone());
            }
        }
        let archive_extensions = normalize_extensions(&config.archive_extensions);
        let source_extensions = normalize_extensions(&config.source_extensions);

        Self {
            config,
            conflicts,
            domain_to_org,
            archive_extensions,
            source_extensions,
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn conflicts(&self) -> &LicenseConflictSet {
        &self.conflicts
    }

    /// Organization of a user, derived from the email domain
    pub fn organization_for(&self, user: &User) -> String {
        let email = match user.email.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(e) => e,
            None => return UNKNOWN_ORGANIZATION.to_string(),
        };
        let domain = email
            .rsplit_once('@')
            .map(|(_, d)| d)
            .unwrap_or(email)
            .trim()
            .to_lowercase();
        self.domain_to_org.get(&domain).cloned().unwrap_or(domain)
    }

    /// Whether a decision recorded for `decision_filename` fits `target_filename`.
    ///
    /// An unknown decision filename is always compatible.
    pub fn file_types_compatible(&self, decision_filename: Option<&str>, target_filename: &str) -> bool {
        let decision_filename = match decision_filename {
            Some(f) => f,
            None => return true,
        };
        let source_ext = file_extension(decision_filename);
        let target_ext = file_extension(target_filename);

        if source_ext == target_ext {
            return true;
        }
        let both_in = |set: &HashSet<String>| set.contains(&source_ext) && set.contains(&target_ext);
        both_in(&self.archive_extensions) || both_in(&self.source_extensions)
    }

    /// Whether a decision created at `created` is past the expiry window
    pub fn is_expired_at(&self, created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        created
            .map(|c| (now - c).num_days() > self.config.decision_expiry_days)
            .unwrap_or(false)
    }
}

/// Lower-cased extension including the dot; empty when there is none
pub fn file_extension(filename: &str) -> String {
    match filename.rfind('.') {
        Some(dot) if dot > 0 && dot < filename.len() - 1 => filename[dot..].to_lowercase(),
        _ => String::new(),
    }
}

fn normalize_extensions(extensions: &[String]) -> HashSet<String> {
    extensions
        .iter()
        .map(|e| {
            let e = e.trim().to_lowercase();
            if e.starts_with('.') {
                e
            } else {
                format!(".{}", e)
            }
        })
        .collect()
}
