//! License identity and pairwise conflict detection
//!
//! Licenses are carried as SPDX-style identifiers. Compatibility between a
//! donor decision and a target release is decided by a fixed set of
//! conflicting pairs (see [`compatibility`]).

pub mod compatibility;

pub use compatibility::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ─── License Identity ───────────────────────────────────────────────

/// Canonical license identifier (SPDX where possible)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LicenseId(pub String);

impl LicenseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn normalize(id: &str) -> String {
    id.trim().to_uppercase()
}
