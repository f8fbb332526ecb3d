//! License conflict set
//!
//! A small, explicit set of license pairs that must never be combined when a
//! donor decision is inherited. Pairs are unordered: `GPL-2.0 ↔ MIT` also
//! matches `MIT ↔ GPL-2.0`.

use super::{normalize, LicenseId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Pairs that conflict out of the box
pub const DEFAULT_CONFLICTS: &[(&str, &str)] = &[
    ("GPL-2.0", "MIT"),
    ("GPL-2.0", "Apache-2.0"),
    ("GPL-3.0", "MIT"),
    ("AGPL-3.0", "Apache-2.0"),
];

/// One detected conflict between two licenses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseConflict {
    pub left: LicenseId,
    pub right: LicenseId,
}

impl std::fmt::Display for LicenseConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} conflicts with {}", self.left, self.right)
    }
}

/// Unordered set of conflicting license pairs
#[derive(Debug, Clone, Default)]
pub struct LicenseConflictSet {
    pairs: HashSet<(String, String)>,
}

impl LicenseConflictSet {
    pub fn new<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(a, b)| ordered(&normalize(a.as_ref()), &normalize(b.as_ref())))
            .collect();
        Self { pairs }
    }

    pub fn defaults() -> Self {
        Self::new(DEFAULT_CONFLICTS.iter().copied())
    }

    /// Whether `a` and `b` conflict, in either direction
    pub fn conflicts(&self, a: &str, b: &str) -> bool {
        self.pairs.contains(&ordered(&normalize(a), &normalize(b)))
    }

    /// Every (decision license × target license) pair that conflicts
    pub fn find_incompatible<S: AsRef<str>, T: AsRef<str>>(
        &self,
        decision_licenses: &[S],
        target_licenses: &[T],
    ) -> Vec<LicenseConflict> {
        let mut found = Vec::new();
        for source in decision_licenses {
            for target in target_licenses {
                if self.conflicts(source.as_ref(), target.as_ref()) {
                    found.push(LicenseConflict {
                        left: LicenseId::new(source.as_ref()),
                        right: LicenseId::new(target.as_ref()),
                    });
                }
            }
        }
        found
    }

    /// Conflicts among one decision's own license ids
    pub fn find_internal<S: AsRef<str>>(&self, licenses: &[S]) -> Vec<LicenseConflict> {
        let mut found = Vec::new();
        for (i, a) in licenses.iter().enumerate() {
            for b in &licenses[i + 1..] {
                if self.conflicts(a.as_ref(), b.as_ref()) {
                    found.push(LicenseConflict {
                        left: LicenseId::new(a.as_ref()),
                        right: LicenseId::new(b.as_ref()),
                    });
                }
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn ordered(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
