//! Checksum identity
//!
//! The algorithm of a checksum is inferred from its shape alone: 32, 40 or
//! 64 lower-case hex characters after trimming. Anything else is not a
//! checksum and is excluded from every checksum-based operation.

use crate::{ReuseError, ReuseResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static MD5_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-f0-9]{32}$").unwrap());
static SHA1_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-f0-9]{40}$").unwrap());
static SHA256_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-f0-9]{64}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl ChecksumAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infer the algorithm of a checksum string, or `None` if it is not one
pub fn validate_checksum_format(raw: &str) -> Option<ChecksumAlgorithm> {
    let clean = normalize_checksum(raw);
    if clean.is_empty() {
        return None;
    }
    if MD5_PATTERN.is_match(&clean) {
        Some(ChecksumAlgorithm::Md5)
    } else if SHA1_PATTERN.is_match(&clean) {
        Some(ChecksumAlgorithm::Sha1)
    } else if SHA256_PATTERN.is_match(&clean) {
        Some(ChecksumAlgorithm::Sha256)
    } else {
        None
    }
}

pub fn normalize_checksum(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A validated, normalized checksum with its inferred algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    value: String,
    algorithm: ChecksumAlgorithm,
}

impl Checksum {
    pub fn parse(raw: &str) -> ReuseResult<Self> {
        Self::try_from_str(raw).ok_or_else(|| ReuseError::InvalidChecksum(raw.to_string()))
    }

    /// Lenient form of [`Checksum::parse`]: unrecognized strings are "no checksum"
    pub fn try_from_str(raw: &str) -> Option<Self> {
        let algorithm = validate_checksum_format(raw)?;
        Some(Self {
            value: normalize_checksum(raw),
            algorithm,
        })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths_map_to_algorithms() {
        assert_eq!(validate_checksum_format(&"a".repeat(32)), Some(ChecksumAlgorithm::Md5));
        assert_eq!(validate_checksum_format(&"b".repeat(40)), Some(ChecksumAlgorithm::Sha1));
        assert_eq!(validate_checksum_format(&"0".repeat(64)), Some(ChecksumAlgorithm::Sha256));
    }

    #[test]
    fn test_case_and_whitespace_are_ignored() {
        let upper = format!("  {}\n", "ABCDEF0123".repeat(4));
        assert_eq!(validate_checksum_format(&upper), Some(ChecksumAlgorithm::Sha1));
        let c = Checksum::parse(&upper).unwrap();
        assert_eq!(c.value(), "abcdef0123".repeat(4));
    }

    #[test]
    fn test_invalid_shapes() {
        assert_eq!(validate_checksum_format(""), None);
        assert_eq!(validate_checksum_format("   "), None);
        assert_eq!(validate_checksum_format(&"a".repeat(39)), None);
        assert_eq!(validate_checksum_format(&"g".repeat(40)), None, "non-hex");
        assert_eq!(validate_checksum_format(&"a".repeat(128)), None);
        assert!(matches!(
            Checksum::parse("abc123"),
            Err(ReuseError::InvalidChecksum(_))
        ));
    }
}
