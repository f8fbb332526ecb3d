//! Inheritance success cache
//!
//! Remembers successful applications keyed by (target release, checksum) so
//! a re-run within the freshness window skips the candidate search for that
//! file. Entries are overwritten on every new success and dropped lazily
//! when a read finds them stale. Process-local; never persisted.

use crate::decision::ConfidenceLevel;
use crate::duplicates::normalize_checksum;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// One successful (or attempted) inheritance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritanceRecord {
    pub target_release_id: String,
    pub source_release_id: String,
    pub checksum: String,
    pub inherited_at: DateTime<Utc>,
    pub inherited_by: Option<String>,
    pub confidence: Option<ConfidenceLevel>,
    pub successful: bool,
}

type CacheKey = (String, String);

/// Concurrent, time-bounded cache of inheritance records
#[derive(Debug)]
pub struct InheritanceCache {
    entries: RwLock<HashMap<CacheKey, InheritanceRecord>>,
    freshness: Duration,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Default for InheritanceCache {
    fn default() -> Self {
        Self::new(24)
    }
}

impl InheritanceCache {
    pub fn new(freshness_hours: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            freshness: Duration::hours(freshness_hours),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    fn key(release_id: &str, checksum: &str) -> CacheKey {
        (release_id.to_string(), normalize_checksum(checksum))
    }

    /// Insert or replace the record for its (release, checksum)
    pub fn put(&self, record: InheritanceRecord) {
        let key = Self::key(&record.target_release_id, &record.checksum);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, record);
    }

    /// A successful record younger than the freshness window, if any.
    ///
    /// A stale record found here is removed.
    pub fn get_fresh_at(&self, release_id: &str, checksum: &str, now: DateTime<Utc>) -> Option<InheritanceRecord> {
        let key = Self::key(release_id, checksum);
        let found = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries.get(&key).cloned()
        };

        match found {
            Some(record) if record.successful && now - record.inherited_at < self.freshness => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(record)
            }
            Some(stale) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
                // a concurrent writer may have refreshed the entry meanwhile
                if entries.get(&key) == Some(&stale) {
                    entries.remove(&key);
                }
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn is_satisfied_at(&self, release_id: &str, checksum: &str, now: DateTime<Utc>) -> bool {
        self.get_fresh_at(release_id, checksum, now).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(at: DateTime<Utc>, successful: bool) -> InheritanceRecord {
        InheritanceRecord {
            target_release_id: "r1".into(),
            source_release_id: "donor".into(),
            checksum: "AB".repeat(20),
            inherited_at: at,
            inherited_by: Some("a@example.com".into()),
            confidence: Some(ConfidenceLevel::High),
            successful,
        }
    }

    #[test]
    fn test_fresh_hit_within_window() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let cache = InheritanceCache::default();
        cache.put(record(t0, true));

        assert!(cache.is_satisfied_at("r1", &"ab".repeat(20), t0 + Duration::hours(23)));
        assert!(!cache.is_satisfied_at("r2", &"ab".repeat(20), t0), "keyed by release too");
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert!((cache.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stale_entry_is_dropped_on_read() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let cache = InheritanceCache::default();
        cache.put(record(t0, true));
        assert_eq!(cache.len(), 1);

        assert!(!cache.is_satisfied_at("r1", &"ab".repeat(20), t0 + Duration::hours(24)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unsuccessful_record_never_satisfies() {
        let t0 = Utc::now();
        let cache = InheritanceCache::new(24);
        cache.put(record(t0, false));
        assert!(!cache.is_satisfied_at("r1", &"ab".repeat(20), t0));
    }

    #[test]
    fn test_overwrite_on_put() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let cache = InheritanceCache::default();
        cache.put(record(t0, true));
        let mut newer = record(t0 + Duration::hours(30), true);
        newer.source_release_id = "donor-2".into();
        cache.put(newer);
        assert_eq!(cache.len(), 1);
        let hit = cache.get_fresh_at("r1", &"ab".repeat(20), t0 + Duration::hours(31)).unwrap();
        assert_eq!(hit.source_release_id, "donor-2");
    }
}
