//! Fingerprint-keyed result cache with a fixed TTL.
//!
//! Serves prior analyses so repeated submissions of the same change skip
//! the LLM call. Entries expire lazily: a read past the TTL evicts the
//! entry, and every write sweeps the whole map. There is no capacity
//! bound and nothing survives the process.

pub mod store;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::fingerprint::Fingerprint;

pub use store::{CacheStats, CachedAnalysis, EntryStats, Lookup};

/// Default time-to-live for cached analyses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Shared, thread-safe result cache.
pub struct ResultCache {
    enabled: bool,
    store: Mutex<store::TtlStore>,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    /// Create a cache on the system clock.
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self::with_clock(enabled, ttl, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`.
    pub fn with_clock(enabled: bool, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        tracing::info!(ttl_secs = ttl.as_secs(), enabled, "result cache initialised");
        Self {
            enabled,
            store: Mutex::new(store::TtlStore::new(ttl)),
            clock,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self) -> Duration {
        self.lock().ttl()
    }

    /// Look up a cached analysis that is still within its TTL.
    pub fn get(&self, key: &Fingerprint) -> Option<CachedAnalysis> {
        if !self.enabled {
            return None;
        }
        let now = self.clock.now();
        match self.lock().get(key, now) {
            Lookup::Hit { analysis, age } => {
                tracing::info!(
                    key = %key,
                    age_secs = age.as_secs_f64(),
                    degraded = analysis.degraded,
                    "cache hit"
                );
                Some(analysis)
            }
            Lookup::Expired { age } => {
                tracing::info!(key = %key, age_secs = age.as_secs_f64(), "cache entry expired");
                None
            }
            Lookup::Miss => {
                tracing::debug!(key = %key, "cache miss");
                None
            }
        }
    }

    /// Store an analysis, replacing any existing entry for the key.
    pub fn set(&self, key: Fingerprint, analysis: CachedAnalysis, label: &str) {
        if !self.enabled {
            return;
        }
        let now = self.clock.now();
        tracing::info!(key = %key, label, degraded = analysis.degraded, "cached analysis");
        let swept = self.lock().insert(key, analysis, label.to_string(), now);
        if swept > 0 {
            tracing::debug!(swept, "removed expired cache entries");
        }
    }

    /// Remove all entries, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let count = self.lock().clear();
        tracing::info!(count, "cache cleared");
        count
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        self.lock().stats(now)
    }

    fn lock(&self) -> MutexGuard<'_, store::TtlStore> {
        // The store holds no invariants a panicking holder could break.
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fingerprint::fingerprint;
    use crate::models::{AnalysisResult, ChangeDescription, FileChange, FileStatus, Priority};
    use pretty_assertions::assert_eq;

    const TTL: Duration = Duration::from_secs(3600);

    fn change(title: &str) -> ChangeDescription {
        ChangeDescription {
            title: title.to_string(),
            description: String::new(),
            files: vec![FileChange {
                path: "src/lib.rs".into(),
                status: FileStatus::Modified,
                additions: 4,
                deletions: 2,
                changes: 6,
                patch: None,
            }],
            commits: vec![],
            base_branch: "main".into(),
            head_branch: String::new(),
            pr_url: String::new(),
        }
    }

    fn result() -> CachedAnalysis {
        CachedAnalysis {
            result: AnalysisResult {
                summary: "Tightens null handling".into(),
                purpose: "Fix crash".into(),
                testing_focus: vec!["Open an untitled file".into()],
                potential_risks: vec!["Callers expecting null".into()],
                affected_areas: vec!["src".into()],
                review_priority: Priority::Low,
                estimated_review_time: "5-10 minutes".into(),
                key_changes: vec!["src/lib.rs (modified)".into()],
            },
            degraded: false,
        }
    }

    fn cache() -> (ResultCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (ResultCache::with_clock(true, TTL, clock.clone()), clock)
    }

    #[test]
    fn get_after_set_returns_equal_result() {
        let (cache, _) = cache();
        let key = fingerprint(&change("Fix null check"));
        cache.set(key.clone(), result(), "Fix null check");
        assert_eq!(cache.get(&key), Some(result()));
    }

    #[test]
    fn degraded_flag_round_trips() {
        let (cache, _) = cache();
        let key = fingerprint(&change("fallback"));
        let fallback = CachedAnalysis {
            degraded: true,
            ..result()
        };
        cache.set(key.clone(), fallback.clone(), "fallback");
        assert_eq!(cache.get(&key), Some(fallback));
    }

    #[test]
    fn unknown_key_misses() {
        let (cache, _) = cache();
        assert!(cache.get(&fingerprint(&change("never stored"))).is_none());
    }

    #[test]
    fn entry_at_exactly_ttl_is_still_served() {
        let (cache, clock) = cache();
        let key = fingerprint(&change("edge"));
        cache.set(key.clone(), result(), "edge");
        clock.advance(TTL);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn expired_entry_is_absent_and_unlisted() {
        let (cache, clock) = cache();
        let key = fingerprint(&change("stale"));
        cache.set(key.clone(), result(), "stale");

        clock.advance(TTL + Duration::from_millis(1));
        assert!(cache.get(&key).is_none());
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 0);
        assert!(stats.entries.iter().all(|e| e.key != key.as_str()));
    }

    #[test]
    fn set_sweeps_other_stale_entries() {
        let (cache, clock) = cache();
        cache.set(fingerprint(&change("one")), result(), "one");
        clock.advance(TTL + Duration::from_secs(1));
        cache.set(fingerprint(&change("two")), result(), "two");

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.entries[0].label, "two");
    }

    #[test]
    fn stats_list_key_age_and_label() {
        let (cache, clock) = cache();
        let key = fingerprint(&change("Add retries"));
        cache.set(key.clone(), result(), "Add retries");
        clock.advance(Duration::from_secs(42));

        let stats = cache.stats();
        assert_eq!(
            stats,
            CacheStats {
                total_entries: 1,
                ttl_seconds: 3600,
                entries: vec![EntryStats {
                    key: key.to_string(),
                    age_seconds: 42,
                    label: "Add retries".into(),
                }],
            }
        );
    }

    #[test]
    fn clear_empties_cache() {
        let (cache, _) = cache();
        cache.set(fingerprint(&change("a")), result(), "a");
        cache.set(fingerprint(&change("b")), result(), "b");
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[test]
    fn disabled_cache_never_stores() {
        let cache = ResultCache::new(false, TTL);
        let key = fingerprint(&change("off"));
        cache.set(key.clone(), result(), "off");
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().total_entries, 0);
        assert!(!cache.is_enabled());
    }

    #[test]
    fn concurrent_writers_share_one_map() {
        let cache = Arc::new(ResultCache::new(true, TTL));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let title = format!("change {i}");
                    cache.set(fingerprint(&change(&title)), result(), &title);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.stats().total_entries, 8);
    }
}
