//! TTL-bounded in-memory entry store.
//!
//! Entries keep insertion order so statistics list them oldest-first.
//! Not synchronised; [`super::ResultCache`] owns the lock.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::Serialize;

use crate::fingerprint::Fingerprint;
use crate::models::AnalysisResult;

/// An analysis as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAnalysis {
    pub result: AnalysisResult,
    /// Synthesized from change statistics rather than produced by the model.
    pub degraded: bool,
}

/// A cached analysis.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub analysis: CachedAnalysis,
    pub created_at: Instant,
    /// Title of the request that produced the entry.
    pub label: String,
}

impl CacheEntry {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

/// Fingerprint → entry map with lazy expiry.
#[derive(Debug)]
pub struct TtlStore {
    ttl: Duration,
    entries: IndexMap<Fingerprint, CacheEntry>,
}

impl TtlStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: IndexMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a live entry. An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &Fingerprint, now: Instant) -> Lookup {
        let Some(entry) = self.entries.get(key) else {
            return Lookup::Miss;
        };
        let age = entry.age(now);
        if age > self.ttl {
            self.entries.shift_remove(key);
            return Lookup::Expired { age };
        }
        Lookup::Hit {
            analysis: entry.analysis.clone(),
            age,
        }
    }

    /// Insert or overwrite an entry, then drop everything past the TTL.
    ///
    /// Overwriting keeps the key's original position and resets its age.
    /// Returns how many stale entries the sweep removed.
    pub fn insert(
        &mut self,
        key: Fingerprint,
        analysis: CachedAnalysis,
        label: String,
        now: Instant,
    ) -> usize {
        self.entries.insert(
            key,
            CacheEntry {
                analysis,
                created_at: now,
                label,
            },
        );
        self.sweep(now)
    }

    /// Remove every entry older than the TTL.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let keep = entry.age(now) <= ttl;
            if !keep {
                tracing::debug!(key = %key, "removing expired cache entry");
            }
            keep
        });
        before - self.entries.len()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn stats(&self, now: Instant) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            ttl_seconds: self.ttl.as_secs(),
            entries: self
                .entries
                .iter()
                .map(|(key, entry)| EntryStats {
                    key: key.to_string(),
                    age_seconds: entry.age(now).as_secs(),
                    label: entry.label.clone(),
                })
                .collect(),
        }
    }
}

/// Outcome of a store lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit { analysis: CachedAnalysis, age: Duration },
    Expired { age: Duration },
    Miss,
}

/// Snapshot of the cache contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub ttl_seconds: u64,
    pub entries: Vec<EntryStats>,
}

/// Per-entry statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStats {
    pub key: String,
    pub age_seconds: u64,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    const TTL: Duration = Duration::from_secs(60);

    fn key(s: &str) -> Fingerprint {
        let change = crate::models::ChangeDescription {
            title: s.to_string(),
            description: String::new(),
            files: vec![crate::models::FileChange {
                path: "a.rs".into(),
                status: crate::models::FileStatus::Added,
                additions: 1,
                deletions: 0,
                changes: 1,
                patch: None,
            }],
            commits: vec![],
            base_branch: "main".into(),
            head_branch: String::new(),
            pr_url: String::new(),
        };
        crate::fingerprint::fingerprint(&change)
    }

    fn result(summary: &str) -> CachedAnalysis {
        CachedAnalysis {
            result: AnalysisResult {
                summary: summary.to_string(),
                purpose: "p".into(),
                testing_focus: vec!["t".into()],
                potential_risks: vec![],
                affected_areas: vec!["src".into()],
                review_priority: Priority::Medium,
                estimated_review_time: "15-25 minutes".into(),
                key_changes: vec![],
            },
            degraded: false,
        }
    }

    #[test]
    fn hit_within_ttl() {
        let t0 = Instant::now();
        let mut store = TtlStore::new(TTL);
        store.insert(key("a"), result("first"), "a".into(), t0);

        match store.get(&key("a"), t0 + TTL) {
            Lookup::Hit { analysis, age } => {
                assert_eq!(analysis.result.summary, "first");
                assert!(!analysis.degraded);
                assert_eq!(age, TTL);
            }
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn hit_keeps_degraded_flag() {
        let t0 = Instant::now();
        let mut store = TtlStore::new(TTL);
        let fallback = CachedAnalysis {
            degraded: true,
            ..result("fallback")
        };
        store.insert(key("a"), fallback.clone(), "a".into(), t0);

        match store.get(&key("a"), t0 + Duration::from_secs(1)) {
            Lookup::Hit { analysis, .. } => assert_eq!(analysis, fallback),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn expired_lookup_evicts() {
        let t0 = Instant::now();
        let mut store = TtlStore::new(TTL);
        store.insert(key("a"), result("first"), "a".into(), t0);

        let later = t0 + TTL + Duration::from_millis(1);
        assert!(matches!(store.get(&key("a"), later), Lookup::Expired { .. }));
        assert!(store.is_empty());
        assert_eq!(store.get(&key("a"), later), Lookup::Miss);
    }

    #[test]
    fn insert_sweeps_stale_entries() {
        let t0 = Instant::now();
        let mut store = TtlStore::new(TTL);
        store.insert(key("old"), result("old"), "old".into(), t0);
        store.insert(key("mid"), result("mid"), "mid".into(), t0 + Duration::from_secs(30));

        let removed = store.insert(
            key("new"),
            result("new"),
            "new".into(),
            t0 + Duration::from_secs(61),
        );
        assert_eq!(removed, 1);
        let labels: Vec<_> = store
            .stats(t0 + Duration::from_secs(61))
            .entries
            .into_iter()
            .map(|e| e.label)
            .collect();
        assert_eq!(labels, ["mid", "new"]);
    }

    #[test]
    fn overwrite_resets_age_and_keeps_position() {
        let t0 = Instant::now();
        let mut store = TtlStore::new(TTL);
        store.insert(key("a"), result("v1"), "a".into(), t0);
        store.insert(key("b"), result("b"), "b".into(), t0);
        store.insert(key("a"), result("v2"), "a".into(), t0 + Duration::from_secs(50));

        let stats = store.stats(t0 + Duration::from_secs(55));
        assert_eq!(stats.entries[0].label, "a");
        assert_eq!(stats.entries[0].age_seconds, 5);
        assert_eq!(stats.entries[1].age_seconds, 55);

        // "b" expires at t0+61, "a" survives until t0+111.
        let at = t0 + Duration::from_secs(100);
        assert!(matches!(store.get(&key("b"), at), Lookup::Expired { .. }));
        assert!(matches!(store.get(&key("a"), at), Lookup::Hit { .. }));
    }

    #[test]
    fn stats_report_ttl_and_ages() {
        let t0 = Instant::now();
        let mut store = TtlStore::new(TTL);
        store.insert(key("a"), result("a"), "Add cache".into(), t0);

        let stats = store.stats(t0 + Duration::from_millis(2500));
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.ttl_seconds, 60);
        assert_eq!(stats.entries[0].age_seconds, 2);
        assert_eq!(stats.entries[0].key, key("a").to_string());
        assert_eq!(stats.entries[0].label, "Add cache");
    }

    #[test]
    fn clear_reports_count() {
        let t0 = Instant::now();
        let mut store = TtlStore::new(TTL);
        store.insert(key("a"), result("a"), "a".into(), t0);
        store.insert(key("b"), result("b"), "b".into(), t0);
        assert_eq!(store.clear(), 2);
        assert_eq!(store.len(), 0);
        assert_eq!(store.clear(), 0);
    }
}
