//! Short-window in-process cache for ensemble verdicts.
//!
//! Keyed by (person, role, prompt version) so repeated curations within a
//! session are near-free, and any prompt change invalidates the window.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::trace;

use crate::ensemble::ReasonedVerdict;

/// Number of verdicts held in the hot-path LRU cache.
const LRU_CAPACITY: usize = 1024;

/// Snapshot of the cache performance counters.
#[derive(Debug, Clone, Default)]
pub struct ReasoningCacheStats {
    pub capacity: usize,
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
}

struct CachedVerdict {
    verdict: ReasonedVerdict,
    inserted_at: Instant,
}

pub struct ReasoningCache {
    entries: Mutex<LruCache<(String, String, String), CachedVerdict>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ReasoningCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(LRU_CAPACITY).expect("capacity is non-zero"),
            )),
            ttl: Duration::from_secs(ttl_secs),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, person_id: &str, role_id: &str, version: &str) -> Option<ReasonedVerdict> {
        let key = (
            person_id.to_string(),
            role_id.to_string(),
            version.to_string(),
        );
        let mut entries = self.entries.lock().expect("reasoning cache poisoned");
        match entries.get(&key) {
            Some(cached) if cached.inserted_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(person = person_id, role = role_id, "reasoning cache hit");
                Some(cached.verdict.clone())
            }
            Some(_) => {
                entries.pop(&key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, person_id: &str, role_id: &str, version: &str, verdict: ReasonedVerdict) {
        let key = (
            person_id.to_string(),
            role_id.to_string(),
            version.to_string(),
        );
        self.entries
            .lock()
            .expect("reasoning cache poisoned")
            .put(
                key,
                CachedVerdict {
                    verdict,
                    inserted_at: Instant::now(),
                },
            );
    }

    pub fn stats(&self) -> ReasoningCacheStats {
        let entries = self.entries.lock().expect("reasoning cache poisoned");
        ReasoningCacheStats {
            capacity: LRU_CAPACITY,
            len: entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict() -> ReasonedVerdict {
        ReasonedVerdict {
            agent_scores: vec![],
            failed_agents: vec![],
            aggregate: Some(75.0),
            confidence: 0.8,
            degraded: false,
        }
    }

    #[test]
    fn hit_within_ttl_miss_for_other_keys() {
        let cache = ReasoningCache::new(3600);
        cache.put("p1", "r1", "v1", verdict());

        assert!(cache.get("p1", "r1", "v1").is_some());
        assert!(cache.get("p1", "r2", "v1").is_none());
        assert!(cache.get("p1", "r1", "v2").is_none(), "version is part of the key");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let cache = ReasoningCache::new(0);
        cache.put("p1", "r1", "v1", verdict());
        assert!(cache.get("p1", "r1", "v1").is_none());
        assert_eq!(cache.stats().len, 0, "expired entry is evicted on read");
    }
}
