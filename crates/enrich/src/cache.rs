//! TTL freshness policy over the store's per-person enrichment records.
//!
//! Caching lives at the person level, not the role level: the same person
//! shows up in the top slice of many roles, and this is what bounds
//! enrichment spend as the tenant's role catalogue grows.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;

use curator_talent::{EnrichmentRecord, TalentError, TalentStore};

/// What the cache knows about a person.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// Fetched within the TTL; serve without a provider call.
    Fresh(EnrichmentRecord),
    /// A record exists but has aged out; callers may re-fetch or accept it.
    Stale(EnrichmentRecord),
    Absent,
}

pub struct EnrichmentCache {
    store: Arc<dyn TalentStore>,
    ttl: Duration,
}

impl EnrichmentCache {
    pub fn new(store: Arc<dyn TalentStore>, ttl_days: i64) -> Self {
        Self {
            store,
            ttl: Duration::days(ttl_days),
        }
    }

    pub async fn lookup(&self, person_id: &str) -> Result<CacheLookup, TalentError> {
        let Some(record) = self.store.get_enrichment(person_id).await? else {
            return Ok(CacheLookup::Absent);
        };
        let age = Utc::now() - record.fetched_at;
        if age < self.ttl {
            debug!(person = person_id, provider = %record.provider, "enrichment cache hit");
            Ok(CacheLookup::Fresh(record))
        } else {
            debug!(person = person_id, age_days = age.num_days(), "enrichment cache stale");
            Ok(CacheLookup::Stale(record))
        }
    }

    /// Unconditional write; overwrites any prior record for the person.
    pub async fn store(&self, record: EnrichmentRecord) -> Result<(), TalentError> {
        self.store.put_enrichment(record).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use curator_talent::{EnrichmentPayload, MemoryTalentStore};

    use super::*;

    fn record(person_id: &str, age_days: i64) -> EnrichmentRecord {
        EnrichmentRecord {
            person_id: person_id.to_string(),
            provider: "pdl".to_string(),
            fetched_at: Utc::now() - Duration::days(age_days),
            payload: EnrichmentPayload::default(),
            quality: 0.8,
        }
    }

    #[tokio::test]
    async fn young_record_is_fresh() {
        let store = MemoryTalentStore::new();
        let cache = EnrichmentCache::new(store.clone(), 30);
        cache.store(record("p1", 5)).await.unwrap();
        assert!(matches!(
            cache.lookup("p1").await.unwrap(),
            CacheLookup::Fresh(_)
        ));
    }

    #[tokio::test]
    async fn aged_record_is_stale_not_absent() {
        let store = MemoryTalentStore::new();
        let cache = EnrichmentCache::new(store.clone(), 30);
        cache.store(record("p1", 45)).await.unwrap();
        assert!(matches!(
            cache.lookup("p1").await.unwrap(),
            CacheLookup::Stale(_)
        ));
    }

    #[tokio::test]
    async fn unknown_person_is_absent() {
        let store = MemoryTalentStore::new();
        let cache = EnrichmentCache::new(store, 30);
        assert!(matches!(
            cache.lookup("nobody").await.unwrap(),
            CacheLookup::Absent
        ));
    }
}
