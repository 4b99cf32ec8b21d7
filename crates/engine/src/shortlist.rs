//! Persisted shortlist entries and the cache store seam.
//!
//! One entry per (company, role). Readers treat an entry whose `expires_at`
//! is in the past as absent; the engine may still serve it explicitly on the
//! stale-on-error path. Failure markers live beside entries, not instead of
//! them, so a failed rebuild never destroys the last good shortlist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use curator_reasoning::ReasonedVerdict;
use curator_scoring::SkillMatch;
use curator_talent::{Person, TalentError};

use crate::context::CandidateContext;

/// The persisted, user-visible shape of one shortlisted candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratedCandidate {
    pub person: Person,
    /// Aggregate reasoning score when the candidate was reasoned about,
    /// otherwise the rule score.
    pub match_score: f32,
    pub confidence: f32,
    pub data_completeness: f32,
    /// Sources consulted, in order: `manual`, then `pdl`, then `perplexity`.
    pub enrichment_sources: Vec<String>,
    pub rule_score: f32,
    pub skill_match: SkillMatch,
    #[serde(default)]
    pub reasoning: Option<ReasonedVerdict>,
    pub context: CandidateContext,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ShortlistStats {
    pub total_searched: usize,
    pub enriched_count: usize,
    pub average_score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortlistStatus {
    Ready,
    Building,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortlistEntry {
    pub company_id: String,
    pub role_id: String,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub candidates: Vec<CuratedCandidate>,
    pub stats: ShortlistStats,
    pub status: ShortlistStatus,
}

impl ShortlistEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// A failed build, kept until `until` so retries back off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureMarker {
    pub reason: String,
    /// The build died on the whole-build deadline (as opposed to a store
    /// or upstream fault).
    #[serde(default)]
    pub deadline: bool,
    pub failed_at: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl FailureMarker {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.until > now
    }
}

/// Store seam for the shortlist cache. Single-key reads and writes are
/// atomic in the backing store; that is the only atomicity the engine needs.
#[async_trait]
pub trait ShortlistStore: Send + Sync {
    /// Whatever is stored for the key, expired or not. Freshness is the
    /// caller's judgement.
    async fn get(&self, company_id: &str, role_id: &str)
    -> Result<Option<ShortlistEntry>, TalentError>;

    /// Atomic replace; clears any failure marker for the key.
    async fn put(&self, entry: ShortlistEntry) -> Result<(), TalentError>;

    async fn mark_failed(
        &self,
        company_id: &str,
        role_id: &str,
        marker: FailureMarker,
    ) -> Result<(), TalentError>;

    async fn failure(
        &self,
        company_id: &str,
        role_id: &str,
    ) -> Result<Option<FailureMarker>, TalentError>;
}

type Key = (String, String);

/// Process-local shortlist store.
#[derive(Default)]
pub struct MemoryShortlistStore {
    entries: DashMap<Key, ShortlistEntry>,
    failures: DashMap<Key, FailureMarker>,
}

impl MemoryShortlistStore {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }
}

#[async_trait]
impl ShortlistStore for MemoryShortlistStore {
    async fn get(
        &self,
        company_id: &str,
        role_id: &str,
    ) -> Result<Option<ShortlistEntry>, TalentError> {
        let key = (company_id.to_string(), role_id.to_string());
        Ok(self.entries.get(&key).map(|e| e.value().clone()))
    }

    async fn put(&self, entry: ShortlistEntry) -> Result<(), TalentError> {
        let key = (entry.company_id.clone(), entry.role_id.clone());
        self.failures.remove(&key);
        self.entries.insert(key, entry);
        Ok(())
    }

    async fn mark_failed(
        &self,
        company_id: &str,
        role_id: &str,
        marker: FailureMarker,
    ) -> Result<(), TalentError> {
        self.failures
            .insert((company_id.to_string(), role_id.to_string()), marker);
        Ok(())
    }

    async fn failure(
        &self,
        company_id: &str,
        role_id: &str,
    ) -> Result<Option<FailureMarker>, TalentError> {
        let key = (company_id.to_string(), role_id.to_string());
        Ok(self.failures.get(&key).map(|m| m.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn entry(expires_in_days: i64) -> ShortlistEntry {
        ShortlistEntry {
            company_id: "c1".to_string(),
            role_id: "r1".to_string(),
            generated_at: Utc::now(),
            expires_at: Utc::now() + Duration::days(expires_in_days),
            candidates: vec![],
            stats: ShortlistStats::default(),
            status: ShortlistStatus::Ready,
        }
    }

    #[test]
    fn freshness_tracks_expiry() {
        let now = Utc::now();
        assert!(entry(7).is_fresh(now));
        assert!(!entry(-1).is_fresh(now));
    }

    #[tokio::test]
    async fn put_clears_the_failure_marker() {
        let store = MemoryShortlistStore::new();
        store
            .mark_failed(
                "c1",
                "r1",
                FailureMarker {
                    reason: "deadline".to_string(),
                    deadline: true,
                    failed_at: Utc::now(),
                    until: Utc::now() + Duration::minutes(5),
                },
            )
            .await
            .unwrap();
        assert!(store.failure("c1", "r1").await.unwrap().is_some());

        store.put(entry(7)).await.unwrap();
        assert!(store.failure("c1", "r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_still_readable() {
        let store = MemoryShortlistStore::new();
        store.put(entry(-1)).await.unwrap();
        let got = store.get("c1", "r1").await.unwrap().unwrap();
        assert!(!got.is_fresh(Utc::now()), "reader applies its own freshness");
    }
}
