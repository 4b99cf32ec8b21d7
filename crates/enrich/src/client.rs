//! Bulk enrichment provider client.
//!
//! The provider is matched on the person's LinkedIn reference when present,
//! else on (full name, current company). Every per-person call is bounded by
//! the shared token bucket and an independent timeout; exhausted budgets and
//! provider failures are non-fatal outcomes the engine records, never errors
//! that abort a build.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use curator_talent::{EnrichmentPayload, EnrichmentRecord, Person};

use crate::rate_limit::TokenBucket;

/// Per-person enrichment outcome. `NoMatch` (provider found nobody) is
/// distinct from `Failed` (network or 5xx) in the output and in error
/// accounting.
#[derive(Debug, Clone)]
pub enum EnrichOutcome {
    Enriched(EnrichmentRecord),
    NoMatch,
    /// Refused locally: the shared rate budget was exhausted.
    Budget,
    Failed(String),
}

/// The upstream provider seam. `Ok(None)` means the provider answered but
/// matched nobody.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    async fn enrich(&self, person: &Person) -> Result<Option<EnrichmentRecord>>;
}

/// Rate-limited, timeout-bounded wrapper the engine calls.
pub struct EnrichmentClient {
    provider: Arc<dyn EnrichmentProvider>,
    bucket: Arc<TokenBucket>,
    timeout: Duration,
}

impl EnrichmentClient {
    pub fn new(
        provider: Arc<dyn EnrichmentProvider>,
        bucket: Arc<TokenBucket>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            provider,
            bucket,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn enrich(&self, person: &Person) -> EnrichOutcome {
        if !self.bucket.try_acquire().await {
            warn!(person = %person.id, "enrichment refused: rate budget exhausted");
            return EnrichOutcome::Budget;
        }

        match tokio::time::timeout(self.timeout, self.provider.enrich(person)).await {
            Ok(Ok(Some(record))) => {
                debug!(person = %person.id, quality = record.quality, "enriched");
                EnrichOutcome::Enriched(record)
            }
            Ok(Ok(None)) => {
                debug!(person = %person.id, "enrichment no-match");
                EnrichOutcome::NoMatch
            }
            Ok(Err(err)) => {
                warn!(person = %person.id, %err, "enrichment provider error");
                EnrichOutcome::Failed(err.to_string())
            }
            Err(_) => {
                warn!(person = %person.id, "enrichment timed out");
                EnrichOutcome::Failed("timeout".to_string())
            }
        }
    }
}

/// People Data Labs person-enrich API client.
pub struct PdlProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

const PDL_BASE_URL: &str = "https://api.peopledatalabs.com/v5";

impl PdlProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: PDL_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn match_params(person: &Person) -> serde_json::Value {
        if let Some(profile) = person.linkedin_url.as_deref() {
            json!({ "profile": profile })
        } else {
            json!({
                "name": person.name,
                "company": person.company,
            })
        }
    }
}

#[async_trait]
impl EnrichmentProvider for PdlProvider {
    async fn enrich(&self, person: &Person) -> Result<Option<EnrichmentRecord>> {
        let url = format!("{}/person/enrich", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[("params", Self::match_params(person).to_string())])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            bail!("enrichment provider returned {status}");
        }

        let body: serde_json::Value = response.json().await?;
        let data = body.get("data").unwrap_or(&serde_json::Value::Null);
        if data.is_null() {
            return Ok(None);
        }

        let payload: EnrichmentPayload = serde_json::from_value(data.clone())?;
        let quality = body
            .get("likelihood")
            .and_then(|v| v.as_f64())
            .map(|l| (l / 10.0).clamp(0.0, 1.0) as f32)
            .unwrap_or(0.5);

        Ok(Some(EnrichmentRecord {
            person_id: person.id.clone(),
            provider: "pdl".to_string(),
            fetched_at: Utc::now(),
            payload,
            quality,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn person(id: &str) -> Person {
        Person {
            id: id.to_string(),
            name: format!("Person {id}"),
            title: None,
            company: Some("Initech".to_string()),
            location: None,
            headline: None,
            linkedin_url: None,
            github_url: None,
            skills: vec![],
            experience: vec![],
            education: vec![],
            sources: BTreeSet::new(),
            warm_path: None,
        }
    }

    struct ScriptedProvider {
        calls: AtomicUsize,
        reply: fn() -> Result<Option<EnrichmentRecord>>,
    }

    #[async_trait]
    impl EnrichmentProvider for ScriptedProvider {
        async fn enrich(&self, person: &Person) -> Result<Option<EnrichmentRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = person;
            (self.reply)()
        }
    }

    #[tokio::test]
    async fn exhausted_bucket_short_circuits_before_the_provider() {
        let provider = Arc::new(ScriptedProvider {
            calls: AtomicUsize::new(0),
            reply: || Ok(None),
        });
        let bucket = Arc::new(TokenBucket::per_minute(1));
        let client = EnrichmentClient::new(provider.clone(), bucket, 15);

        let p = person("p1");
        assert!(matches!(client.enrich(&p).await, EnrichOutcome::NoMatch));
        assert!(matches!(client.enrich(&p).await, EnrichOutcome::Budget));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn provider_error_becomes_a_failed_outcome() {
        let provider = Arc::new(ScriptedProvider {
            calls: AtomicUsize::new(0),
            reply: || bail!("upstream 502"),
        });
        let bucket = Arc::new(TokenBucket::per_minute(10));
        let client = EnrichmentClient::new(provider, bucket, 15);

        match client.enrich(&person("p1")).await {
            EnrichOutcome::Failed(reason) => assert!(reason.contains("502")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn match_params_prefer_the_linkedin_reference() {
        let mut p = person("p1");
        p.linkedin_url = Some("https://linkedin.com/in/p1".to_string());
        let params = PdlProvider::match_params(&p);
        assert_eq!(params["profile"], "https://linkedin.com/in/p1");

        p.linkedin_url = None;
        let params = PdlProvider::match_params(&p);
        assert_eq!(params["name"], "Person p1");
        assert_eq!(params["company"], "Initech");
    }
}
