//! Web-research pass for the final top slice.
//!
//! Optional by configuration: a disabled client returns the empty outcome
//! without consuming any budget. A per-person timeout yields an empty list
//! for that person plus a warning recorded in the build, never a build
//! failure.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use curator_talent::{Person, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    Github,
    Publication,
    Achievement,
    Skill,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchHighlight {
    pub kind: HighlightKind,
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ResearchOutcome {
    Highlights(Vec<ResearchHighlight>),
    /// Switched off by flag or missing key; costs nothing.
    Disabled,
    TimedOut,
    Failed(String),
}

#[async_trait]
pub trait ResearchProvider: Send + Sync {
    async fn research(&self, person: &Person, role: &Role) -> Result<Vec<ResearchHighlight>>;
}

pub struct ResearchClient {
    provider: Option<Arc<dyn ResearchProvider>>,
    timeout: Duration,
}

impl ResearchClient {
    pub fn new(provider: Arc<dyn ResearchProvider>, timeout_secs: u64) -> Self {
        Self {
            provider: Some(provider),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// A client that always answers [`ResearchOutcome::Disabled`].
    pub fn disabled() -> Self {
        Self {
            provider: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn research(&self, person: &Person, role: &Role) -> ResearchOutcome {
        let Some(provider) = &self.provider else {
            return ResearchOutcome::Disabled;
        };

        match tokio::time::timeout(self.timeout, provider.research(person, role)).await {
            Ok(Ok(highlights)) => {
                debug!(person = %person.id, count = highlights.len(), "research complete");
                ResearchOutcome::Highlights(highlights)
            }
            Ok(Err(err)) => {
                warn!(person = %person.id, %err, "research provider error");
                ResearchOutcome::Failed(err.to_string())
            }
            Err(_) => {
                warn!(person = %person.id, "research timed out");
                ResearchOutcome::TimedOut
            }
        }
    }
}

/// Perplexity chat-completions client that asks for structured highlights.
pub struct PerplexityProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
const PERPLEXITY_MODEL: &str = "sonar";

impl PerplexityProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: PERPLEXITY_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_query(person: &Person, role: &Role) -> String {
        let anchor = person
            .company
            .as_deref()
            .map(|c| format!(" ({c})"))
            .unwrap_or_default();
        format!(
            "Find public professional signals for {}{anchor}, a candidate for the role \
             \"{}\". Report GitHub projects, publications, talks, and notable \
             achievements. Reply ONLY with a JSON array of objects with fields \
             \"kind\" (one of: github, publication, achievement, skill), \
             \"description\" (one sentence), and optional \"url\".",
            person.name, role.title,
        )
    }
}

#[async_trait]
impl ResearchProvider for PerplexityProvider {
    async fn research(&self, person: &Person, role: &Role) -> Result<Vec<ResearchHighlight>> {
        let payload = json!({
            "model": PERPLEXITY_MODEL,
            "messages": [
                {"role": "user", "content": Self::build_query(person, role)}
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("research provider returned {status}: {body}");
        }

        let content = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or("");

        Ok(parse_highlights(content))
    }
}

/// Pull the first JSON array out of the reply, tolerating fences and prose.
fn parse_highlights(content: &str) -> Vec<ResearchHighlight> {
    let trimmed = content.trim();
    let candidate = match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => return vec![],
    };
    serde_json::from_str(candidate).unwrap_or_default()
}
