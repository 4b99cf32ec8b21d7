//! Chat-completion client for the reasoning model.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::json;

/// One prompt in, one reply out. The ensemble owns retries, timeouts, and
/// parsing; implementations only move bytes.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// OpenRouter-compatible `/chat/completions` client.
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENROUTER_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.api_key.trim().is_empty() {
            bail!("reasoning model key missing; set OPENROUTER_API_KEY");
        }

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "https://curator.local")
            .header("X-Title", "Curator")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("reasoning model error ({status}): {body}");
        }

        let Some(content) = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
        else {
            bail!("reasoning model response missing content: {body}");
        };

        Ok(content.to_string())
    }
}
