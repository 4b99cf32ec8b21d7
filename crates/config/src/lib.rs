use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// A cached record younger than this is served without a provider call.
    pub ttl_days: i64,
    /// Token-bucket refill rate, shared across all builds in the process.
    pub rate_per_minute: u32,
    /// Hard cap on provider calls within a single build.
    pub max_per_build: usize,
    /// How many rule-ranked candidates enter the enrichment stage.
    pub slice_size: usize,
    pub timeout_secs: u64,
    /// Overridden at runtime by the `PDL_API_KEY` environment variable.
    pub api_key: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            ttl_days: 30,
            rate_per_minute: 60,
            max_per_build: 5,
            slice_size: 5,
            timeout_secs: 15,
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub enabled: bool,
    /// Overridden at runtime by the `PERPLEXITY_API_KEY` environment
    /// variable. Research is skipped entirely when this is empty.
    pub api_key: String,
    /// How many reasoning-ranked candidates get the research pass.
    pub slice_size: usize,
    pub timeout_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            slice_size: 5,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub model: String,
    /// Overridden at runtime by the `OPENROUTER_API_KEY` environment variable.
    pub api_key: String,
    pub per_agent_timeout_secs: u64,
    /// Window within which a (person, role, prompt-version) verdict is reused.
    pub cache_ttl_secs: u64,
    /// Below this many rankable candidates the build escalates to Degraded.
    pub min_candidates: usize,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o-mini".to_string(),
            api_key: String::new(),
            per_agent_timeout_secs: 30,
            cache_ttl_secs: 3600,
            min_candidates: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortlistConfig {
    pub ttl_days: i64,
    /// A failed status blocks rebuilds for this long, then expires to allow
    /// retry.
    pub failed_backoff_secs: i64,
    pub lease_ttl_secs: u64,
    pub lease_refresh_secs: u64,
    pub cache_read_timeout_secs: u64,
    pub cache_write_timeout_secs: u64,
    /// When a build fails and an expired entry exists, serve it tagged
    /// degraded instead of surfacing only the failure.
    pub serve_stale_on_error: bool,
}

impl Default for ShortlistConfig {
    fn default() -> Self {
        Self {
            ttl_days: 7,
            failed_backoff_secs: 300,
            lease_ttl_secs: 120,
            lease_refresh_secs: 30,
            cache_read_timeout_secs: 2,
            cache_write_timeout_secs: 5,
            serve_stale_on_error: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_limit: usize,
    pub build_deadline_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: 15,
            build_deadline_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CurationConfig {
    pub enrichment: EnrichmentConfig,
    pub research: ResearchConfig,
    pub reasoning: ReasoningConfig,
    pub shortlist: ShortlistConfig,
    pub engine: EngineConfig,
    pub telemetry: TelemetryConfig,
}

impl CurationConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(key) = env::var("PDL_API_KEY") {
            if !key.is_empty() {
                config.enrichment.api_key = key;
            }
        }
        if let Ok(key) = env::var("PERPLEXITY_API_KEY") {
            if !key.is_empty() {
                config.research.api_key = key;
            }
        }
        if let Ok(key) = env::var("OPENROUTER_API_KEY") {
            if !key.is_empty() {
                config.reasoning.api_key = key;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn research_active(&self) -> bool {
        self.research.enabled && !self.research.api_key.is_empty()
    }
}
