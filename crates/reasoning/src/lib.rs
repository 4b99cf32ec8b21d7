//! Four-agent reasoning ensemble with versioned prompts and a short-window
//! verdict cache.

pub mod cache;
pub mod client;
pub mod ensemble;
pub mod prompts;

pub use cache::{ReasoningCache, ReasoningCacheStats};
pub use client::{CompletionClient, OpenRouterClient};
pub use ensemble::{
    AgentKind, AgentScore, ReasonedVerdict, ReasoningEnsemble, aggregate_scores,
    ensemble_confidence, redistributed_weight,
};
pub use prompts::{PROMPT_VERSION, build_agent_prompt};
