//! Enrichment and research clients with their shared budgets.

pub mod cache;
pub mod client;
pub mod rate_limit;
pub mod research;

pub use cache::{CacheLookup, EnrichmentCache};
pub use client::{EnrichOutcome, EnrichmentClient, EnrichmentProvider, PdlProvider};
pub use rate_limit::TokenBucket;
pub use research::{
    HighlightKind, PerplexityProvider, ResearchClient, ResearchHighlight, ResearchOutcome,
    ResearchProvider,
};
