//! Curation engine: shortlist cache, build leases, context assembly, and the
//! pipeline orchestrator.

pub mod context;
pub mod engine;
pub mod lease;
pub mod response;
pub mod shortlist;

pub use context::{
    CandidateContext, ContextCategory, ContextInputs, EnrichmentDetails, Strength, WhyConsider,
    build_context,
};
pub use engine::{CacheState, CurateRequest, CurationEngine, CurationError, RoleCacheStatus};
pub use lease::{Acquire, BuildLeases, Fingerprint, LeaseGuard};
pub use response::{BuildOutcome, BuildWarning, DecisionConfidence, ShortlistResponse};
pub use shortlist::{
    CuratedCandidate, FailureMarker, MemoryShortlistStore, ShortlistEntry, ShortlistStats,
    ShortlistStatus, ShortlistStore,
};
