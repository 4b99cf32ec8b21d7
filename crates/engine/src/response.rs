//! Response shapes, the typed warnings list, and build outcomes shared with
//! waiters.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use curator_reasoning::AgentKind;

use crate::shortlist::{ShortlistEntry, ShortlistStats};

/// Typed warning naming the affected source. `Display` renders the
/// user-visible string carried in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BuildWarning {
    /// Provider errors or timeouts during enrichment.
    Enrichment { failures: usize },
    /// Enrichment calls refused because the shared rate budget was dry.
    EnrichmentBudget { refused: usize },
    /// A reasoning agent failed across the slice; its weight was
    /// redistributed.
    ReasoningAgent { agent: AgentKind },
    /// Candidates whose reasoning pass degenerated to the rule score.
    ReasoningFallback { candidates: usize },
    /// Research errors or timeouts.
    Research { failures: usize },
    /// A failed build was answered from an expired cache entry.
    StaleServed { deadline: bool },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enrichment { failures } => {
                write!(f, "enrichment: {failures} failure{}", plural(*failures))
            }
            Self::EnrichmentBudget { refused } => {
                write!(f, "enrichment: budget exhausted for {refused} candidate{}", plural(*refused))
            }
            Self::ReasoningAgent { agent } => {
                write!(f, "reasoning: {} agent unavailable", agent.label())
            }
            Self::ReasoningFallback { candidates } => {
                write!(f, "reasoning: fell back to rule score for {candidates} candidate{}", plural(*candidates))
            }
            Self::Research { failures } => {
                write!(f, "research: {failures} failure{}", plural(*failures))
            }
            Self::StaleServed { deadline: true } => {
                write!(f, "build timed out; serving cached result")
            }
            Self::StaleServed { deadline: false } => {
                write!(f, "build failed; serving cached result")
            }
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionConfidence {
    High,
    Medium,
    Low,
}

/// What a build publishes to its waiters. Limits differ per caller, so the
/// full entry travels and each caller truncates its own view.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Success {
        entry: Arc<ShortlistEntry>,
        warnings: Vec<BuildWarning>,
        /// Every reasoned candidate fell back to the rule score (or the
        /// reasoning stage never ran).
        reasoning_collapsed: bool,
    },
    Failure {
        kind: FailureKind,
        reason: String,
        /// Rule-ranked candidates assembled before the build gave up; empty
        /// when nothing useful was computed.
        partial: Vec<crate::shortlist::CuratedCandidate>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RoleNotFound,
    CompanyNotFound,
    Degraded,
    Deadline,
    Transient,
}

/// The answer to one `curate` call.
#[derive(Debug, Clone, Serialize)]
pub struct ShortlistResponse {
    pub candidates: Vec<crate::shortlist::CuratedCandidate>,
    pub stats: ShortlistStats,
    pub from_cache: bool,
    pub degraded: bool,
    pub decision_confidence: DecisionConfidence,
    pub warnings: Vec<String>,
}

/// Confidence policy: `high` only with a clean build, `low` only when the
/// reasoning pass collapsed to rule scoring (or a stale entry was served),
/// `medium` for everything in between.
pub fn decision_confidence(
    warnings_empty: bool,
    reasoning_collapsed: bool,
    stale_served: bool,
) -> DecisionConfidence {
    if reasoning_collapsed || stale_served {
        DecisionConfidence::Low
    } else if warnings_empty {
        DecisionConfidence::High
    } else {
        DecisionConfidence::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_render_the_documented_strings() {
        assert_eq!(
            BuildWarning::Enrichment { failures: 1 }.to_string(),
            "enrichment: 1 failure"
        );
        assert_eq!(
            BuildWarning::Enrichment { failures: 3 }.to_string(),
            "enrichment: 3 failures"
        );
        assert_eq!(
            BuildWarning::ReasoningAgent { agent: AgentKind::Timing }.to_string(),
            "reasoning: timing agent unavailable"
        );
        assert_eq!(
            BuildWarning::StaleServed { deadline: true }.to_string(),
            "build timed out; serving cached result"
        );
    }

    #[test]
    fn confidence_is_high_only_without_warnings() {
        assert_eq!(
            decision_confidence(true, false, false),
            DecisionConfidence::High
        );
        assert_eq!(
            decision_confidence(false, false, false),
            DecisionConfidence::Medium
        );
    }

    #[test]
    fn confidence_is_low_when_reasoning_collapses_or_stale_serves() {
        assert_eq!(
            decision_confidence(false, true, false),
            DecisionConfidence::Low
        );
        assert_eq!(
            decision_confidence(false, false, true),
            DecisionConfidence::Low
        );
    }
}
