//! Four-agent reasoning pass over the enriched top slice.
//!
//! Weight model (weights sum to 1.0):
//! ```text
//! aggregate = skills(0.40) + trajectory(0.30) + fit(0.20) + timing(0.10)
//! ```
//! The model itself need not be deterministic; the aggregation and
//! weight-redistribution logic below is, given the per-agent outputs.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use curator_talent::{Company, EnrichmentRecord, Person, Role};

use crate::client::CompletionClient;
use crate::prompts::build_agent_prompt;

/// Baseline ensemble confidence when all four agents return without
/// reporting their own confidence.
const BASELINE_CONFIDENCE: f32 = 0.8;
/// Confidence penalty per missing or failed agent.
const MISSING_AGENT_PENALTY: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Skills,
    Trajectory,
    Fit,
    Timing,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Skills,
        AgentKind::Trajectory,
        AgentKind::Fit,
        AgentKind::Timing,
    ];

    pub fn weight(self) -> f32 {
        match self {
            AgentKind::Skills => 0.40,
            AgentKind::Trajectory => 0.30,
            AgentKind::Fit => 0.20,
            AgentKind::Timing => 0.10,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgentKind::Skills => "skills",
            AgentKind::Trajectory => "trajectory",
            AgentKind::Fit => "fit",
            AgentKind::Timing => "timing",
        }
    }
}

/// One returning agent's verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentScore {
    pub agent: AgentKind,
    /// In [0, 100].
    pub score: f32,
    pub rationale: String,
    /// Model-reported confidence, when the reply carried one.
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Combined ensemble result for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonedVerdict {
    pub agent_scores: Vec<AgentScore>,
    pub failed_agents: Vec<AgentKind>,
    /// `None` when fewer than two agents returned — the pass is degraded and
    /// the caller falls back to the rule score.
    pub aggregate: Option<f32>,
    pub confidence: f32,
    pub degraded: bool,
}

/// Raw JSON shape an agent is instructed to reply with.
#[derive(Debug, Clone, Deserialize)]
struct AgentReply {
    score: f32,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    confidence: Option<f32>,
}

pub struct ReasoningEnsemble {
    client: Arc<dyn CompletionClient>,
    timeout: Duration,
}

impl ReasoningEnsemble {
    pub fn new(client: Arc<dyn CompletionClient>, per_agent_timeout_secs: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(per_agent_timeout_secs),
        }
    }

    /// Run all four agents concurrently and aggregate deterministically.
    pub async fn reason(
        &self,
        person: &Person,
        enrichment: Option<&EnrichmentRecord>,
        role: &Role,
        company: &Company,
    ) -> ReasonedVerdict {
        let calls = AgentKind::ALL.map(|agent| {
            let prompt = build_agent_prompt(agent, person, enrichment, role, company);
            async move {
                let reply = tokio::time::timeout(self.timeout, self.client.complete(&prompt)).await;
                (agent, reply)
            }
        });

        let mut agent_scores = Vec::new();
        let mut failed_agents = Vec::new();
        for (agent, reply) in join_all(calls).await {
            match reply {
                Ok(Ok(text)) => match extract_agent_reply(&text) {
                    Some(parsed) => {
                        debug!(person = %person.id, agent = agent.label(), score = parsed.score, "agent returned");
                        agent_scores.push(AgentScore {
                            agent,
                            score: parsed.score.clamp(0.0, 100.0),
                            rationale: parsed.rationale,
                            confidence: parsed.confidence.map(|c| c.clamp(0.0, 1.0)),
                        });
                    }
                    None => {
                        warn!(person = %person.id, agent = agent.label(), "agent reply unparseable");
                        failed_agents.push(agent);
                    }
                },
                Ok(Err(err)) => {
                    warn!(person = %person.id, agent = agent.label(), %err, "agent call failed");
                    failed_agents.push(agent);
                }
                Err(_) => {
                    warn!(person = %person.id, agent = agent.label(), "agent call timed out");
                    failed_agents.push(agent);
                }
            }
        }

        let aggregate = aggregate_scores(&agent_scores);
        let confidence = ensemble_confidence(&agent_scores);
        ReasonedVerdict {
            degraded: aggregate.is_none(),
            agent_scores,
            failed_agents,
            aggregate,
            confidence,
        }
    }
}

/// Weighted aggregate over the returning agents, their weights renormalised
/// to sum to 1 while preserving ratios. Fewer than two returning agents is
/// not enough signal: the pass is degraded and `None` is returned.
pub fn aggregate_scores(scores: &[AgentScore]) -> Option<f32> {
    if scores.len() < 2 {
        return None;
    }
    let total_weight: f32 = scores.iter().map(|s| s.agent.weight()).sum();
    let weighted: f32 = scores
        .iter()
        .map(|s| (s.agent.weight() / total_weight) * s.score)
        .sum();
    Some(weighted.round())
}

/// Renormalised weight of one returning agent among `scores`.
pub fn redistributed_weight(agent: AgentKind, scores: &[AgentScore]) -> f32 {
    let total: f32 = scores.iter().map(|s| s.agent.weight()).sum();
    agent.weight() / total
}

/// Mean of the model-reported confidences when every returning agent
/// reported one and all four returned; otherwise the fixed baseline minus a
/// penalty per missing agent.
pub fn ensemble_confidence(scores: &[AgentScore]) -> f32 {
    let missing = AgentKind::ALL.len().saturating_sub(scores.len());
    if missing == 0 {
        let reported: Vec<f32> = scores.iter().filter_map(|s| s.confidence).collect();
        if reported.len() == scores.len() {
            return reported.iter().sum::<f32>() / reported.len() as f32;
        }
        return BASELINE_CONFIDENCE;
    }
    (BASELINE_CONFIDENCE - MISSING_AGENT_PENALTY * missing as f32).max(0.0)
}

/// Extract the agent's JSON verdict from its reply.
///
/// Tries a fenced ```json block first, then the outermost bare object, so a
/// model that wraps its answer in prose still parses.
fn extract_agent_reply(response: &str) -> Option<AgentReply> {
    if let Some(fence_start) = response.find("```json") {
        let after_fence = &response[fence_start + "```json".len()..];
        if let Some(fence_end) = after_fence.find("```") {
            let json_str = after_fence[..fence_end].trim();
            if let Ok(parsed) = serde_json::from_str(json_str) {
                return Some(parsed);
            }
        }
    }

    let trimmed = response.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn score(agent: AgentKind, value: f32) -> AgentScore {
        AgentScore {
            agent,
            score: value,
            rationale: String::new(),
            confidence: None,
        }
    }

    #[test]
    fn full_ensemble_aggregates_with_the_declared_weights() {
        let scores = vec![
            score(AgentKind::Skills, 90.0),
            score(AgentKind::Trajectory, 80.0),
            score(AgentKind::Fit, 70.0),
            score(AgentKind::Timing, 60.0),
        ];
        // 0.4*90 + 0.3*80 + 0.2*70 + 0.1*60 = 80
        assert_eq!(aggregate_scores(&scores), Some(80.0));
    }

    #[test]
    fn dropping_timing_renormalises_to_the_documented_ratios() {
        let scores = vec![
            score(AgentKind::Skills, 90.0),
            score(AgentKind::Trajectory, 90.0),
            score(AgentKind::Fit, 90.0),
        ];
        let skills = redistributed_weight(AgentKind::Skills, &scores);
        let trajectory = redistributed_weight(AgentKind::Trajectory, &scores);
        let fit = redistributed_weight(AgentKind::Fit, &scores);

        assert!((skills - 0.444).abs() < 0.001, "skills weight {skills}");
        assert!((trajectory - 0.333).abs() < 0.001, "trajectory weight {trajectory}");
        assert!((fit - 0.222).abs() < 0.001, "fit weight {fit}");
        assert!((skills + trajectory + fit - 1.0).abs() < 1e-6);
        // Ratios preserved: 0.4 : 0.3 : 0.2.
        assert!((skills / trajectory - 4.0 / 3.0).abs() < 1e-4);
    }

    #[test]
    fn aggregate_with_failed_agents_uses_only_returning_scores() {
        let scores = vec![
            score(AgentKind::Skills, 100.0),
            score(AgentKind::Fit, 50.0),
        ];
        // weights 0.4 and 0.2 → 2/3 and 1/3 → 100*2/3 + 50*1/3 = 83.33 → 83
        assert_eq!(aggregate_scores(&scores), Some(83.0));
    }

    #[test]
    fn fewer_than_two_agents_is_degraded() {
        assert_eq!(aggregate_scores(&[]), None);
        assert_eq!(aggregate_scores(&[score(AgentKind::Skills, 90.0)]), None);
    }

    #[test]
    fn confidence_baseline_drops_per_missing_agent() {
        let full: Vec<AgentScore> = AgentKind::ALL.map(|a| score(a, 80.0)).to_vec();
        assert!((ensemble_confidence(&full) - 0.8).abs() < f32::EPSILON);

        let three = &full[..3];
        assert!((ensemble_confidence(three) - 0.6).abs() < f32::EPSILON);

        let one = &full[..1];
        assert!((ensemble_confidence(one) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn confidence_uses_model_reports_when_all_four_report() {
        let scores: Vec<AgentScore> = AgentKind::ALL
            .map(|a| AgentScore {
                agent: a,
                score: 80.0,
                rationale: String::new(),
                confidence: Some(0.9),
            })
            .to_vec();
        assert!((ensemble_confidence(&scores) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn extract_parses_fenced_and_bare_replies() {
        let fenced = "Here you go:\n```json\n{\"score\": 85, \"rationale\": \"strong\", \"confidence\": 0.9}\n```";
        let parsed = extract_agent_reply(fenced).unwrap();
        assert_eq!(parsed.score, 85.0);
        assert_eq!(parsed.confidence, Some(0.9));

        let bare = "Verdict: {\"score\": 40, \"rationale\": \"thin history\"}";
        let parsed = extract_agent_reply(bare).unwrap();
        assert_eq!(parsed.score, 40.0);
        assert!(parsed.confidence.is_none());
    }

    #[test]
    fn extract_rejects_plain_prose() {
        assert!(extract_agent_reply("I think they are great.").is_none());
        assert!(extract_agent_reply("").is_none());
    }

    mod ensemble {
        use std::collections::BTreeSet;
        use std::sync::atomic::{AtomicUsize, Ordering};

        use anyhow::{Result, bail};
        use async_trait::async_trait;
        use curator_talent::RoleStatus;

        use super::*;
        use crate::client::CompletionClient;

        fn fixtures() -> (Person, Role, Company) {
            let person = Person {
                id: "p1".to_string(),
                name: "Ada".to_string(),
                title: None,
                company: None,
                location: None,
                headline: None,
                linkedin_url: None,
                github_url: None,
                skills: vec![],
                experience: vec![],
                education: vec![],
                sources: BTreeSet::new(),
                warm_path: None,
            };
            let role = Role {
                id: "r1".to_string(),
                company_id: "c1".to_string(),
                title: "Backend Engineer".to_string(),
                required_skills: vec![],
                preferred_skills: vec![],
                min_years_experience: None,
                location_preference: None,
                description: String::new(),
                status: RoleStatus::Open,
            };
            let company = Company {
                id: "c1".to_string(),
                name: "Initech".to_string(),
                stage: None,
                industry: None,
                tech_stack: vec![],
                ideal_traits: None,
                anti_patterns: None,
            };
            (person, role, company)
        }

        /// Replies with a fixed score except for the TIMING prompt, which
        /// errors — exercising redistribution end to end.
        struct TimingDownClient {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl CompletionClient for TimingDownClient {
            async fn complete(&self, prompt: &str) -> Result<String> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if prompt.contains("TIMING") {
                    bail!("agent unavailable");
                }
                Ok("{\"score\": 90, \"rationale\": \"solid\"}".to_string())
            }
        }

        #[tokio::test]
        async fn timing_failure_degrades_confidence_not_the_pass() {
            let client = Arc::new(TimingDownClient {
                calls: AtomicUsize::new(0),
            });
            let ensemble = ReasoningEnsemble::new(client.clone(), 30);
            let (person, role, company) = fixtures();

            let verdict = ensemble.reason(&person, None, &role, &company).await;

            assert_eq!(client.calls.load(Ordering::SeqCst), 4);
            assert_eq!(verdict.agent_scores.len(), 3);
            assert_eq!(verdict.failed_agents, vec![AgentKind::Timing]);
            assert_eq!(verdict.aggregate, Some(90.0));
            assert!(!verdict.degraded);
            assert!((verdict.confidence - 0.6).abs() < f32::EPSILON);
        }

        struct AlwaysFailClient;

        #[async_trait]
        impl CompletionClient for AlwaysFailClient {
            async fn complete(&self, _prompt: &str) -> Result<String> {
                bail!("offline")
            }
        }

        #[tokio::test]
        async fn total_failure_marks_the_pass_degraded() {
            let ensemble = ReasoningEnsemble::new(Arc::new(AlwaysFailClient), 30);
            let (person, role, company) = fixtures();

            let verdict = ensemble.reason(&person, None, &role, &company).await;

            assert!(verdict.degraded);
            assert!(verdict.aggregate.is_none());
            assert_eq!(verdict.failed_agents.len(), 4);
            assert!(verdict.confidence <= f32::EPSILON);
        }
    }
}
