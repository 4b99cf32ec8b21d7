//! Per-candidate explanation assembly.
//!
//! Turns the rule breakdown, the ensemble verdict, and the research
//! provenance into the user-visible Context record: why-consider points,
//! unknowns, suggested interview questions, and the enrichment trail.

use serde::{Deserialize, Serialize};

use curator_enrich::{HighlightKind, ResearchHighlight};
use curator_reasoning::{AgentKind, AgentScore, ReasonedVerdict};
use curator_scoring::ScoredCandidate;

/// Maximum bullets quoted from one agent's rationale.
const MAX_BULLETS: usize = 3;
/// Maximum suggested interview questions.
const MAX_QUESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextCategory {
    SkillMatch,
    Trajectory,
    CompanyFit,
    Timing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    High,
    Medium,
    Low,
    Unknown,
}

impl Strength {
    /// ≥75 high, [50, 75) medium, below low; absent scores map to Unknown
    /// at the call site.
    fn from_score(score: f32) -> Self {
        if score >= 75.0 {
            Strength::High
        } else if score >= 50.0 {
            Strength::Medium
        } else {
            Strength::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhyConsider {
    pub category: ContextCategory,
    pub strength: Strength,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentDetails {
    /// Sources consulted for this candidate, in consultation order.
    pub sources: Vec<String>,
    pub research_highlights: Vec<ResearchHighlight>,
    /// Mean of profile completeness and reasoning confidence (0 when the
    /// candidate was never enriched).
    pub data_quality: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateContext {
    pub why_consider: Vec<WhyConsider>,
    pub unknowns: Vec<String>,
    #[serde(default)]
    pub standout_signal: Option<String>,
    #[serde(default)]
    pub warm_path: Option<String>,
    pub interview_questions: Vec<String>,
    pub enrichment: EnrichmentDetails,
}

/// Everything the builder needs, precomputed by the engine.
pub struct ContextInputs<'a> {
    pub scored: &'a ScoredCandidate,
    pub verdict: Option<&'a ReasonedVerdict>,
    pub highlights: &'a [ResearchHighlight],
    /// Whether a provider-verified enrichment record backed this candidate.
    pub enriched: bool,
}

pub fn build_context(inputs: &ContextInputs<'_>) -> CandidateContext {
    let why_consider = build_why_consider(inputs);
    let unknowns = build_unknowns(inputs);
    let interview_questions = build_questions(&unknowns, inputs);

    let confidence = inputs
        .verdict
        .filter(|_| inputs.enriched)
        .map(|v| v.confidence)
        .unwrap_or(0.0);
    let data_quality = (inputs.scored.completeness + confidence) / 2.0;

    CandidateContext {
        why_consider,
        unknowns,
        standout_signal: build_standout(inputs),
        warm_path: inputs.scored.person.warm_path.clone(),
        interview_questions,
        enrichment: EnrichmentDetails {
            sources: build_sources(inputs),
            research_highlights: inputs.highlights.to_vec(),
            data_quality,
        },
    }
}

// ─── why-consider ────────────────────────────────────────────────────────────

fn agent_for(category: ContextCategory) -> AgentKind {
    match category {
        ContextCategory::SkillMatch => AgentKind::Skills,
        ContextCategory::Trajectory => AgentKind::Trajectory,
        ContextCategory::CompanyFit => AgentKind::Fit,
        ContextCategory::Timing => AgentKind::Timing,
    }
}

fn find_agent<'a>(
    verdict: Option<&'a ReasonedVerdict>,
    agent: AgentKind,
) -> Option<&'a AgentScore> {
    verdict?.agent_scores.iter().find(|s| s.agent == agent)
}

fn build_why_consider(inputs: &ContextInputs<'_>) -> Vec<WhyConsider> {
    let categories = [
        ContextCategory::SkillMatch,
        ContextCategory::Trajectory,
        ContextCategory::CompanyFit,
        ContextCategory::Timing,
    ];

    categories
        .into_iter()
        .filter_map(|category| {
            let agent = find_agent(inputs.verdict, agent_for(category));
            match (category, agent) {
                // Skill match always has content: the rule breakdown speaks
                // even when no agent did.
                (ContextCategory::SkillMatch, agent) => {
                    let strength = agent
                        .map(|a| Strength::from_score(a.score))
                        .unwrap_or(Strength::Unknown);
                    let mut bullets = agent
                        .map(|a| rationale_bullets(&a.rationale))
                        .unwrap_or_default();
                    if bullets.is_empty() {
                        bullets = skill_bullets(inputs.scored);
                    }
                    (!bullets.is_empty()).then_some(WhyConsider {
                        category,
                        strength,
                        bullets,
                    })
                }
                (_, Some(agent)) => {
                    let bullets = rationale_bullets(&agent.rationale);
                    (!bullets.is_empty()).then_some(WhyConsider {
                        category,
                        strength: Strength::from_score(agent.score),
                        bullets,
                    })
                }
                (_, None) => None,
            }
        })
        .collect()
}

/// Verbatim quotes from the rationale are preferred: split on sentence
/// boundaries and keep up to [`MAX_BULLETS`].
fn rationale_bullets(rationale: &str) -> Vec<String> {
    rationale
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(MAX_BULLETS)
        .map(str::to_string)
        .collect()
}

fn skill_bullets(scored: &ScoredCandidate) -> Vec<String> {
    let mut bullets = Vec::new();
    if !scored.skill_match.matched.is_empty() {
        bullets.push(format!(
            "Matched required skills: {}",
            scored.skill_match.matched.join(", ")
        ));
    }
    if !scored.skill_match.matched_preferred.is_empty() {
        bullets.push(format!(
            "Matched preferred skills: {}",
            scored.skill_match.matched_preferred.join(", ")
        ));
    }
    bullets
}

// ─── unknowns & questions ────────────────────────────────────────────────────

fn build_unknowns(inputs: &ContextInputs<'_>) -> Vec<String> {
    let mut unknowns: Vec<String> = inputs
        .scored
        .skill_match
        .missing
        .iter()
        .map(|skill| format!("No evidence of {skill}"))
        .collect();
    // The core records no outreach, so interest is always open.
    unknowns.push("Interest in this opportunity".to_string());
    unknowns.push("Availability and start date".to_string());
    unknowns
}

fn build_questions(unknowns: &[String], inputs: &ContextInputs<'_>) -> Vec<String> {
    let mut questions: Vec<String> = inputs
        .scored
        .skill_match
        .missing
        .iter()
        .map(|skill| format!("How have you applied {skill} in production work?"))
        .collect();

    if let Some(weakest) = weakest_agent(inputs.verdict) {
        questions.push(weakest_question(weakest).to_string());
    }
    if unknowns.iter().any(|u| u.starts_with("Interest")) {
        questions.push("What would make a new opportunity compelling right now?".to_string());
    }
    questions.push("What does your availability look like over the next few months?".to_string());

    questions.truncate(MAX_QUESTIONS);
    questions
}

fn weakest_agent(verdict: Option<&ReasonedVerdict>) -> Option<AgentKind> {
    verdict?
        .agent_scores
        .iter()
        .min_by(|a, b| a.score.total_cmp(&b.score))
        .map(|s| s.agent)
}

fn weakest_question(agent: AgentKind) -> &'static str {
    match agent {
        AgentKind::Skills => "Which of this role's core skills is your weakest, and why?",
        AgentKind::Trajectory => "What drove your last two role changes?",
        AgentKind::Fit => "What kind of team environment brings out your best work?",
        AgentKind::Timing => "How are you feeling about your current role and tenure?",
    }
}

// ─── provenance ──────────────────────────────────────────────────────────────

fn build_sources(inputs: &ContextInputs<'_>) -> Vec<String> {
    let mut sources = vec!["manual".to_string()];
    if inputs.enriched {
        sources.push("pdl".to_string());
    }
    if !inputs.highlights.is_empty() {
        sources.push("perplexity".to_string());
    }
    sources
}

fn build_standout(inputs: &ContextInputs<'_>) -> Option<String> {
    inputs
        .highlights
        .iter()
        .find(|h| matches!(h.kind, HighlightKind::Achievement | HighlightKind::Github))
        .map(|h| h.description.clone())
        .or_else(|| {
            inputs.verdict.and_then(|v| {
                v.agent_scores
                    .iter()
                    .filter(|s| s.score >= 90.0)
                    .max_by(|a, b| a.score.total_cmp(&b.score))
                    .and_then(|s| rationale_bullets(&s.rationale).into_iter().next())
            })
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use curator_scoring::{ScoreComponents, SkillMatch};
    use curator_talent::Person;

    use super::*;

    fn scored(missing: &[&str]) -> ScoredCandidate {
        ScoredCandidate {
            person: Person {
                id: "p1".to_string(),
                name: "Ada".to_string(),
                title: None,
                company: None,
                location: None,
                headline: None,
                linkedin_url: None,
                github_url: None,
                skills: vec!["python".to_string()],
                experience: vec![],
                education: vec![],
                sources: BTreeSet::new(),
                warm_path: Some("Former teammate of your CTO".to_string()),
            },
            score: 70.0,
            skill_match: SkillMatch {
                matched: vec!["python".to_string()],
                missing: missing.iter().map(|s| s.to_string()).collect(),
                matched_preferred: vec![],
            },
            components: ScoreComponents::default(),
            completeness: 0.5,
        }
    }

    fn verdict(scores: &[(AgentKind, f32, &str)]) -> ReasonedVerdict {
        ReasonedVerdict {
            agent_scores: scores
                .iter()
                .map(|(agent, score, rationale)| AgentScore {
                    agent: *agent,
                    score: *score,
                    rationale: rationale.to_string(),
                    confidence: None,
                })
                .collect(),
            failed_agents: vec![],
            aggregate: Some(80.0),
            confidence: 0.8,
            degraded: false,
        }
    }

    #[test]
    fn strength_labels_follow_the_thresholds() {
        assert_eq!(Strength::from_score(75.0), Strength::High);
        assert_eq!(Strength::from_score(74.9), Strength::Medium);
        assert_eq!(Strength::from_score(50.0), Strength::Medium);
        assert_eq!(Strength::from_score(49.9), Strength::Low);
    }

    #[test]
    fn why_consider_quotes_the_rationale_capped_at_three_bullets() {
        let v = verdict(&[(
            AgentKind::Skills,
            82.0,
            "Deep Python work. Shipped two services. Owns infra. Extra sentence.",
        )]);
        let s = scored(&["fastapi"]);
        let ctx = build_context(&ContextInputs {
            scored: &s,
            verdict: Some(&v),
            highlights: &[],
            enriched: true,
        });

        let skill_entry = &ctx.why_consider[0];
        assert_eq!(skill_entry.category, ContextCategory::SkillMatch);
        assert_eq!(skill_entry.strength, Strength::High);
        assert_eq!(skill_entry.bullets.len(), 3);
        assert_eq!(skill_entry.bullets[0], "Deep Python work.");
    }

    #[test]
    fn categories_without_agent_output_are_omitted_except_skill_match() {
        let s = scored(&["fastapi"]);
        let ctx = build_context(&ContextInputs {
            scored: &s,
            verdict: None,
            highlights: &[],
            enriched: false,
        });

        assert_eq!(ctx.why_consider.len(), 1);
        assert_eq!(ctx.why_consider[0].category, ContextCategory::SkillMatch);
        assert_eq!(ctx.why_consider[0].strength, Strength::Unknown);
        assert_eq!(
            ctx.why_consider[0].bullets[0],
            "Matched required skills: python"
        );
    }

    #[test]
    fn unknowns_carry_missing_skills_and_the_two_standing_items() {
        let s = scored(&["fastapi"]);
        let ctx = build_context(&ContextInputs {
            scored: &s,
            verdict: None,
            highlights: &[],
            enriched: false,
        });
        assert_eq!(
            ctx.unknowns,
            vec![
                "No evidence of fastapi",
                "Interest in this opportunity",
                "Availability and start date",
            ]
        );
    }

    #[test]
    fn questions_are_capped_at_five() {
        let s = scored(&["fastapi", "kafka", "terraform", "react", "go"]);
        let v = verdict(&[(AgentKind::Timing, 30.0, "Recently promoted.")]);
        let ctx = build_context(&ContextInputs {
            scored: &s,
            verdict: Some(&v),
            highlights: &[],
            enriched: true,
        });
        assert_eq!(ctx.interview_questions.len(), 5);
        assert!(ctx.interview_questions[0].contains("fastapi"));
    }

    #[test]
    fn sources_list_in_consultation_order() {
        let s = scored(&[]);
        let highlights = vec![ResearchHighlight {
            kind: HighlightKind::Github,
            description: "Maintains a widely used crate".to_string(),
            url: None,
        }];
        let ctx = build_context(&ContextInputs {
            scored: &s,
            verdict: None,
            highlights: &highlights,
            enriched: true,
        });
        assert_eq!(ctx.enrichment.sources, vec!["manual", "pdl", "perplexity"]);
        assert_eq!(
            ctx.standout_signal.as_deref(),
            Some("Maintains a widely used crate")
        );
    }

    #[test]
    fn data_quality_is_zero_confidence_when_unenriched() {
        let s = scored(&[]);
        let v = verdict(&[(AgentKind::Skills, 90.0, "Great.")]);
        let ctx = build_context(&ContextInputs {
            scored: &s,
            verdict: Some(&v),
            highlights: &[],
            enriched: false,
        });
        // mean(completeness 0.5, 0.0) = 0.25
        assert!((ctx.enrichment.data_quality - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn warm_path_flows_through_from_the_talent_graph() {
        let s = scored(&[]);
        let ctx = build_context(&ContextInputs {
            scored: &s,
            verdict: None,
            highlights: &[],
            enriched: false,
        });
        assert_eq!(ctx.warm_path.as_deref(), Some("Former teammate of your CTO"));
    }
}
