//! Prompt artefacts for the reasoning ensemble.
//!
//! The agent prompts are part of the pipeline's observable contract — they
//! define what "skills", "trajectory", "fit", and "timing" mean. They are
//! versioned here and referenced by [`PROMPT_VERSION`] in the reasoning-cache
//! key, so a prompt change invalidates cached verdicts.

use curator_talent::{Company, EnrichmentRecord, Person, Role};

use crate::ensemble::AgentKind;

/// Bump on any change to the templates below.
pub const PROMPT_VERSION: &str = "curation-reasoning/v1";

const SKILLS_DIRECTIVE: &str = "\
You assess SKILL DEPTH. Token overlap is not evidence: judge whether the \
work history demonstrates the required skills in practice (what was built, \
at what scale, for how long). Penalise skills listed but never exercised.";

const TRAJECTORY_DIRECTIVE: &str = "\
You assess CAREER TRAJECTORY. Look at growth pattern, tenure cadence, and \
role progression: increasing scope, healthy tenures, deliberate moves. \
Penalise stagnation and unexplained churn; reward consistent advancement.";

const FIT_DIRECTIVE: &str = "\
You assess COMPANY FIT. Compare the candidate against the company's ideal \
traits and anti-patterns. Weigh stage and environment experience: has this \
person thrived somewhere like this company before?";

const TIMING_DIRECTIVE: &str = "\
You assess TIMING. Estimate openness to a move: tenure in the current role, \
layoff exposure at the current employer, and recent profile changes. Long \
tenure with no growth or recent disruption suggests openness.";

/// Assemble the full prompt for one agent over one candidate.
pub fn build_agent_prompt(
    agent: AgentKind,
    person: &Person,
    enrichment: Option<&EnrichmentRecord>,
    role: &Role,
    company: &Company,
) -> String {
    let directive = match agent {
        AgentKind::Skills => SKILLS_DIRECTIVE,
        AgentKind::Trajectory => TRAJECTORY_DIRECTIVE,
        AgentKind::Fit => FIT_DIRECTIVE,
        AgentKind::Timing => TIMING_DIRECTIVE,
    };

    format!(
        "{directive}\n\n\
         ROLE:\n{role_block}\n\n\
         COMPANY:\n{company_block}\n\n\
         CANDIDATE:\n{candidate_block}\n\n\
         Respond ONLY with a JSON object:\n\
         {{\"score\": <0-100 integer>, \"rationale\": \"<1-3 sentences>\", \
         \"confidence\": <0.0-1.0>}}",
        role_block = build_role_block(role),
        company_block = build_company_block(company),
        candidate_block = build_candidate_block(person, enrichment),
    )
}

// ─── block builders ──────────────────────────────────────────────────────────

fn build_role_block(role: &Role) -> String {
    let mut lines = vec![format!("- title: {}", role.title)];
    if !role.required_skills.is_empty() {
        lines.push(format!("- required skills: {}", role.required_skills.join(", ")));
    }
    if !role.preferred_skills.is_empty() {
        lines.push(format!("- preferred skills: {}", role.preferred_skills.join(", ")));
    }
    if let Some(min) = role.min_years_experience {
        lines.push(format!("- minimum years of experience: {min}"));
    }
    if !role.description.is_empty() {
        lines.push(format!("- description: {}", role.description));
    }
    lines.join("\n")
}

fn build_company_block(company: &Company) -> String {
    let mut lines = vec![format!("- name: {}", company.name)];
    if let Some(stage) = &company.stage {
        lines.push(format!("- stage: {stage}"));
    }
    if let Some(industry) = &company.industry {
        lines.push(format!("- industry: {industry}"));
    }
    if !company.tech_stack.is_empty() {
        lines.push(format!("- tech stack: {}", company.tech_stack.join(", ")));
    }
    if let Some(traits) = &company.ideal_traits {
        lines.push(format!("- ideal candidate traits: {traits}"));
    }
    if let Some(anti) = &company.anti_patterns {
        lines.push(format!("- anti-patterns: {anti}"));
    }
    lines.join("\n")
}

/// Prefer the provider-verified payload over the sparse baseline record when
/// enrichment succeeded.
fn build_candidate_block(person: &Person, enrichment: Option<&EnrichmentRecord>) -> String {
    let mut lines = vec![format!("- name: {}", person.name)];
    if let Some(title) = &person.title {
        lines.push(format!("- current title: {title}"));
    }
    if let Some(company) = &person.company {
        lines.push(format!("- current company: {company}"));
    }
    if let Some(location) = &person.location {
        lines.push(format!("- location: {location}"));
    }

    let (skills, experience, provenance) = match enrichment {
        Some(record) if !record.payload.skills.is_empty() || !record.payload.experience.is_empty() => (
            &record.payload.skills,
            &record.payload.experience,
            "provider-verified",
        ),
        _ => (&person.skills, &person.experience, "imported, unverified"),
    };

    lines.push(format!("- data provenance: {provenance}"));
    if !skills.is_empty() {
        lines.push(format!("- skills: {}", skills.join(", ")));
    }
    if !experience.is_empty() {
        lines.push("- experience:".to_string());
        for exp in experience {
            let span = match (exp.start, exp.end) {
                (Some(start), Some(end)) => format!(" ({start} – {end})"),
                (Some(start), None) => format!(" ({start} – present)"),
                _ => String::new(),
            };
            lines.push(format!("    - {} at {}{span}", exp.title, exp.company));
        }
    }
    lines.join("\n")
}
