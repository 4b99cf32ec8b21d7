//! Deterministic rule scoring over the full candidate pool.
//!
//! Scoring model (component maxima sum to 100):
//! ```text
//! score = skills(40) + experience(30) + culture(20) + signals(10)
//! ```
//! The weights are the observable contract: the same (person, role, company)
//! input always produces the same score, so the expensive stages downstream
//! can operate on a short, stable prefix of the ranked list.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::trace;

use curator_talent::{Company, Person, Role, normalize_skills};

/// Achievable maximum of the skills component.
const SKILLS_MAX: f32 = 40.0;
/// Achievable maximum of the experience component.
const EXPERIENCE_MAX: f32 = 30.0;
/// Flat experience award when the role declares no minimum.
const EXPERIENCE_FLAT: f32 = 24.0;
/// Achievable maximum of the culture component.
const CULTURE_MAX: f32 = 20.0;
/// Flat culture award for in-network candidates with no stack overlap.
const CULTURE_NETWORK_FLAT: f32 = 12.0;

/// Which required / preferred skills matched and which are still open.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillMatch {
    /// Required skills evidenced by the skill set or a title.
    pub matched: Vec<String>,
    /// Required skills with no evidence at all.
    pub missing: Vec<String>,
    pub matched_preferred: Vec<String>,
}

/// Per-component point totals, kept for rationale display and tie-breaking.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub skills: f32,
    pub experience: f32,
    pub culture: f32,
    pub signals: f32,
}

/// A rule-scored candidate. In-flight only: constructed here, consumed by
/// the engine, never persisted.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub person: Person,
    /// Rule-based fit score in [0, 100].
    pub score: f32,
    pub skill_match: SkillMatch,
    pub components: ScoreComponents,
    /// Fraction of profile fields present, in [0, 1].
    pub completeness: f32,
}

/// Score one candidate against the role and company context.
///
/// `today` anchors the years-of-experience computation so a build scores
/// every candidate against the same instant.
pub fn score_candidate(
    person: &Person,
    role: &Role,
    company: &Company,
    today: NaiveDate,
) -> ScoredCandidate {
    let (skills, skill_match) = skills_component(person, role);
    let experience = experience_component(person, role, today);
    let culture = culture_component(person, company);
    let signals = signals_component(person);

    let components = ScoreComponents {
        skills,
        experience,
        culture,
        signals,
    };
    let score = skills + experience + culture + signals;
    let completeness = person.completeness();

    trace!(
        person = %person.id,
        score,
        skills,
        experience,
        culture,
        signals,
        completeness,
        "rule-scored candidate"
    );

    ScoredCandidate {
        person: person.clone(),
        score,
        skill_match,
        components,
        completeness,
    }
}

/// Score and sort a whole candidate pool into the canonical order:
/// score desc, completeness desc, matched-required desc, matched-preferred
/// desc, stable id asc. The id anchor makes the shortlist reproducible.
pub fn rank_candidates(
    people: &[Person],
    role: &Role,
    company: &Company,
    today: NaiveDate,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = people
        .iter()
        .map(|person| score_candidate(person, role, company, today))
        .collect();
    scored.sort_by(compare_candidates);
    scored
}

fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.completeness.total_cmp(&a.completeness))
        .then_with(|| b.skill_match.matched.len().cmp(&a.skill_match.matched.len()))
        .then_with(|| {
            b.skill_match
                .matched_preferred
                .len()
                .cmp(&a.skill_match.matched_preferred.len())
        })
        .then_with(|| a.person.id.cmp(&b.person.id))
}

// ── Skills (max 40) ───────────────────────────────────────────────────────────

/// Credit for one role skill against the candidate.
fn skill_credit(skill: &str, person: &Person) -> f32 {
    if person.skills.iter().any(|s| s == skill) {
        return 1.0;
    }
    let in_title = person
        .title
        .as_deref()
        .is_some_and(|t| t.to_lowercase().contains(skill));
    let in_history = person
        .experience
        .iter()
        .any(|exp| exp.title.to_lowercase().contains(skill));
    if in_title || in_history { 0.5 } else { 0.0 }
}

fn skills_component(person: &Person, role: &Role) -> (f32, SkillMatch) {
    let mut skill_match = SkillMatch::default();

    // A role that names no skills cannot discriminate: everyone gets the max.
    if role.required_skills.is_empty() && role.preferred_skills.is_empty() {
        return (SKILLS_MAX, skill_match);
    }

    // No skill data at all scores zero here; the missing list still names
    // every required skill so the context builder can surface them.
    if person.skills.is_empty() && person.title.is_none() && person.experience.is_empty() {
        skill_match.missing = role.required_skills.clone();
        return (0.0, skill_match);
    }

    let mut earned = 0.0_f32;
    for skill in &role.required_skills {
        let credit = skill_credit(skill, person);
        earned += credit;
        if credit > 0.0 {
            skill_match.matched.push(skill.clone());
        } else {
            skill_match.missing.push(skill.clone());
        }
    }
    for skill in &role.preferred_skills {
        if skill_credit(skill, person) > 0.0 {
            earned += 0.5;
            skill_match.matched_preferred.push(skill.clone());
        }
    }

    let achievable = role.required_skills.len() as f32 + role.preferred_skills.len() as f32 * 0.5;
    (SKILLS_MAX * earned / achievable, skill_match)
}

// ── Experience (max 30) ───────────────────────────────────────────────────────

fn experience_component(person: &Person, role: &Role, today: NaiveDate) -> f32 {
    let Some(min_years) = role.min_years_experience else {
        return EXPERIENCE_FLAT;
    };
    let years = person.years_of_experience(today);
    if years >= min_years {
        EXPERIENCE_MAX
    } else {
        EXPERIENCE_MAX * (years / min_years).clamp(0.0, 1.0)
    }
}

// ── Culture (max 20) ──────────────────────────────────────────────────────────

fn culture_component(person: &Person, company: &Company) -> f32 {
    let stack = normalize_skills(&company.tech_stack);
    let matches = stack
        .iter()
        .filter(|s| person.skills.iter().any(|p| p == *s))
        .count();
    if matches > 0 {
        CULTURE_MAX * matches as f32 / stack.len() as f32
    } else if person.is_in_network() {
        CULTURE_NETWORK_FLAT
    } else {
        0.0
    }
}

// ── Signals (max 10) ──────────────────────────────────────────────────────────

fn signals_component(person: &Person) -> f32 {
    let mut points = 0.0;
    if person.github_url.is_some() {
        points += 5.0;
    }
    if person.linkedin_url.is_some() {
        points += 3.0;
    }
    if person.headline.as_deref().is_some_and(|h| !h.is_empty()) {
        points += 2.0;
    }
    points
}

// ── Tests ─────────────────────────────────────────────────────────────────────
