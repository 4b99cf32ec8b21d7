use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One position in a person's work history.
///
/// `end` is `None` for a role the person still holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

/// A candidate record in the tenant's talent graph.
///
/// Fields the source imports could not fill are explicit `None`s — every
/// downstream consumer must be safe on absence. Identifiers are opaque
/// strings, unique per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    /// Normalised via [`normalize_skills`] at construction / ingest time.
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    /// Which imports contributed to this record (e.g. `linkedin_import`,
    /// `csv_import`, `search`).
    #[serde(default)]
    pub sources: BTreeSet<String>,
    /// In-network connection description, when the talent graph has one.
    #[serde(default)]
    pub warm_path: Option<String>,
}

impl Person {
    /// A person is in the tenant's imported network when any source
    /// attribution is something other than external search.
    pub fn is_in_network(&self) -> bool {
        self.sources.iter().any(|s| s != "search")
    }

    /// Fraction of the six profile fields (title, company, location, skills,
    /// experience, education) that carry data.
    pub fn completeness(&self) -> f32 {
        let present = [
            self.title.is_some(),
            self.company.is_some(),
            self.location.is_some(),
            !self.skills.is_empty(),
            !self.experience.is_empty(),
            !self.education.is_empty(),
        ];
        present.iter().filter(|p| **p).count() as f32 / present.len() as f32
    }

    /// Total years of experience: per-entry durations summed, open entries
    /// counted up to today.
    pub fn years_of_experience(&self, today: NaiveDate) -> f32 {
        self.experience
            .iter()
            .filter_map(|exp| {
                let start = exp.start?;
                let end = exp.end.unwrap_or(today);
                let days = (end - start).num_days();
                (days > 0).then_some(days as f32 / 365.25)
            })
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleStatus {
    Open,
    Filled,
    Paused,
}

/// An open (or previously open) role the tenant is hiring for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub company_id: String,
    pub title: String,
    /// Ordered, unique, normalised. Disjoint from `preferred_skills`.
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    #[serde(default)]
    pub min_years_experience: Option<f32>,
    #[serde(default)]
    pub location_preference: Option<String>,
    #[serde(default)]
    pub description: String,
    pub status: RoleStatus,
}

impl Role {
    /// Normalise both skill lists and drop preferred skills that duplicate a
    /// required one, preserving the stated ordering.
    pub fn normalized(mut self) -> Self {
        self.required_skills = normalize_skills(&self.required_skills);
        let required: BTreeSet<&str> =
            self.required_skills.iter().map(String::as_str).collect();
        self.preferred_skills = normalize_skills(&self.preferred_skills)
            .into_iter()
            .filter(|s| !required.contains(s.as_str()))
            .collect();
        self
    }
}

/// Tenant context for reasoning. Read-only from the pipeline's view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub ideal_traits: Option<String>,
    #[serde(default)]
    pub anti_patterns: Option<String>,
}

/// Provider-verified profile data attached to a person after enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentPayload {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
}

/// At most one record per (person, provider); replaced wholesale on refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub person_id: String,
    pub provider: String,
    pub fetched_at: DateTime<Utc>,
    pub payload: EnrichmentPayload,
    /// Provider's own estimate of match/record quality in [0, 1].
    pub quality: f32,
}

/// Lowercase, trim, dedupe. First occurrence wins so the caller's ordering
/// is preserved.
pub fn normalize_skills(skills: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
