//! Read-mostly accessor over the tenant's talent graph.
//!
//! The production store is the tenant's document backend; the pipeline only
//! depends on this trait. [`MemoryTalentStore`] backs the CLI fixtures and
//! every test.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::schema::{Company, EnrichmentRecord, Person, Role};

#[derive(Debug, thiserror::Error)]
pub enum TalentError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transient store failure: {0}")]
    Transient(String),
}

#[async_trait]
pub trait TalentStore: Send + Sync {
    /// Complete enumeration of the company's people, ordered by stable id.
    async fn list_people(&self, company_id: &str) -> Result<Vec<Person>, TalentError>;

    /// All roles belonging to the company, ordered by stable id.
    async fn list_roles(&self, company_id: &str) -> Result<Vec<Role>, TalentError>;

    async fn get_role(&self, role_id: &str) -> Result<Role, TalentError>;

    async fn get_company(&self, company_id: &str) -> Result<Company, TalentError>;

    async fn get_enrichment(
        &self,
        person_id: &str,
    ) -> Result<Option<EnrichmentRecord>, TalentError>;

    async fn put_enrichment(&self, record: EnrichmentRecord) -> Result<(), TalentError>;
}

/// In-memory talent store keyed by id maps.
#[derive(Default, Debug)]
pub struct MemoryTalentStore {
    inner: RwLock<StoreInner>,
}

#[derive(Default, Debug)]
struct StoreInner {
    companies: HashMap<String, Company>,
    roles: HashMap<String, Role>,
    /// company id → person records.
    people: HashMap<String, Vec<Person>>,
    enrichments: HashMap<String, EnrichmentRecord>,
}

impl MemoryTalentStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert_company(&self, company: Company) {
        self.inner
            .write()
            .await
            .companies
            .insert(company.id.clone(), company);
    }

    /// Roles are normalised on insert so the required/preferred disjointness
    /// invariant holds for everything the store hands out.
    pub async fn insert_role(&self, role: Role) {
        let role = role.normalized();
        self.inner.write().await.roles.insert(role.id.clone(), role);
    }

    pub async fn insert_person(&self, company_id: &str, mut person: Person) {
        person.skills = crate::schema::normalize_skills(&person.skills);
        self.inner
            .write()
            .await
            .people
            .entry(company_id.to_string())
            .or_default()
            .push(person);
    }
}

#[async_trait]
impl TalentStore for MemoryTalentStore {
    async fn list_people(&self, company_id: &str) -> Result<Vec<Person>, TalentError> {
        let inner = self.inner.read().await;
        if !inner.companies.contains_key(company_id) {
            return Err(TalentError::NotFound(format!("company {company_id}")));
        }
        let mut people = inner.people.get(company_id).cloned().unwrap_or_default();
        people.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(company = company_id, count = people.len(), "listed people");
        Ok(people)
    }

    async fn list_roles(&self, company_id: &str) -> Result<Vec<Role>, TalentError> {
        let inner = self.inner.read().await;
        if !inner.companies.contains_key(company_id) {
            return Err(TalentError::NotFound(format!("company {company_id}")));
        }
        let mut roles: Vec<Role> = inner
            .roles
            .values()
            .filter(|r| r.company_id == company_id)
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(roles)
    }

    async fn get_role(&self, role_id: &str) -> Result<Role, TalentError> {
        self.inner
            .read()
            .await
            .roles
            .get(role_id)
            .cloned()
            .ok_or_else(|| TalentError::NotFound(format!("role {role_id}")))
    }

    async fn get_company(&self, company_id: &str) -> Result<Company, TalentError> {
        self.inner
            .read()
            .await
            .companies
            .get(company_id)
            .cloned()
            .ok_or_else(|| TalentError::NotFound(format!("company {company_id}")))
    }

    async fn get_enrichment(
        &self,
        person_id: &str,
    ) -> Result<Option<EnrichmentRecord>, TalentError> {
        Ok(self.inner.read().await.enrichments.get(person_id).cloned())
    }

    async fn put_enrichment(&self, record: EnrichmentRecord) -> Result<(), TalentError> {
        self.inner
            .write()
            .await
            .enrichments
            .insert(record.person_id.clone(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;
    use crate::schema::{EnrichmentPayload, RoleStatus};

    fn person(id: &str) -> Person {
        Person {
            id: id.to_string(),
            name: format!("Person {id}"),
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
        }
    }

    #[tokio::test]
    async fn list_people_is_ordered_by_stable_id() {
        let store = MemoryTalentStore::new();
        store
            .insert_company(Company {
                id: "c1".into(),
                name: "Initech".into(),
                stage: None,
                industry: None,
                tech_stack: vec![],
                ideal_traits: None,
                anti_patterns: None,
            })
            .await;
        store.insert_person("c1", person("p3")).await;
        store.insert_person("c1", person("p1")).await;
        store.insert_person("c1", person("p2")).await;

        let ids: Vec<String> = store
            .list_people("c1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn unknown_company_is_not_found() {
        let store = MemoryTalentStore::new();
        let err = store.list_people("nope").await.unwrap_err();
        assert!(matches!(err, TalentError::NotFound(_)));
    }

    #[tokio::test]
    async fn put_enrichment_replaces_wholesale() {
        let store = MemoryTalentStore::new();
        let old = EnrichmentRecord {
            person_id: "p1".into(),
            provider: "pdl".into(),
            fetched_at: Utc::now(),
            payload: EnrichmentPayload {
                skills: vec!["python".into()],
                ..Default::default()
            },
            quality: 0.4,
        };
        let new = EnrichmentRecord {
            quality: 0.9,
            payload: EnrichmentPayload::default(),
            ..old.clone()
        };
        store.put_enrichment(old).await.unwrap();
        store.put_enrichment(new).await.unwrap();

        let got = store.get_enrichment("p1").await.unwrap().unwrap();
        assert!(got.payload.skills.is_empty());
        assert!((got.quality - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn list_roles_filters_by_company() {
        let store = MemoryTalentStore::new();
        store
            .insert_company(Company {
                id: "c1".into(),
                name: "Initech".into(),
                stage: None,
                industry: None,
                tech_stack: vec![],
                ideal_traits: None,
                anti_patterns: None,
            })
            .await;
        store
            .insert_role(Role {
                id: "r1".into(),
                company_id: "c1".into(),
                title: "Backend".into(),
                required_skills: vec![],
                preferred_skills: vec![],
                min_years_experience: None,
                location_preference: None,
                description: String::new(),
                status: RoleStatus::Open,
            })
            .await;
        store
            .insert_role(Role {
                id: "r2".into(),
                company_id: "other".into(),
                title: "Frontend".into(),
                required_skills: vec![],
                preferred_skills: vec![],
                min_years_experience: None,
                location_preference: None,
                description: String::new(),
                status: RoleStatus::Open,
            })
            .await;

        let roles = store.list_roles("c1").await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].id, "r1");
    }
}
