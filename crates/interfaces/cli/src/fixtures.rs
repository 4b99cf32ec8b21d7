//! JSON fixtures for running the pipeline against a local talent graph.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use curator_talent::{Company, MemoryTalentStore, Person, Role};

#[derive(Debug, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub people: Vec<FixturePerson>,
}

#[derive(Debug, Deserialize)]
pub struct FixturePerson {
    pub company_id: String,
    #[serde(flatten)]
    pub person: Person,
}

/// Load a fixtures file into an in-memory talent store.
pub async fn load_store(path: &Path) -> Result<Arc<MemoryTalentStore>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixtures from {}", path.display()))?;
    let fixtures: Fixtures = serde_json::from_str(&raw)
        .with_context(|| format!("parsing fixtures from {}", path.display()))?;

    let store = MemoryTalentStore::new();
    for company in fixtures.companies {
        store.insert_company(company).await;
    }
    for role in fixtures.roles {
        store.insert_role(role).await;
    }
    for entry in fixtures.people {
        store.insert_person(&entry.company_id, entry.person).await;
    }
    Ok(store)
}
