//! Entity schema and store accessor for the tenant talent graph.

pub mod schema;
pub mod store;

pub use schema::{
    Company, Education, EnrichmentPayload, EnrichmentRecord, Experience, Person, Role,
    RoleStatus, normalize_skills,
};
pub use store::{MemoryTalentStore, TalentError, TalentStore};
