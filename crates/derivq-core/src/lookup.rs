//! Narrow interfaces onto the content repository.
//!
//! derivq never owns entity or taxonomy storage. These traits are the only
//! way the resolver and validator reach it; any backend (HTTP API, database,
//! in-memory fixture) can implement them.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Entity, EntityRef, FieldDescriptor, FileArtifact, Principal, Term};

/// Entity lookup and reference-field discovery.
#[async_trait]
pub trait EntityIndex: Send + Sync {
    /// Load an entity by type and id.
    async fn lookup_entity(&self, entity_type: &str, id: &str) -> Result<Option<Entity>>;

    /// List the entity-reference fields defined on an entity type.
    async fn list_reference_fields(&self, entity_type: &str) -> Result<Vec<FieldDescriptor>>;

    /// Entities of `entity_type` whose `field` references `target`.
    async fn find_referencing(
        &self,
        entity_type: &str,
        field: &str,
        target: &EntityRef,
    ) -> Result<Vec<Entity>>;
}

/// Resolution between taxonomy terms and their external URIs.
#[async_trait]
pub trait TermIndex: Send + Sync {
    async fn term_for_uri(&self, uri: &str) -> Result<Option<Term>>;

    async fn uri_for_term(&self, term: &Term) -> Result<Option<String>>;
}

/// Resolves the file a media entity wraps.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn source_file(&self, media: &Entity) -> Result<Option<FileArtifact>>;
}

/// Supplies the acting principal for the current dispatch.
#[async_trait]
pub trait PrincipalProvider: Send + Sync {
    async fn current_principal(&self) -> Result<Principal>;
}

/// A fixed principal, for service accounts and tests.
#[derive(Debug, Clone)]
pub struct StaticPrincipal(pub Principal);

#[async_trait]
impl PrincipalProvider for StaticPrincipal {
    async fn current_principal(&self) -> Result<Principal> {
        Ok(self.0.clone())
    }
}
