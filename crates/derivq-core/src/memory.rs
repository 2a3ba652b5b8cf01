//! In-memory repository implementing every lookup collaborator.
//!
//! Backs the CLI's fixture mode and the test suites. Fixtures are plain JSON:
//!
//! ```json
//! {
//!   "entities": [{"entity_type": "node", "id": "1", "bundle": "page"}],
//!   "reference_fields": {"media": [{"name": "field_media_of", "target_type": "node"}]},
//!   "terms": [{"id": "3", "name": "Service File", "uri": "http://pcdm.org/use#ServiceFile"}],
//!   "files": [{"id": "1", "uri": "public://a.tiff", "url": "http://localhost/files/a.tiff"}]
//! }
//! ```
//!
//! A media entity's source file is the first reference it holds to an entity
//! of type `file`.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::lookup::{EntityIndex, MediaSource, TermIndex};
use crate::model::{
    Entity, EntityRef, FILE_ENTITY_TYPE, FieldDescriptor, FileArtifact, Principal, Term,
    compare_ids,
};

/// On-disk fixture format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub reference_fields: BTreeMap<String, Vec<FieldDescriptor>>,
    #[serde(default)]
    pub terms: Vec<Term>,
    #[serde(default)]
    pub files: Vec<FileArtifact>,
    #[serde(default)]
    pub principal: Option<Principal>,
}

#[derive(Debug, Default)]
struct State {
    entities: BTreeMap<EntityRef, Entity>,
    reference_fields: BTreeMap<String, Vec<FieldDescriptor>>,
    terms: BTreeMap<String, Term>,
    files: BTreeMap<String, FileArtifact>,
}

/// Content repository held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut state = State {
            reference_fields: fixture.reference_fields,
            ..Default::default()
        };
        for entity in fixture.entities {
            state.entities.insert(entity.to_ref(), entity);
        }
        for term in fixture.terms {
            state.terms.insert(term.id.clone(), term);
        }
        for file in fixture.files {
            state.files.insert(file.id.clone(), file);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Load a JSON fixture file.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, Option<Principal>)> {
        let content = std::fs::read_to_string(path)?;
        let fixture: Fixture = serde_json::from_str(&content)?;
        let principal = fixture.principal.clone();
        Ok((Self::from_fixture(fixture), principal))
    }

    pub async fn insert_entity(&self, entity: Entity) {
        self.state
            .write()
            .await
            .entities
            .insert(entity.to_ref(), entity);
    }

    pub async fn insert_term(&self, term: Term) {
        self.state.write().await.terms.insert(term.id.clone(), term);
    }

    pub async fn insert_file(&self, file: FileArtifact) {
        self.state.write().await.files.insert(file.id.clone(), file);
    }

    pub async fn define_reference_field(&self, entity_type: &str, field: FieldDescriptor) {
        let mut state = self.state.write().await;
        let fields = state
            .reference_fields
            .entry(entity_type.to_string())
            .or_default();
        if !fields.iter().any(|f| f.name == field.name) {
            fields.push(field);
        }
    }
}

#[async_trait]
impl EntityIndex for MemoryRepository {
    async fn lookup_entity(&self, entity_type: &str, id: &str) -> Result<Option<Entity>> {
        let key = EntityRef::new(entity_type, id);
        Ok(self.state.read().await.entities.get(&key).cloned())
    }

    async fn list_reference_fields(&self, entity_type: &str) -> Result<Vec<FieldDescriptor>> {
        Ok(self
            .state
            .read()
            .await
            .reference_fields
            .get(entity_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_referencing(
        &self,
        entity_type: &str,
        field: &str,
        target: &EntityRef,
    ) -> Result<Vec<Entity>> {
        let state = self.state.read().await;
        let mut found: Vec<Entity> = state
            .entities
            .values()
            .filter(|e| e.entity_type == entity_type && e.references_target(field, target))
            .cloned()
            .collect();
        found.sort_by(|a, b| compare_ids(&a.id, &b.id));
        Ok(found)
    }
}

#[async_trait]
impl TermIndex for MemoryRepository {
    async fn term_for_uri(&self, uri: &str) -> Result<Option<Term>> {
        if uri.is_empty() {
            return Ok(None);
        }
        let state = self.state.read().await;
        let mut matches: Vec<&Term> = state.terms.values().filter(|t| t.uri == uri).collect();
        matches.sort_by(|a, b| compare_ids(&a.id, &b.id));
        Ok(matches.first().map(|t| (*t).clone()))
    }

    async fn uri_for_term(&self, term: &Term) -> Result<Option<String>> {
        Ok(self
            .state
            .read()
            .await
            .terms
            .get(&term.id)
            .map(|t| t.uri.clone()))
    }
}

#[async_trait]
impl MediaSource for MemoryRepository {
    async fn source_file(&self, media: &Entity) -> Result<Option<FileArtifact>> {
        let file_ref = media
            .fields
            .values()
            .flatten()
            .find(|r| r.entity_type == FILE_ENTITY_TYPE);
        let Some(file_ref) = file_ref else {
            return Ok(None);
        };
        Ok(self.state.read().await.files.get(&file_ref.id).cloned())
    }
}
