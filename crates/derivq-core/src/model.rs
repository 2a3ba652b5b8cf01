//! Content model shared by the lookup collaborators and the dispatcher.
//!
//! Entities are deliberately thin: an identity, a bundle, a label and the
//! entity-reference fields the resolver walks. Anything else the repository
//! stores is irrelevant to derivative dispatch.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Entity type of media artifacts.
pub const MEDIA_ENTITY_TYPE: &str = "media";

/// Entity type of taxonomy terms.
pub const TERM_ENTITY_TYPE: &str = "taxonomy_term";

/// Entity type of stored files.
pub const FILE_ENTITY_TYPE: &str = "file";

/// A typed pointer to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Parse a `type/id` reference as used on the command line.
    pub fn parse(reference: &str) -> Option<Self> {
        let (entity_type, id) = reference.split_once('/')?;
        if entity_type.is_empty() || id.is_empty() || id.contains('/') {
            return None;
        }
        Some(Self::new(entity_type, id))
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

/// A content entity (node, media, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: String,
    pub id: String,
    pub bundle: String,
    #[serde(default)]
    pub label: String,
    /// Entity-reference fields keyed by field name.
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<EntityRef>>,
}

impl Entity {
    pub fn new(
        entity_type: impl Into<String>,
        id: impl Into<String>,
        bundle: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            bundle: bundle.into(),
            label: String::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Append a reference to a field.
    pub fn with_reference(mut self, field: impl Into<String>, target: EntityRef) -> Self {
        self.fields.entry(field.into()).or_default().push(target);
        self
    }

    pub fn to_ref(&self) -> EntityRef {
        EntityRef::new(&self.entity_type, &self.id)
    }

    /// Values of a reference field; empty when the field is unset.
    pub fn references(&self, field: &str) -> &[EntityRef] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn references_target(&self, field: &str, target: &EntityRef) -> bool {
        self.references(field).iter().any(|r| r == target)
    }
}

/// A taxonomy term carrying an external URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: String,
    pub name: String,
    pub uri: String,
}

impl Term {
    pub fn to_ref(&self) -> EntityRef {
        EntityRef::new(TERM_ENTITY_TYPE, &self.id)
    }
}

/// The stored file behind a media entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileArtifact {
    pub id: String,
    /// Storage URI, e.g. `public://2024-01/photo.tiff`.
    pub uri: String,
    /// Canonical absolute URL the file is served from.
    pub url: String,
}

/// Describes one entity-reference field of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub target_type: String,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
        }
    }
}

/// The acting user on whose behalf events are emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Total order over entity identifiers: integer ids first, by value (so
/// `"2"` sorts before `"10"`), then every other id lexically. Ties between
/// equal values with different spellings (`"010"`, `"10"`) break lexically.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    id_sort_key(a).cmp(&id_sort_key(b))
}

fn id_sort_key(id: &str) -> (bool, u64, &str) {
    match id.parse::<u64>() {
        Ok(value) => (false, value, id),
        Err(_) => (true, 0, id),
    }
}
