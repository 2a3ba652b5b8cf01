//! Entity mutation events emitted by a trigger source.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::model::Entity;

/// Type of entity mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    /// Entity was created
    Created,
    /// Entity was updated
    Updated,
    /// Entity was deleted
    Deleted,
}

impl MutationKind {
    /// Returns the string representation of the mutation kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Created => "created",
            MutationKind::Updated => "updated",
            MutationKind::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event representing a saved or deleted content entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationEvent {
    /// Type of change (created, updated, deleted)
    pub kind: MutationKind,
    /// The entity as it was saved (last known state for deletions)
    pub entity: Entity,
    /// Timestamp of the event
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl MutationEvent {
    /// Create a new mutation event.
    pub fn new(kind: MutationKind, entity: Entity) -> Self {
        Self {
            kind,
            entity,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Create a "created" event.
    pub fn created(entity: Entity) -> Self {
        Self::new(MutationKind::Created, entity)
    }

    /// Create an "updated" event.
    pub fn updated(entity: Entity) -> Self {
        Self::new(MutationKind::Updated, entity)
    }

    /// Create a "deleted" event.
    pub fn deleted(entity: Entity) -> Self {
        Self::new(MutationKind::Deleted, entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(MutationKind::Created.to_string(), "created");
        assert_eq!(MutationKind::Updated.to_string(), "updated");
        assert_eq!(MutationKind::Deleted.to_string(), "deleted");
    }

    #[test]
    fn test_event_serialization() {
        let event = MutationEvent::created(Entity::new("node", "1", "page"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "created");
        assert_eq!(json["entity"]["id"], "1");
        assert!(json["timestamp"].is_string());
    }
}
