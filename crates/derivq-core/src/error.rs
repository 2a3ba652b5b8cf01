use thiserror::Error;

/// Errors raised by the content lookup collaborators.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Entity not found: {entity_type}/{id}")]
    EntityNotFound { entity_type: String, id: String },

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Invalid site URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl LookupError {
    /// Create a new EntityNotFound error
    pub fn entity_not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a new Unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Whether retrying the same lookup later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// Convenience result type for lookup operations
pub type Result<T> = std::result::Result<T, LookupError>;
