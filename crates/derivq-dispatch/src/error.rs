use derivq_auth::AuthError;
use derivq_broker::PublishError;
use derivq_config::ConfigError;
use derivq_core::{EntityRef, LookupError, TemplateSyntaxError};
use thiserror::Error;

use crate::state::DispatchState;

/// Which configured term a lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermRole {
    Source,
    Derivative,
}

impl std::fmt::Display for TermRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Derivative => f.write_str("derivative"),
        }
    }
}

/// Source or destination could not be determined.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Could not locate {role} term with uri {uri}")]
    TermNotFound { role: TermRole, uri: String },

    #[error("No media for {entity} tagged with {term_uri}")]
    NoMatchingMedia { entity: EntityRef, term_uri: String },

    #[error("Media {media} has no source file")]
    SourceFileMissing { media: EntityRef },

    #[error("{entity_type} has no reference field {field}")]
    FieldNotFound { entity_type: String, field: String },

    #[error("Field {field} on {entity} is empty")]
    EmptyField { entity: EntityRef, field: String },

    #[error("{resolver} resolver cannot handle {strategy} tasks")]
    StrategyMismatch {
        resolver: &'static str,
        strategy: &'static str,
    },

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// A path template could not be rendered.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Syntax(#[from] TemplateSyntaxError),

    #[error("Unknown token namespace [{0}:...]")]
    UnknownNamespace(String),

    #[error("Unknown token [{namespace}:{property}]")]
    UnknownProperty { namespace: String, property: String },

    #[error("Token [{namespace}:{property}] has no {namespace} in context")]
    MissingContext { namespace: String, property: String },

    #[error("Template rendered an empty path")]
    EmptyPath,

    #[error("Rendered path {0:?} still contains a token")]
    UnresolvedToken(String),
}

impl TemplateError {
    pub fn unknown_property(namespace: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            namespace: namespace.into(),
            property: property.into(),
        }
    }

    pub fn missing_context(namespace: impl Into<String>, property: impl Into<String>) -> Self {
        Self::MissingContext {
            namespace: namespace.into(),
            property: property.into(),
        }
    }
}

/// The canonical event could not be assembled.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Semantic-tag event needs a file upload URI")]
    MissingUploadUri,

    #[error(transparent)]
    Url(#[from] LookupError),

    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a dispatch stopped. Every variant except [`DispatchError::Publish`]
/// is raised before the broker is contacted.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Could not determine acting principal: {0}")]
    Principal(#[source] LookupError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl DispatchError {
    /// The state the dispatch was in when it aborted.
    pub fn stage(&self) -> DispatchState {
        match self {
            Self::Config(_) | Self::Resolution(_) => DispatchState::Resolving,
            Self::Template(_) | Self::Build(_) | Self::Principal(_) => DispatchState::Building,
            Self::Auth(_) => DispatchState::Authenticating,
            Self::Publish(_) => DispatchState::Publishing,
        }
    }

    /// Whether the failure happened after a message was handed to the broker
    /// client.
    pub fn reached_broker(&self) -> bool {
        matches!(self, Self::Publish(_))
    }
}
