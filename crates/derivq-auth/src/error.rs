//! Error types for credential issuance.

use std::path::PathBuf;

use crate::token::JwtError;

/// Errors raised while issuing a dispatch credential.
///
/// Any of these aborts the dispatch before the event reaches the broker.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Signing the token failed.
    #[error("Token signing failed: {0}")]
    Signing(#[from] JwtError),

    /// The signing key file could not be read.
    #[error("Cannot read signing key {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The principal cannot be bound to a token.
    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),

    /// The auth configuration is unusable.
    #[error("Invalid auth configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    #[must_use]
    pub fn invalid_principal(message: impl Into<String>) -> Self {
        Self::InvalidPrincipal(message.into())
    }

    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
