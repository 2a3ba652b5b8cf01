//! Credential issuance configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::token::SigningAlgorithm;

/// Longest lifetime accepted for dispatch tokens.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 3600);

/// Auth configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://repo.example.org"
/// token_lifetime = "5m"
///
/// [auth.signing]
/// algorithm = "RS256"
/// private_key_path = "/etc/derivq/private.pem"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token `iss` claim. Typically the repository's public base URL.
    pub issuer: String,

    /// How long an issued token stays valid.
    #[serde(with = "humantime_serde")]
    pub token_lifetime: Duration,

    /// Token `aud` claim; omitted when empty.
    pub audience: Vec<String>,

    /// Token signing configuration.
    pub signing: SigningConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8000".to_string(),
            token_lifetime: Duration::from_secs(300), // 5 minutes
            audience: Vec::new(),
            signing: SigningConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.issuer.trim().is_empty() {
            return Err("auth.issuer must not be empty".into());
        }
        if self.token_lifetime.is_zero() {
            return Err("auth.token_lifetime must be > 0".into());
        }
        if self.token_lifetime > MAX_TOKEN_LIFETIME {
            return Err("auth.token_lifetime must not exceed 24h".into());
        }
        if let Some(path) = &self.signing.private_key_path
            && path.as_os_str().is_empty()
        {
            return Err("auth.signing.private_key_path must not be empty when set".into());
        }
        Ok(())
    }
}

/// Signing key configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Signing algorithm: RS256, RS384 or ES384.
    pub algorithm: SigningAlgorithm,

    /// PEM private key. When unset an ephemeral key is generated at startup,
    /// which is only useful for development: workers cannot verify tokens
    /// across restarts.
    pub private_key_path: Option<PathBuf>,

    /// Key id placed in the token header.
    pub key_id: Option<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: SigningAlgorithm::RS256,
            private_key_path: None,
            key_id: None,
        }
    }
}
