//! Credential issuance for outgoing derivative events.

use std::time::Duration;

use async_trait::async_trait;
use derivq_core::Principal;
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::token::{DispatchClaims, JwtService, SigningKeyPair};

/// Issues a short-lived credential bound to a principal.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Issue a bearer token for `principal`.
    async fn issue(&self, principal: &Principal) -> Result<String, AuthError>;
}

/// [`AuthProvider`] backed by a [`JwtService`].
#[derive(Debug)]
pub struct JwtAuthProvider {
    jwt: JwtService,
    lifetime: Duration,
    audience: Vec<String>,
}

impl JwtAuthProvider {
    pub fn new(jwt: JwtService, lifetime: Duration) -> Self {
        Self {
            jwt,
            lifetime,
            audience: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Build a provider from configuration, loading the signing key from disk
    /// or generating an ephemeral one.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the key cannot be
    /// read or parsed.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        config.validate().map_err(AuthError::invalid_config)?;

        let algorithm = config.signing.algorithm;
        let key_pair = match &config.signing.private_key_path {
            Some(path) => {
                let pem = std::fs::read_to_string(path).map_err(|source| AuthError::KeyFile {
                    path: path.clone(),
                    source,
                })?;
                let kid = config
                    .signing
                    .key_id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                SigningKeyPair::from_private_pem(kid, algorithm, &pem)?
            }
            None => {
                warn!(
                    algorithm = %algorithm,
                    "No signing key configured, generating an ephemeral key"
                );
                SigningKeyPair::generate(algorithm)?
            }
        };

        let jwt = JwtService::new(key_pair, config.issuer.clone());
        Ok(Self::new(jwt, config.token_lifetime).with_audience(config.audience.clone()))
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn issue(&self, principal: &Principal) -> Result<String, AuthError> {
        if principal.name.is_empty() {
            return Err(AuthError::invalid_principal("principal has no name"));
        }

        let lifetime = i64::try_from(self.lifetime.as_secs())
            .map_err(|_| AuthError::invalid_config("token lifetime out of range"))?;
        let claims = DispatchClaims::new(self.jwt.issuer(), &principal.name, &principal.id, lifetime)
            .with_roles(principal.roles.clone())
            .with_audience(self.audience.clone());

        let token = self.jwt.encode(&claims)?;
        debug!(
            principal = %principal.name,
            kid = %self.jwt.current_kid(),
            jti = %claims.jti,
            "Issued dispatch token"
        );
        Ok(token)
    }
}
