//! Short-lived credentials for derivative dispatch.
//!
//! A dispatch carries an `Authorization: Bearer <jwt>` header bound to the
//! principal whose save triggered it, so conversion workers can write the
//! finished derivative back with that principal's permissions.

pub mod config;
pub mod error;
pub mod provider;
pub mod token;

pub use config::{AuthConfig, SigningConfig};
pub use error::AuthError;
pub use provider::{AuthProvider, JwtAuthProvider};
pub use token::{DispatchClaims, JwtError, JwtService, SigningAlgorithm, SigningKeyPair};
