//! Token signing.
//!
//! - [`jwt`]: signing keys, claims and the `JwtService`

pub mod jwt;

pub use jwt::{DispatchClaims, JwtError, JwtService, KeyPairPem, SigningAlgorithm, SigningKeyPair};
