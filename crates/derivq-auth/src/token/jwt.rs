//! JWT signing for dispatch credentials.
//!
//! Every published derivative event carries a bearer token that lets the
//! conversion worker call back into the repository as the acting principal.
//! Tokens are short lived and signed with RS256, RS384 or ES384.
//!
//! ```ignore
//! let key_pair = SigningKeyPair::generate(SigningAlgorithm::RS256)?;
//! let jwt = JwtService::new(key_pair, "https://repo.example.org");
//!
//! let claims = DispatchClaims::new(jwt.issuer(), "admin", "1", 300);
//! let token = jwt.encode(&claims)?;
//! let decoded = jwt.decode::<DispatchClaims>(&token)?;
//! ```

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode,
};
use p384::SecretKey as EcSecretKey;
use p384::pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Token signing and verification failures.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to sign token: {0}")]
    Sign(String),

    #[error("Failed to verify token: {0}")]
    Verify(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    /// Key material could not be generated, parsed or encoded.
    #[error("Invalid key: {0}")]
    Key(String),
}

impl JwtError {
    fn key(err: impl fmt::Display) -> Self {
        Self::Key(err.to_string())
    }

    /// Whether the token itself was rejected, as opposed to a local failure.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Expired | Self::InvalidSignature | Self::InvalidClaims(_)
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => Self::InvalidClaims(err.to_string()),
            ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidKeyFormat => Self::key(err),
            _ => Self::Verify(err.to_string()),
        }
    }
}

/// Supported signing algorithms for dispatch tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    RS256,
    RS384,
    /// ECDSA on P-384.
    ES384,
}

impl SigningAlgorithm {
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES384 => Algorithm::ES384,
        }
    }

    #[must_use]
    pub fn is_rsa(self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "ES384" => Ok(Self::ES384),
            other => Err(JwtError::Key(format!("unsupported algorithm {other}"))),
        }
    }
}

/// Claims carried by a dispatch token.
///
/// `sub` is the principal's account name and `webid` its repository id, the
/// pair conversion workers use to act on the principal's behalf.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchClaims {
    pub iss: String,
    pub sub: String,
    pub webid: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    /// Unique per token.
    pub jti: String,
}

impl DispatchClaims {
    /// Claims issued now and valid for `lifetime_secs`.
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        webid: impl Into<String>,
        lifetime_secs: i64,
    ) -> Self {
        let iat = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            iss: issuer.into(),
            sub: subject.into(),
            webid: webid.into(),
            roles: Vec::new(),
            aud: Vec::new(),
            exp: iat + lifetime_secs,
            iat,
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    #[must_use]
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    #[must_use]
    pub fn with_audience(mut self, aud: Vec<String>) -> Self {
        self.aud = aud;
        self
    }
}

/// PEM encodings of a freshly generated key pair.
#[derive(Debug, Clone)]
pub struct KeyPairPem {
    pub private_pem: String,
    pub public_pem: String,
}

/// Private key for signing plus the public key derived from it.
pub struct SigningKeyPair {
    pub kid: String,
    pub algorithm: SigningAlgorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SigningKeyPair {
    /// PKCS#8 private key and SPKI public key for `algorithm`. RSA keys are
    /// 2048 bits.
    pub fn generate_pem(algorithm: SigningAlgorithm) -> Result<KeyPairPem, JwtError> {
        let (private_pem, public_pem) = if algorithm.is_rsa() {
            let key = RsaPrivateKey::new(&mut OsRng, 2048).map_err(JwtError::key)?;
            (
                key.to_pkcs8_pem(LineEnding::LF).map_err(JwtError::key)?,
                key.to_public_key()
                    .to_public_key_pem(LineEnding::LF)
                    .map_err(JwtError::key)?,
            )
        } else {
            let key = EcSecretKey::random(&mut OsRng);
            (
                key.to_pkcs8_pem(LineEnding::LF).map_err(JwtError::key)?,
                key.public_key()
                    .to_public_key_pem(LineEnding::LF)
                    .map_err(JwtError::key)?,
            )
        };
        Ok(KeyPairPem {
            private_pem: private_pem.to_string(),
            public_pem,
        })
    }

    /// Fresh key pair with a random key id.
    pub fn generate(algorithm: SigningAlgorithm) -> Result<Self, JwtError> {
        let pem = Self::generate_pem(algorithm)?;
        Self::from_private_pem(uuid::Uuid::new_v4().to_string(), algorithm, &pem.private_pem)
    }

    /// Load a PEM private key. RSA keys may be PKCS#8 or PKCS#1; EC keys must
    /// be PKCS#8.
    pub fn from_private_pem(
        kid: impl Into<String>,
        algorithm: SigningAlgorithm,
        private_pem: &str,
    ) -> Result<Self, JwtError> {
        let bytes = private_pem.as_bytes();
        let (encoding_key, public_pem) = if algorithm.is_rsa() {
            let key = RsaPrivateKey::from_pkcs8_pem(private_pem)
                .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
                .map_err(JwtError::key)?;
            (
                EncodingKey::from_rsa_pem(bytes).map_err(JwtError::key)?,
                key.to_public_key()
                    .to_public_key_pem(LineEnding::LF)
                    .map_err(JwtError::key)?,
            )
        } else {
            let key = EcSecretKey::from_pkcs8_pem(private_pem).map_err(JwtError::key)?;
            (
                EncodingKey::from_ec_pem(bytes).map_err(JwtError::key)?,
                key.public_key()
                    .to_public_key_pem(LineEnding::LF)
                    .map_err(JwtError::key)?,
            )
        };
        let decoding_key = if algorithm.is_rsa() {
            DecodingKey::from_rsa_pem(public_pem.as_bytes())
        } else {
            DecodingKey::from_ec_pem(public_pem.as_bytes())
        }
        .map_err(JwtError::key)?;

        Ok(Self {
            kid: kid.into(),
            algorithm,
            encoding_key,
            decoding_key,
        })
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Signs dispatch tokens with a single key. `Send + Sync`.
#[derive(Debug)]
pub struct JwtService {
    key: SigningKeyPair,
    issuer: String,
}

impl JwtService {
    #[must_use]
    pub fn new(key: SigningKeyPair, issuer: impl Into<String>) -> Self {
        Self {
            key,
            issuer: issuer.into(),
        }
    }

    /// Sign `claims`; the header carries the key id.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let mut header = Header::new(self.key.algorithm.to_jwt_algorithm());
        header.kid = Some(self.key.kid.clone());
        encode(&header, claims, &self.key.encoding_key).map_err(|e| JwtError::Sign(e.to_string()))
    }

    /// Verify signature, issuer and expiry. Audience is not checked.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<TokenData<T>, JwtError> {
        let mut validation = Validation::new(self.key.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[&self.issuer]);
        validation.validate_aud = false;
        Ok(decode(token, &self.key.decoding_key, &validation)?)
    }

    #[must_use]
    pub fn current_kid(&self) -> &str {
        &self.key.kid
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "http://localhost:8000";

    fn service(algorithm: SigningAlgorithm) -> JwtService {
        JwtService::new(SigningKeyPair::generate(algorithm).unwrap(), ISSUER)
    }

    #[test]
    fn test_rs256_sign_and_verify() {
        let jwt = service(SigningAlgorithm::RS256);
        let claims = DispatchClaims::new(ISSUER, "admin", "1", 300)
            .with_roles(vec!["administrator".to_string()]);

        let token = jwt.encode(&claims).unwrap();
        let decoded = jwt.decode::<DispatchClaims>(&token).unwrap();
        assert_eq!(decoded.claims, claims);
        assert_eq!(decoded.header.kid.as_deref(), Some(jwt.current_kid()));
        assert_eq!(decoded.header.alg, Algorithm::RS256);
    }

    #[test]
    fn test_es384_sign_and_verify() {
        let jwt = service(SigningAlgorithm::ES384);
        let token = jwt.encode(&DispatchClaims::new(ISSUER, "admin", "1", 300)).unwrap();
        let decoded = jwt.decode::<DispatchClaims>(&token).unwrap();
        assert_eq!(decoded.claims.sub, "admin");
        assert_eq!(decoded.header.alg, Algorithm::ES384);
    }

    #[test]
    fn test_generated_pem_loads_back() {
        let pem = SigningKeyPair::generate_pem(SigningAlgorithm::RS384).unwrap();
        assert!(pem.private_pem.contains("PRIVATE KEY"));
        assert!(pem.public_pem.contains("PUBLIC KEY"));

        let key = SigningKeyPair::from_private_pem("kid-1", SigningAlgorithm::RS384, &pem.private_pem)
            .unwrap();
        let jwt = JwtService::new(key, ISSUER);
        let token = jwt.encode(&DispatchClaims::new(ISSUER, "u", "1", 60)).unwrap();
        assert!(jwt.decode::<DispatchClaims>(&token).is_ok());
    }

    #[test]
    fn test_ec_pem_rejected_for_rsa_algorithm() {
        let pem = SigningKeyPair::generate_pem(SigningAlgorithm::ES384).unwrap();
        let err = SigningKeyPair::from_private_pem("kid", SigningAlgorithm::RS256, &pem.private_pem)
            .unwrap_err();
        assert!(matches!(err, JwtError::Key(_)));
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_empty_audience_not_serialized() {
        let claims = DispatchClaims::new(ISSUER, "admin", "1", 300);
        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("\"webid\":\"1\""));
        assert!(!json.contains("\"aud\""));

        let json = serde_json::to_string(&claims.with_audience(vec!["houdini".into()])).unwrap();
        assert!(json.contains("\"aud\":[\"houdini\"]"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = service(SigningAlgorithm::RS256);
        let token = jwt.encode(&DispatchClaims::new(ISSUER, "admin", "1", -3600)).unwrap();
        let err = jwt.decode::<DispatchClaims>(&token).unwrap_err();
        assert!(matches!(err, JwtError::Expired));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_foreign_key_rejected() {
        let token = service(SigningAlgorithm::RS256)
            .encode(&DispatchClaims::new(ISSUER, "admin", "1", 300))
            .unwrap();
        assert!(matches!(
            service(SigningAlgorithm::RS256)
                .decode::<DispatchClaims>(&token)
                .unwrap_err(),
            JwtError::InvalidSignature
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let jwt = service(SigningAlgorithm::ES384);
        let token = jwt.encode(&DispatchClaims::new("http://elsewhere", "admin", "1", 300)).unwrap();
        assert!(matches!(
            jwt.decode::<DispatchClaims>(&token).unwrap_err(),
            JwtError::InvalidClaims(_)
        ));
    }

    #[test]
    fn test_signing_algorithm_parse() {
        assert_eq!("rs256".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::RS256);
        assert_eq!("ES384".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::ES384);
        assert!("HS256".parse::<SigningAlgorithm>().is_err());
        assert_eq!(SigningAlgorithm::RS384.to_string(), "RS384");
    }
}
