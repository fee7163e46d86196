use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use ring::{
    rand::SystemRandom,
    signature::{
        EcdsaKeyPair, Ed25519KeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::Config, models::user::Role, utils::keys};

pub const TOKEN_AUDIENCE: &str = "user";
pub const REFRESH_AUDIENCE: &str = "refresh";
pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("no token audience")]
    NoAudience,
    #[error("bad token issuer or audience")]
    BadIssuerOrAudience,
    #[error("malformed token: {0}")]
    Malformed(jsonwebtoken::errors::Error),
    #[error("could not sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidAudience | ErrorKind::InvalidIssuer => {
                TokenError::BadIssuerOrAudience
            }
            ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => TokenError::NoAudience,
            ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => {
                TokenError::BadIssuerOrAudience
            }
            _ => TokenError::Malformed(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub uuid: Uuid,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub iss: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub nbf: i64,
}

impl Claims {
    pub fn new(id: i32, uuid: Uuid, roles: Vec<Role>) -> Self {
        Self {
            id,
            uuid,
            roles,
            iss: String::new(),
            aud: Vec::new(),
            exp: 0,
            iat: 0,
            nbf: 0,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    /// Unix seconds at which `token` stops validating.
    pub expires: i64,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,
}

/// Key material and lifetimes used to mint and check tokens.
#[derive(Clone)]
pub struct TokenConfig {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenConfig {
    fn with_keys(algorithm: Algorithm, encoding: EncodingKey, decoding: DecodingKey) -> Self {
        Self {
            algorithm,
            encoding,
            decoding,
            issuer: "harrybrwn.com".to_string(),
            access_ttl: Duration::hours(2),
            refresh_ttl: Duration::days(5),
        }
    }

    pub fn ed25519_from_seed(seed: &[u8; 32]) -> anyhow::Result<Self> {
        let pair = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|e| anyhow::anyhow!("invalid ed25519 seed: {}", e))?;
        let der = keys::ed25519_pkcs8_der(seed);
        let public = URL_SAFE_NO_PAD.encode(pair.public_key().as_ref());
        Ok(Self::with_keys(
            Algorithm::EdDSA,
            EncodingKey::from_ed_der(&der),
            DecodingKey::from_ed_components(&public)?,
        ))
    }

    pub fn generate_ed25519() -> anyhow::Result<Self> {
        Self::ed25519_from_seed(&keys::generate_seed()?)
    }

    pub fn from_ed_pem(private_pem: &[u8], public_pem: &[u8]) -> anyhow::Result<Self> {
        Ok(Self::with_keys(
            Algorithm::EdDSA,
            EncodingKey::from_ed_pem(private_pem)?,
            DecodingKey::from_ed_pem(public_pem)?,
        ))
    }

    pub fn generate_es256() -> anyhow::Result<Self> {
        let rng = SystemRandom::new();
        let alg = &ECDSA_P256_SHA256_FIXED_SIGNING;
        let document = EcdsaKeyPair::generate_pkcs8(alg, &rng)
            .map_err(|e| anyhow::anyhow!("generate p256 key: {}", e))?;
        let pair = EcdsaKeyPair::from_pkcs8(alg, document.as_ref(), &rng)
            .map_err(|e| anyhow::anyhow!("load p256 key: {}", e))?;
        // Uncompressed SEC1 point: 0x04 || x || y
        let point = pair.public_key().as_ref();
        let x = URL_SAFE_NO_PAD.encode(&point[1..33]);
        let y = URL_SAFE_NO_PAD.encode(&point[33..65]);
        Ok(Self::with_keys(
            Algorithm::ES256,
            EncodingKey::from_ec_der(document.as_ref()),
            DecodingKey::from_ec_components(&x, &y)?,
        ))
    }

    /// Picks keys from a PEM pair, then a hex seed, then a throwaway key.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut token_config = match (
            &config.jwt_private_key_file,
            &config.jwt_public_key_file,
            &config.jwt_seed,
        ) {
            (Some(private), Some(public), _) => {
                let private = std::fs::read(private)
                    .map_err(|e| anyhow::anyhow!("read {}: {}", private, e))?;
                let public = std::fs::read(public)
                    .map_err(|e| anyhow::anyhow!("read {}: {}", public, e))?;
                Self::from_ed_pem(&private, &public)?
            }
            (_, _, Some(seed)) => Self::ed25519_from_seed(&keys::decode_seed(seed)?)?,
            _ => {
                tracing::warn!("no JWT key configured, generating an ephemeral ed25519 key");
                Self::generate_ed25519()?
            }
        };
        token_config.issuer = config.jwt_issuer.clone();
        token_config.access_ttl = Duration::minutes(config.access_token_expiration_minutes as i64);
        token_config.refresh_ttl = Duration::hours(config.refresh_token_expiration_hours as i64);
        Ok(token_config)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding).map_err(TokenError::Signing)
    }

    fn validation(&self, audience: &str) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation
    }

    fn validate(&self, token: &str, audience: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation(audience))?;
        Ok(data.claims)
    }

    /// Signs a fresh access token and a refresh token with the same key.
    pub fn new_token_response(&self, claims: &Claims) -> Result<TokenResponse, TokenError> {
        let mut response = self.new_access_token(claims)?;

        let now = Utc::now();
        let mut refresh = claims.clone();
        refresh.iss = self.issuer.clone();
        refresh.aud = vec![REFRESH_AUDIENCE.to_string()];
        refresh.iat = now.timestamp();
        refresh.nbf = now.timestamp();
        refresh.exp = (now + self.refresh_ttl).timestamp();
        response.refresh_token = self.sign(&refresh)?;
        Ok(response)
    }

    pub fn new_access_token(&self, claims: &Claims) -> Result<TokenResponse, TokenError> {
        let now = Utc::now();
        let mut access = claims.clone();
        access.iss = self.issuer.clone();
        access.aud = vec![TOKEN_AUDIENCE.to_string()];
        access.iat = now.timestamp();
        access.nbf = now.timestamp();
        access.exp = (now + self.access_ttl).timestamp();

        Ok(TokenResponse {
            token: self.sign(&access)?,
            expires: access.exp,
            token_type: TOKEN_TYPE.to_string(),
            refresh_token: String::new(),
        })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, TOKEN_AUDIENCE)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, REFRESH_AUDIENCE)
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn sign_raw(&self, claims: &Claims) -> Result<String, TokenError> {
        self.sign(claims)
    }
}

pub fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case(TOKEN_TYPE) {
        let token = rest.trim();
        (!token.is_empty()).then_some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims::new(7, Uuid::new_v4(), vec![Role::Default])
    }

    #[test]
    fn token_response_round_trips_with_eddsa() {
        let cfg = TokenConfig::generate_ed25519().unwrap();
        let response = cfg.new_token_response(&claims()).unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert!(!response.refresh_token.is_empty());

        let access = cfg.validate_access_token(&response.token).unwrap();
        assert_eq!(access.id, 7);
        assert_eq!(access.aud, vec!["user".to_string()]);
        assert_eq!(access.exp, response.expires);

        let refresh = cfg.validate_refresh_token(&response.refresh_token).unwrap();
        assert_eq!(refresh.uuid, access.uuid);
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn token_response_round_trips_with_es256() {
        let cfg = TokenConfig::generate_es256().unwrap();
        let response = cfg.new_token_response(&claims()).unwrap();
        assert!(cfg.validate_access_token(&response.token).is_ok());
        assert!(cfg.validate_refresh_token(&response.refresh_token).is_ok());
    }

    #[test]
    fn access_and_refresh_tokens_are_not_interchangeable() {
        let cfg = TokenConfig::generate_ed25519().unwrap();
        let response = cfg.new_token_response(&claims()).unwrap();
        assert!(matches!(
            cfg.validate_access_token(&response.refresh_token),
            Err(TokenError::BadIssuerOrAudience)
        ));
        assert!(matches!(
            cfg.validate_refresh_token(&response.token),
            Err(TokenError::BadIssuerOrAudience)
        ));
    }

    #[test]
    fn expired_token_reports_expiry() {
        let cfg = TokenConfig::generate_ed25519().unwrap();
        let mut c = claims();
        c.iss = cfg.issuer.clone();
        c.aud = vec![TOKEN_AUDIENCE.to_string()];
        c.exp = Utc::now().timestamp() - 10;
        let token = cfg.sign_raw(&c).unwrap();
        assert!(matches!(
            cfg.validate_access_token(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn missing_audience_and_wrong_issuer_are_distinct() {
        let cfg = TokenConfig::generate_es256().unwrap();
        let mut c = claims();
        c.iss = cfg.issuer.clone();
        c.exp = Utc::now().timestamp() + 60;
        let token = cfg.sign_raw(&c).unwrap();
        assert!(matches!(
            cfg.validate_access_token(&token),
            Err(TokenError::NoAudience)
        ));

        c.iss = "wrong issuer".into();
        c.aud = vec![TOKEN_AUDIENCE.to_string()];
        let token = cfg.sign_raw(&c).unwrap();
        assert!(matches!(
            cfg.validate_access_token(&token),
            Err(TokenError::BadIssuerOrAudience)
        ));
    }

    #[test]
    fn tokens_from_another_key_are_malformed() {
        let a = TokenConfig::generate_ed25519().unwrap();
        let b = TokenConfig::generate_ed25519().unwrap();
        let response = a.new_token_response(&claims()).unwrap();
        assert!(matches!(
            b.validate_access_token(&response.token),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            a.validate_access_token("not.a.jwt"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn seeded_configs_share_keys() {
        let seed = [9u8; 32];
        let a = TokenConfig::ed25519_from_seed(&seed).unwrap();
        let b = TokenConfig::ed25519_from_seed(&seed).unwrap();
        let response = a.new_token_response(&claims()).unwrap();
        assert!(b.validate_access_token(&response.token).is_ok());
    }

    #[test]
    fn parse_bearer_token_is_case_insensitive() {
        assert_eq!(parse_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(parse_bearer_token("Basic abc"), None);
        assert_eq!(parse_bearer_token("Bearer"), None);
    }
}
