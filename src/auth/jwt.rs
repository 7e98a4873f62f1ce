//! JWT token generation and validation
//! Implements access token + refresh token pattern with isolated signing secrets

use crate::{config::SecurityConfig, error::AppError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Fallback secrets, only used with `allow_insecure_default_secrets`
const INSECURE_ACCESS_SECRET: &str = "default_not_secure_access_secret";
const INSECURE_REFRESH_SECRET: &str = "default_not_secure_refresh_secret";

/// Token failures
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::InvalidToken(_) => AppError::Unauthorized,
            TokenError::Signing(msg) => AppError::Internal(msg),
        }
    }
}

/// Which secret a token is signed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    #[serde(default)]
    pub sub: String,

    /// Token type (access or refresh)
    #[serde(default)]
    pub token_type: String,

    /// Issued at
    #[serde(default)]
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    #[serde(default)]
    pub jti: String,
}

/// Token pair issued on registration and login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// seconds until access token expires
    pub expires_in: u64,
    /// expiry embedded in the refresh token, mirrored on the session row
    pub refresh_expires_at: DateTime<Utc>,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// JWT service
///
/// Built once at startup from [`SecurityConfig`] and shared read-only.
pub struct JwtService {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
    access_token_exp_secs: u64,
    refresh_token_exp_secs: u64,
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        let (access_secret, refresh_secret) =
            match (&config.jwt_secret, &config.jwt_refresh_secret) {
                (Some(access), Some(refresh)) => (
                    access.expose_secret().to_string(),
                    refresh.expose_secret().to_string(),
                ),
                _ if config.allow_insecure_default_secrets => {
                    tracing::warn!(
                        "JWT secrets are not configured, falling back to insecure built-in defaults"
                    );
                    (
                        INSECURE_ACCESS_SECRET.to_string(),
                        INSECURE_REFRESH_SECRET.to_string(),
                    )
                }
                _ => {
                    return Err(AppError::Config(
                        "JWT access and refresh secrets are required".to_string(),
                    ))
                }
            };

        if access_secret == refresh_secret {
            return Err(AppError::Config(
                "JWT access and refresh secrets must differ".to_string(),
            ));
        }

        // Only the HMAC family is accepted; anything else in the header is rejected
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            access: SigningKeys::from_secret(&access_secret),
            refresh: SigningKeys::from_secret(&refresh_secret),
            validation,
            access_token_exp_secs: config.access_token_exp_secs,
            refresh_token_exp_secs: config.refresh_token_exp_secs,
        })
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn ttl_secs(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.access_token_exp_secs,
            TokenKind::Refresh => self.refresh_token_exp_secs,
        }
    }

    /// Access token lifetime in seconds
    pub fn access_token_exp_secs(&self) -> u64 {
        self.access_token_exp_secs
    }

    fn sign(&self, user_id: &Uuid, kind: TokenKind) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(self.ttl_secs(kind) as i64);

        let claims = Claims {
            sub: user_id.to_string(),
            token_type: kind.as_str().to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys(kind).encoding)
            .map_err(|e| {
                tracing::error!("Failed to encode {} token: {:?}", kind.as_str(), e);
                TokenError::Signing(format!("Failed to encode {} token: {}", kind.as_str(), e))
            })?;

        Ok((token, expiration))
    }

    /// Generate access token only
    pub fn issue_access_token(&self, user_id: &Uuid) -> Result<String, TokenError> {
        self.sign(user_id, TokenKind::Access).map(|(token, _)| token)
    }

    /// Generate token pair
    pub fn issue_tokens(&self, user_id: &Uuid) -> Result<TokenPair, TokenError> {
        let (access_token, _) = self.sign(user_id, TokenKind::Access)?;
        let (refresh_token, refresh_expires_at) = self.sign(user_id, TokenKind::Refresh)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_token_exp_secs,
            refresh_expires_at,
        })
    }

    /// Validate and decode a token with the secret selected by `kind`
    pub fn validate(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                TokenError::InvalidToken(e.to_string())
            })?
            .claims;

        if claims.token_type != kind.as_str() {
            tracing::debug!(
                "Token type mismatch: expected '{}', got '{}'",
                kind.as_str(),
                claims.token_type
            );
            return Err(TokenError::InvalidToken("token type mismatch".to_string()));
        }

        Ok(claims)
    }

    /// Validate access token specifically
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, TokenKind::Access)
    }

    /// Validate refresh token specifically
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, TokenKind::Refresh)
    }

    /// Extract the user id from the subject claim
    pub fn extract_user_id(claims: &Claims) -> Result<Uuid, TokenError> {
        if claims.sub.is_empty() {
            return Err(TokenError::InvalidToken("missing subject".to_string()));
        }
        Uuid::parse_str(&claims.sub)
            .map_err(|_| TokenError::InvalidToken("subject is not a user id".to_string()))
    }
}
