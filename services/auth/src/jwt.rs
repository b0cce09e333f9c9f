//! Session token codec
//!
//! Tokens are HS256 JWTs carrying the user id and an expiry. The codec only
//! proves a token was minted here and has not expired; whether the session
//! is still live is the session store's call.

use anyhow::Result;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Default session lifetime: six 30-day months
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(6 * 30 * 24 * 60 * 60);

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token codec configuration
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC signing secret
    pub secret: String,
    /// Lifetime of newly minted tokens
    pub ttl: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenConfig {
    /// Create a new TokenConfig from environment variables
    ///
    /// # Environment Variables
    /// - `TOKEN_SECRET_KEY`: HMAC secret (required, must not be empty)
    /// - `TOKEN_TTL_SECONDS`: token lifetime in seconds, at least 1 (default: 15552000)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("TOKEN_SECRET_KEY")
            .ok()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| anyhow::anyhow!("TOKEN_SECRET_KEY environment variable not set"))?;

        let ttl = match std::env::var("TOKEN_TTL_SECONDS") {
            Ok(raw) => {
                let secs: u64 = raw
                    .parse()
                    .map_err(|e| anyhow::anyhow!("invalid TOKEN_TTL_SECONDS {:?}: {}", raw, e))?;
                let fits = i64::try_from(secs)
                    .ok()
                    .and_then(|secs| chrono::Utc::now().timestamp().checked_add(secs))
                    .is_some();
                if secs == 0 || !fits {
                    anyhow::bail!("TOKEN_TTL_SECONDS must be a positive, representable lifetime");
                }
                Duration::from_secs(secs)
            }
            Err(_) => DEFAULT_TOKEN_TTL,
        };

        Ok(TokenConfig { secret, ttl })
    }
}

/// Token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Owner of the session
    pub user_id: Uuid,
    /// Unique token id, so two sessions minted in the same second differ
    pub jti: Uuid,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration time (unix seconds)
    pub exp: i64,
}

/// A freshly minted token and its expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Reasons a token is rejected or could not be minted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not a parseable token, or its claims are missing or mistyped
    #[error("malformed token")]
    Malformed,

    /// Signature does not verify, or the token uses another algorithm
    #[error("invalid token signature")]
    BadSignature,

    /// Signature is fine but the token has expired
    #[error("token expired")]
    Expired,

    /// Signing a new token failed
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::BadSignature,
        }
    }
}

/// Mints and verifies session tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    /// Build a codec from its configuration
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        TokenCodec {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl: config.ttl,
        }
    }

    /// Configured session lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token for `user_id` valid for `ttl` from now
    pub fn mint(&self, user_id: Uuid, ttl: Duration) -> Result<IssuedToken, TokenError> {
        let expires_at = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| chrono::Utc::now().timestamp().checked_add(secs))
            .ok_or_else(|| {
                TokenError::Signing(format!("token lifetime {:?} is out of range", ttl))
            })?;
        self.mint_until(user_id, expires_at)
    }

    /// Mint a token for `user_id` that expires at `expires_at` (unix seconds)
    pub fn mint_until(&self, user_id: Uuid, expires_at: i64) -> Result<IssuedToken, TokenError> {
        let claims = Claims {
            user_id,
            jti: Uuid::new_v4(),
            iat: chrono::Utc::now().timestamp(),
            exp: expires_at,
        };

        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify `token` and return the user id it was minted for
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            TokenError::from(e)
        })?;
        Ok(data.claims.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(&TokenConfig {
            secret: secret.to_string(),
            ttl: Duration::from_secs(3600),
        })
    }

    #[test]
    fn test_mint_and_verify() {
        let codec = codec("test-secret");
        let user_id = Uuid::now_v7();

        let issued = codec.mint(user_id, codec.ttl()).unwrap();
        assert_eq!(issued.token.split('.').count(), 3);
        assert!(issued.expires_at > chrono::Utc::now().timestamp());
        assert_eq!(codec.verify(&issued.token).unwrap(), user_id);
    }

    #[test]
    fn test_oversized_ttl_is_rejected() {
        let codec = codec("test-secret");
        let err = codec.mint(Uuid::now_v7(), Duration::from_secs(u64::MAX));
        assert!(matches!(err, Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_tokens_are_unique() {
        let codec = codec("test-secret");
        let user_id = Uuid::now_v7();
        let first = codec.mint(user_id, codec.ttl()).unwrap();
        let second = codec.mint(user_id, codec.ttl()).unwrap();
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let ours = codec("test-secret");
        let theirs = codec("someone-else");
        let issued = theirs.mint(Uuid::now_v7(), theirs.ttl()).unwrap();

        assert_eq!(ours.verify(&issued.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_other_algorithm_is_rejected() {
        let codec = codec("test-secret");
        let claims = Claims {
            user_id: Uuid::now_v7(),
            jti: Uuid::new_v4(),
            iat: chrono::Utc::now().timestamp(),
            exp: chrono::Utc::now().timestamp() + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert_eq!(codec.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let codec = codec("test-secret");
        let issued = codec
            .mint_until(Uuid::now_v7(), chrono::Utc::now().timestamp() - 10)
            .unwrap();

        assert_eq!(codec.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec("test-secret");
        assert_eq!(codec.verify("fake.invalid.token"), Err(TokenError::Malformed));
        assert_eq!(codec.verify("not-a-jwt"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_missing_user_id_is_malformed() {
        let codec = codec("test-secret");
        let claims = serde_json::json!({ "exp": chrono::Utc::now().timestamp() + 60 });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert_eq!(codec.verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    #[serial]
    fn test_token_config_from_env() {
        unsafe {
            std::env::remove_var("TOKEN_SECRET_KEY");
            std::env::remove_var("TOKEN_TTL_SECONDS");
        }
        assert!(TokenConfig::from_env().is_err());

        unsafe {
            std::env::set_var("TOKEN_SECRET_KEY", "");
        }
        assert!(TokenConfig::from_env().is_err());

        unsafe {
            std::env::set_var("TOKEN_SECRET_KEY", "s3cr3t");
        }
        let config = TokenConfig::from_env().unwrap();
        assert_eq!(config.secret, "s3cr3t");
        assert_eq!(config.ttl, DEFAULT_TOKEN_TTL);
        assert!(!format!("{:?}", config).contains("s3cr3t"));

        unsafe {
            std::env::set_var("TOKEN_TTL_SECONDS", "60");
        }
        assert_eq!(TokenConfig::from_env().unwrap().ttl, Duration::from_secs(60));

        for bad in ["0", "18446744073709551615", "9223372036854775807", "-5", "soon"] {
            unsafe {
                std::env::set_var("TOKEN_TTL_SECONDS", bad);
            }
            assert!(TokenConfig::from_env().is_err(), "accepted ttl {bad}");
        }

        unsafe {
            std::env::remove_var("TOKEN_SECRET_KEY");
            std::env::remove_var("TOKEN_TTL_SECONDS");
        }
    }
}
