//! HTTP-facing error type for the auth service

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::jwt::TokenError;
use crate::repositories::CredentialError;
use crate::session::SessionError;

/// Errors returned by the auth handlers
#[derive(Error, Debug)]
pub enum AuthError {
    /// Malformed or empty input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing, invalid, expired or revoked session
    #[error("Unauthorized")]
    Unauthorized,

    /// Login already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entity absent on delete
    #[error("Not found")]
    NotFound,

    /// Store, hashing or signing failure; details stay in the logs
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AuthError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AuthError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::NotFound => (StatusCode::BAD_REQUEST, "Bad request".to_string()),
            AuthError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::AlreadyExists => {
                AuthError::Conflict("User already exists".to_string())
            }
            CredentialError::InvalidCredentials => AuthError::Unauthorized,
            CredentialError::NotFound => AuthError::NotFound,
            CredentialError::Hashing(e) => {
                error!("Credential hashing failed: {}", e);
                AuthError::Internal
            }
            CredentialError::Storage(e) => {
                error!("Credential storage failed: {}", e);
                AuthError::Internal
            }
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => AuthError::BadRequest("Invalid token".to_string()),
            TokenError::BadSignature | TokenError::Expired => AuthError::Unauthorized,
            TokenError::Signing(e) => {
                error!("Token signing failed: {}", e);
                AuthError::Internal
            }
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        error!("Session store failed: {}", err);
        AuthError::Internal
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected request body: {}", rejection.body_text());
        AuthError::BadRequest("Invalid request body".to_string())
    }
}

/// Type alias for handler results
pub type AuthResult<T> = Result<T, AuthError>;
