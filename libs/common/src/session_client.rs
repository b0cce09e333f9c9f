//! Client for the auth service's token check endpoint
//!
//! Downstream services (notes, categories) never validate session tokens
//! themselves. They forward the caller's `session_token` cookie to
//! `/api/auth/check_token` and trust the user id that comes back.

use reqwest::{StatusCode, header::COOKIE};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE_NAME: &str = "session_token";

const CHECK_TOKEN_PATH: &str = "/api/auth/check_token";

/// Errors returned by [`SessionClient`]
#[derive(Error, Debug)]
pub enum SessionClientError {
    /// The auth service could not be reached
    #[error("auth service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The auth service answered with a status that is neither success nor a
    /// token rejection
    #[error("auth service answered with unexpected status {0}")]
    UnexpectedStatus(u16),

    /// The success body did not carry a user id
    #[error("auth service response could not be decoded: {0}")]
    Decode(String),

    /// Client configuration error
    #[error("session client configuration error: {0}")]
    Configuration(String),
}

#[derive(Debug, Deserialize)]
struct CheckTokenBody {
    user_id: Uuid,
}

/// HTTP client for the token check oracle
#[derive(Clone, Debug)]
pub struct SessionClient {
    http: reqwest::Client,
    check_url: String,
}

impl SessionClient {
    /// Create a client for the auth service reachable at `base_url`
    pub fn new(base_url: &str) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing `reqwest::Client`
    pub fn with_http_client(http: reqwest::Client, base_url: &str) -> Self {
        let check_url = format!("{}{}", base_url.trim_end_matches('/'), CHECK_TOKEN_PATH);
        Self { http, check_url }
    }

    /// Create a client from environment variables
    ///
    /// # Environment Variables
    /// - `AUTH_SERVICE_URL`: base URL of the auth service (required)
    pub fn from_env() -> Result<Self, SessionClientError> {
        let base_url = std::env::var("AUTH_SERVICE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                SessionClientError::Configuration(
                    "AUTH_SERVICE_URL environment variable not set".into(),
                )
            })?;
        Ok(Self::new(&base_url))
    }

    /// Full URL of the check endpoint
    pub fn check_url(&self) -> &str {
        &self.check_url
    }

    /// Ask the auth service who owns `token`.
    ///
    /// Returns `Ok(None)` when the token is empty or rejected (400/401).
    pub async fn check(&self, token: &str) -> Result<Option<Uuid>, SessionClientError> {
        if token.is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .get(&self.check_url)
            .header(COOKIE, format!("{}={}", SESSION_COOKIE_NAME, token))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: CheckTokenBody = response
                    .json()
                    .await
                    .map_err(|e| SessionClientError::Decode(e.to_string()))?;
                debug!("Session resolved to user {}", body.user_id);
                Ok(Some(body.user_id))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Ok(None),
            status => {
                warn!("Token check answered with status {}", status);
                Err(SessionClientError::UnexpectedStatus(status.as_u16()))
            }
        }
    }
}
