//! Authentication service routes

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::SESSION_COOKIE_NAME,
    error::{AuthError, AuthResult},
    events::{UserCreated, UserDeleted, UserEvent, emit},
    repositories::CredentialError,
    state::AppState,
    validation,
};

/// Request for user registration
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Body returned alongside a fresh session cookie
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
}

/// Body returned by check_token
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckTokenResponse {
    pub user_id: Uuid,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(300));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/check_token", get(check_token).post(check_token))
        .route("/api/auth/delete_user", delete(delete_user))
        .route("/api/auth/logout", post(logout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AuthResult<impl IntoResponse> {
    let Json(payload) = payload?;
    validation::validate_login(&payload.login).map_err(AuthError::BadRequest)?;
    validation::validate_password(&payload.password).map_err(AuthError::BadRequest)?;
    if let Some(username) = &payload.username {
        validation::validate_username(username).map_err(AuthError::BadRequest)?;
    }
    if let Some(email) = &payload.email {
        validation::validate_email(email).map_err(AuthError::BadRequest)?;
    }

    info!("Registration attempt for login: {}", payload.login);

    let user_id = state
        .credentials
        .create(&payload.login, &payload.password)
        .await
        .inspect_err(|e| warn!("Registration failed for login {}: {}", payload.login, e))?;

    emit(
        state.events.as_ref(),
        UserEvent::Created(UserCreated {
            id: user_id,
            username: payload.username.unwrap_or_default(),
            email: payload.email.unwrap_or_default(),
        }),
    )
    .await;

    let headers = issue_session(&state, user_id).await?;
    info!("Registered user: {}", user_id);

    Ok((StatusCode::OK, headers, Json(SessionResponse { user_id })))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AuthResult<impl IntoResponse> {
    let Json(payload) = payload?;
    validation::validate_login(&payload.login).map_err(AuthError::BadRequest)?;
    validation::validate_password(&payload.password).map_err(AuthError::BadRequest)?;

    info!("Login attempt for login: {}", payload.login);

    let user_id = state
        .credentials
        .verify(&payload.login, &payload.password)
        .await
        .inspect_err(|e| warn!("Login failed for login {}: {}", payload.login, e))?;

    let headers = issue_session(&state, user_id).await?;
    info!("User logged in: {}", user_id);

    Ok((StatusCode::OK, headers, Json(SessionResponse { user_id })))
}

/// Token check endpoint; the trust oracle for downstream services
pub async fn check_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AuthResult<Json<CheckTokenResponse>> {
    let token = session_token(&jar)?;
    let user_id = authenticate(&state, token).await?;
    Ok(Json(CheckTokenResponse { user_id }))
}

/// Account deletion endpoint
pub async fn delete_user(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AuthResult<impl IntoResponse> {
    // Every token failure here is a 401, malformed tokens included.
    let token = session_token(&jar).map_err(|_| AuthError::Unauthorized)?;
    let user_id = authenticate(&state, token)
        .await
        .map_err(|e| match e {
            AuthError::BadRequest(_) => AuthError::Unauthorized,
            other => other,
        })?;

    info!("Deleting user: {}", user_id);
    match state.credentials.delete(user_id).await {
        Ok(()) => {}
        // An earlier attempt removed the credential but not the sessions.
        Err(CredentialError::NotFound) => {
            warn!("Credential already gone for user {}", user_id);
            state.sessions.revoke_all(user_id).await?;
            return Err(AuthError::NotFound);
        }
        Err(e) => {
            warn!("Credential delete failed for user {}: {}", user_id, e);
            return Err(e.into());
        }
    }

    emit(
        state.events.as_ref(),
        UserEvent::Deleted(UserDeleted { id: user_id }),
    )
    .await;

    state.sessions.revoke_all(user_id).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "User deleted successfully"})),
    ))
}

/// Logout endpoint; revokes only the presented token
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AuthResult<impl IntoResponse> {
    let token = session_token(&jar)?;
    let user_id = authenticate(&state, token).await?;

    state.sessions.revoke(user_id, token).await?;
    info!("User logged out: {}", user_id);

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie_header(state.cookie.clear_cookie())?);

    Ok((
        StatusCode::OK,
        headers,
        Json(serde_json::json!({"message": "Logged out successfully"})),
    ))
}

/// Cookie value of the session token; 401 when absent, 400 when empty
fn session_token(jar: &CookieJar) -> AuthResult<&str> {
    let cookie = jar.get(SESSION_COOKIE_NAME).ok_or_else(|| {
        debug!("Request carries no session cookie");
        AuthError::Unauthorized
    })?;

    let token = cookie.value();
    if token.is_empty() {
        return Err(AuthError::BadRequest("Empty session token".to_string()));
    }
    Ok(token)
}

/// Verify the token and require it to be a live session
async fn authenticate(state: &AppState, token: &str) -> AuthResult<Uuid> {
    let user_id = state.tokens.verify(token)?;

    let now = chrono::Utc::now().timestamp();
    if !state.sessions.is_active(user_id, token, now).await? {
        debug!("Token for user {} is not an active session", user_id);
        return Err(AuthError::Unauthorized);
    }

    Ok(user_id)
}

/// Mint a token, record it as a session and build the `Set-Cookie` header
async fn issue_session(state: &AppState, user_id: Uuid) -> AuthResult<HeaderMap> {
    let issued = state.tokens.mint(user_id, state.tokens.ttl())?;
    state
        .sessions
        .record(user_id, &issued.token, issued.expires_at)
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        cookie_header(state.cookie.session_cookie(&issued.token))?,
    );
    Ok(headers)
}

fn cookie_header(value: Option<HeaderValue>) -> AuthResult<HeaderValue> {
    value.ok_or_else(|| {
        error!("Failed to build session cookie header");
        AuthError::Internal
    })
}
