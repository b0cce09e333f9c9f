//! Session client tests against a stub auth service

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use common::session_client::{SessionClient, SessionClientError};
use serde_json::json;
use tokio::net::TcpListener;
use uuid::Uuid;

const KNOWN_USER: &str = "0190c5a4-6f3e-7d2a-9b1c-3e5f7a9b1c2d";

async fn check_token(jar: CookieJar) -> Response {
    let token = jar.get("session_token").map(|c| c.value().to_string());
    match token.as_deref() {
        Some("live") => Json(json!({ "user_id": KNOWN_USER })).into_response(),
        Some("garbled") => (StatusCode::OK, "not json").into_response(),
        Some("explode") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some("") => StatusCode::BAD_REQUEST.into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn spawn_stub() -> String {
    let app = Router::new().route("/api/auth/check_token", get(check_token));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_live_session_resolves_user() {
    let client = SessionClient::new(&spawn_stub().await);
    let user = client.check("live").await.unwrap();
    assert_eq!(user, Some(Uuid::parse_str(KNOWN_USER).unwrap()));
}

#[tokio::test]
async fn test_rejected_session_is_none() {
    let client = SessionClient::new(&spawn_stub().await);
    assert_eq!(client.check("revoked").await.unwrap(), None);
}

#[tokio::test]
async fn test_server_error_is_surfaced() {
    let client = SessionClient::new(&spawn_stub().await);
    let err = client.check("explode").await.unwrap_err();
    assert!(matches!(err, SessionClientError::UnexpectedStatus(500)));
}

#[tokio::test]
async fn test_undecodable_body_is_an_error() {
    let client = SessionClient::new(&spawn_stub().await);
    let err = client.check("garbled").await.unwrap_err();
    assert!(matches!(err, SessionClientError::Decode(_)));
}
