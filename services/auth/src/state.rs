//! Application state shared across handlers

use std::sync::Arc;

use crate::{
    config::CookieSettings, events::EventPublisher, jwt::TokenCodec,
    repositories::CredentialStore, session::SessionStore,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub tokens: TokenCodec,
    pub events: Arc<dyn EventPublisher>,
    pub cookie: CookieSettings,
}
