//! Authentication service
//!
//! Issues and verifies session tokens for the habit and note tracking
//! services. A session is a signed token that is also present in the
//! server-side session store, which is what makes tokens revocable.

pub mod config;
pub mod error;
pub mod events;
pub mod jwt;
pub mod models;
pub mod password;
pub mod reaper;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod state;
pub mod validation;

pub use state::AppState;
