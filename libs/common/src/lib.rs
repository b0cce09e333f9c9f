//! Common library for the habit and note tracking services
//!
//! This crate provides shared functionality used across the services:
//! database and Redis connectivity, infrastructure error types, tracing
//! bootstrap, and the client downstream services use to verify sessions
//! against the auth service.

pub mod cache;
pub mod database;
pub mod error;
pub mod session_client;
pub mod telemetry;

/// Example usage of the session client from a downstream service
///
/// ```rust,no_run
/// use common::session_client::SessionClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = SessionClient::from_env()?;
///     match client.check("eyJhbGciOi...").await? {
///         Some(user_id) => println!("authenticated as {}", user_id),
///         None => println!("not authenticated"),
///     }
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
