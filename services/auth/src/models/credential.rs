//! Credential model

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored login credential
///
/// Immutable once created; removed when the account is deleted.
#[derive(Debug, Clone, FromRow)]
pub struct Credential {
    pub user_id: Uuid,
    pub login: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}
