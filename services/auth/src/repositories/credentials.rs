//! Credential repository: login → password hash → user id
//!
//! Login uniqueness is enforced by the storage layer (a unique constraint in
//! Postgres, a single critical section in memory). The pre-insert existence
//! check only saves the cost of hashing for obvious duplicates.

use async_trait::async_trait;
use chrono::Utc;
use common::error::DatabaseError;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::Credential;
use crate::password::{HashError, Hasher};

/// Errors returned by a [`CredentialStore`]
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The login is already taken
    #[error("login already exists")]
    AlreadyExists,

    /// Unknown login or wrong password; deliberately indistinguishable
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No credential for the given user id
    #[error("credential not found")]
    NotFound,

    /// Password hashing failed
    #[error(transparent)]
    Hashing(#[from] HashError),

    /// Database failure
    #[error("credential storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Persistent record of login credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Whether a credential exists for `login`
    async fn exists(&self, login: &str) -> Result<bool, CredentialError>;

    /// Hash `password` and store a new credential, returning its user id
    async fn create(&self, login: &str, password: &str) -> Result<Uuid, CredentialError>;

    /// Resolve `login` + `password` to a user id
    async fn verify(&self, login: &str, password: &str) -> Result<Uuid, CredentialError>;

    /// Remove the credential owned by `user_id`
    async fn delete(&self, user_id: Uuid) -> Result<(), CredentialError>;
}

/// Postgres-backed credential store
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
    hasher: Hasher,
}

impl PgCredentialStore {
    /// Create a new credential store
    pub fn new(pool: PgPool, hasher: Hasher) -> Self {
        Self { pool, hasher }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        info!("Applying auth_credentials migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Credential>, CredentialError> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            SELECT user_id, login, password_hash, created_at
            FROM auth_credentials
            WHERE login = $1
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn exists(&self, login: &str) -> Result<bool, CredentialError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM auth_credentials WHERE login = $1)")
                .bind(login)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn create(&self, login: &str, password: &str) -> Result<Uuid, CredentialError> {
        info!("Creating credentials for login: {}", login);

        if self.exists(login).await? {
            return Err(CredentialError::AlreadyExists);
        }

        let password_hash = self.hasher.hash(password).await?;
        let user_id = Uuid::now_v7();

        let result = sqlx::query(
            r#"
            INSERT INTO auth_credentials (user_id, login, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(login)
        .bind(&password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user_id),
            // Lost a race with a concurrent registration of the same login.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                warn!("Concurrent registration detected for login: {}", login);
                Err(CredentialError::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn verify(&self, login: &str, password: &str) -> Result<Uuid, CredentialError> {
        let Some(credential) = self.find_by_login(login).await? else {
            debug!("No credentials stored for login: {}", login);
            return Err(CredentialError::InvalidCredentials);
        };

        if self
            .hasher
            .verify(password, &credential.password_hash)
            .await?
        {
            Ok(credential.user_id)
        } else {
            debug!("Password mismatch for login: {}", login);
            Err(CredentialError::InvalidCredentials)
        }
    }

    async fn delete(&self, user_id: Uuid) -> Result<(), CredentialError> {
        let result = sqlx::query("DELETE FROM auth_credentials WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CredentialError::NotFound);
        }

        info!("Deleted credentials for user: {}", user_id);
        Ok(())
    }
}

/// In-process credential store used by tests and local runs
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    hasher: Hasher,
    by_login: Arc<Mutex<HashMap<String, Credential>>>,
}

impl InMemoryCredentialStore {
    /// Create an empty store hashing with `hasher`
    pub fn new(hasher: Hasher) -> Self {
        Self {
            hasher,
            by_login: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of stored credentials
    pub async fn len(&self) -> usize {
        self.by_login.lock().await.len()
    }

    /// Whether no credentials are stored
    pub async fn is_empty(&self) -> bool {
        self.by_login.lock().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn exists(&self, login: &str) -> Result<bool, CredentialError> {
        Ok(self.by_login.lock().await.contains_key(login))
    }

    async fn create(&self, login: &str, password: &str) -> Result<Uuid, CredentialError> {
        if self.exists(login).await? {
            return Err(CredentialError::AlreadyExists);
        }

        let password_hash = self.hasher.hash(password).await?;

        // Re-checked under the lock: this is the uniqueness guarantee.
        let mut by_login = self.by_login.lock().await;
        if by_login.contains_key(login) {
            return Err(CredentialError::AlreadyExists);
        }

        let credential = Credential {
            user_id: Uuid::now_v7(),
            login: login.to_string(),
            password_hash,
            created_at: Utc::now(),
        };
        let user_id = credential.user_id;
        by_login.insert(login.to_string(), credential);

        Ok(user_id)
    }

    async fn verify(&self, login: &str, password: &str) -> Result<Uuid, CredentialError> {
        let credential = self.by_login.lock().await.get(login).cloned();
        let Some(credential) = credential else {
            return Err(CredentialError::InvalidCredentials);
        };

        if self
            .hasher
            .verify(password, &credential.password_hash)
            .await?
        {
            Ok(credential.user_id)
        } else {
            Err(CredentialError::InvalidCredentials)
        }
    }

    async fn delete(&self, user_id: Uuid) -> Result<(), CredentialError> {
        let mut by_login = self.by_login.lock().await;
        let before = by_login.len();
        by_login.retain(|_, credential| credential.user_id != user_id);

        if by_login.len() == before {
            return Err(CredentialError::NotFound);
        }
        Ok(())
    }
}
