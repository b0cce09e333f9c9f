//! Revocable session store
//!
//! Each user owns a sorted set of live tokens scored by their expiry (unix
//! seconds). A token only counts as a session while it is in the set and its
//! score is in the future, so deleting entries here revokes tokens that are
//! still cryptographically valid.

use async_trait::async_trait;
use common::{cache::RedisPool, error::CacheError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

const SESSION_KEY_PREFIX: &str = "user:";

/// Errors returned by a [`SessionStore`]
#[derive(Error, Debug)]
pub enum SessionError {
    /// The backing store failed or is unreachable
    #[error("session store error: {0}")]
    Store(#[from] CacheError),
}

/// Per-user sets of active session tokens
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Add `token` to the user's active set, expiring at `expires_at`
    async fn record(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: i64,
    ) -> Result<(), SessionError>;

    /// Whether `token` is in the user's set with an expiry after `now`
    async fn is_active(&self, user_id: Uuid, token: &str, now: i64) -> Result<bool, SessionError>;

    /// Remove a single token; returns whether it was present
    async fn revoke(&self, user_id: Uuid, token: &str) -> Result<bool, SessionError>;

    /// Remove every token the user holds
    async fn revoke_all(&self, user_id: Uuid) -> Result<(), SessionError>;

    /// Number of the user's tokens expiring after `now`
    async fn active_count(&self, user_id: Uuid, now: i64) -> Result<u64, SessionError>;

    /// Drop every entry, across all users, expiring at or before `now`.
    /// Returns how many entries were removed.
    async fn sweep(&self, now: i64) -> Result<u64, SessionError>;
}

fn session_key(user_id: Uuid) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, user_id)
}

/// Redis-backed session store
#[derive(Clone)]
pub struct RedisSessionStore {
    redis_pool: RedisPool,
}

impl RedisSessionStore {
    /// Create a new session store
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn record(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: i64,
    ) -> Result<(), SessionError> {
        debug!("Recording session for user: {}", user_id);
        self.redis_pool
            .zadd(&session_key(user_id), token, expires_at)
            .await?;
        Ok(())
    }

    async fn is_active(&self, user_id: Uuid, token: &str, now: i64) -> Result<bool, SessionError> {
        let score = self
            .redis_pool
            .zscore(&session_key(user_id), token)
            .await?;
        Ok(matches!(score, Some(expires_at) if expires_at > now))
    }

    async fn revoke(&self, user_id: Uuid, token: &str) -> Result<bool, SessionError> {
        let removed = self.redis_pool.zrem(&session_key(user_id), token).await?;
        Ok(removed > 0)
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<(), SessionError> {
        info!("Revoking all sessions for user: {}", user_id);
        self.redis_pool.delete(&session_key(user_id)).await?;
        Ok(())
    }

    async fn active_count(&self, user_id: Uuid, now: i64) -> Result<u64, SessionError> {
        let count = self
            .redis_pool
            .zcount_above(&session_key(user_id), now)
            .await?;
        Ok(count)
    }

    async fn sweep(&self, now: i64) -> Result<u64, SessionError> {
        let keys = self
            .redis_pool
            .scan_keys(&format!("{}*", SESSION_KEY_PREFIX))
            .await?;

        let mut removed = 0;
        for key in keys {
            match self.redis_pool.zrem_up_to(&key, now).await {
                Ok(count) => {
                    if count > 0 {
                        debug!("Removed {} expired tokens from {}", count, key);
                    }
                    removed += count;
                }
                // One bad key must not stop the rest of the sweep.
                Err(e) => error!("Failed to remove expired tokens from {}: {}", key, e),
            }
        }

        Ok(removed)
    }
}

/// In-process session store used by tests and local runs
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, HashMap<String, i64>>>>,
}

impl InMemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn record(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: i64,
    ) -> Result<(), SessionError> {
        self.sessions
            .lock()
            .await
            .entry(user_id)
            .or_default()
            .insert(token.to_string(), expires_at);
        Ok(())
    }

    async fn is_active(&self, user_id: Uuid, token: &str, now: i64) -> Result<bool, SessionError> {
        let sessions = self.sessions.lock().await;
        let expires_at = sessions.get(&user_id).and_then(|tokens| tokens.get(token));
        Ok(matches!(expires_at, Some(&expires_at) if expires_at > now))
    }

    async fn revoke(&self, user_id: Uuid, token: &str) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let Some(tokens) = sessions.get_mut(&user_id) else {
            return Ok(false);
        };
        let removed = tokens.remove(token).is_some();
        if tokens.is_empty() {
            sessions.remove(&user_id);
        }
        Ok(removed)
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<(), SessionError> {
        self.sessions.lock().await.remove(&user_id);
        Ok(())
    }

    async fn active_count(&self, user_id: Uuid, now: i64) -> Result<u64, SessionError> {
        let sessions = self.sessions.lock().await;
        let count = sessions
            .get(&user_id)
            .map(|tokens| tokens.values().filter(|&&expires_at| expires_at > now).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn sweep(&self, now: i64) -> Result<u64, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let mut removed = 0;
        for tokens in sessions.values_mut() {
            let before = tokens.len();
            tokens.retain(|_, expires_at| *expires_at > now);
            removed += (before - tokens.len()) as u64;
        }
        sessions.retain(|_, tokens| !tokens.is_empty());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[tokio::test]
    async fn test_record_and_check() {
        let store = InMemorySessionStore::new();
        let user = Uuid::now_v7();
        store.record(user, "tok-a", NOW + 100).await.unwrap();

        assert!(store.is_active(user, "tok-a", NOW).await.unwrap());
        assert!(!store.is_active(user, "tok-b", NOW).await.unwrap());
        assert!(!store.is_active(Uuid::now_v7(), "tok-a", NOW).await.unwrap());
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let store = InMemorySessionStore::new();
        let user = Uuid::now_v7();
        store.record(user, "tok", NOW).await.unwrap();

        assert!(store.is_active(user, "tok", NOW - 1).await.unwrap());
        assert!(!store.is_active(user, "tok", NOW).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_entries() {
        let store = InMemorySessionStore::new();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        store.record(alice, "past", NOW - 5).await.unwrap();
        store.record(alice, "edge", NOW).await.unwrap();
        store.record(alice, "future", NOW + 5).await.unwrap();
        store.record(bob, "past", NOW - 1).await.unwrap();

        assert_eq!(store.sweep(NOW).await.unwrap(), 3);
        assert!(store.is_active(alice, "future", NOW).await.unwrap());
        assert_eq!(store.active_count(alice, NOW).await.unwrap(), 1);
        assert_eq!(store.active_count(bob, NOW).await.unwrap(), 0);
        assert_eq!(store.sweep(NOW).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_revoke_single_and_all() {
        let store = InMemorySessionStore::new();
        let user = Uuid::now_v7();
        store.record(user, "phone", NOW + 100).await.unwrap();
        store.record(user, "laptop", NOW + 100).await.unwrap();

        assert!(store.revoke(user, "phone").await.unwrap());
        assert!(!store.revoke(user, "phone").await.unwrap());
        assert!(!store.is_active(user, "phone", NOW).await.unwrap());
        assert!(store.is_active(user, "laptop", NOW).await.unwrap());

        store.revoke_all(user).await.unwrap();
        assert!(!store.is_active(user, "laptop", NOW).await.unwrap());
        assert_eq!(store.active_count(user, NOW).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_swept_token_never_reported_active() {
        let store = InMemorySessionStore::new();
        let user = Uuid::now_v7();
        for i in 0..50 {
            store.record(user, &format!("tok-{i}"), NOW + 10).await.unwrap();
        }

        let sweeper = {
            let store = store.clone();
            tokio::spawn(async move { store.sweep(NOW + 10).await.unwrap() })
        };
        let checker = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    store.is_active(user, &format!("tok-{i}"), NOW).await.unwrap();
                }
            })
        };

        assert_eq!(sweeper.await.unwrap(), 50);
        checker.await.unwrap();

        // Even a caller with a lagging clock sees swept entries as gone.
        for i in 0..50 {
            assert!(!store.is_active(user, &format!("tok-{i}"), NOW).await.unwrap());
        }
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on localhost:6379"]
    async fn test_redis_store_round_trip() -> anyhow::Result<()> {
        use common::cache::RedisConfig;

        let pool = RedisPool::new(&RedisConfig {
            url: "redis://localhost:6379".to_string(),
        })
        .await?;
        let store = RedisSessionStore::new(pool);
        let user = Uuid::now_v7();

        store.record(user, "expired", NOW - 1).await?;
        store.record(user, "live", NOW + 100).await?;
        assert!(store.is_active(user, "live", NOW).await?);
        assert!(!store.is_active(user, "expired", NOW).await?);
        assert!(store.sweep(NOW).await? >= 1);
        assert_eq!(store.active_count(user, NOW).await?, 1);

        store.revoke_all(user).await?;
        assert!(!store.is_active(user, "live", NOW).await?);
        Ok(())
    }
}
