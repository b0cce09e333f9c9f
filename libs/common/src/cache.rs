//! Redis module shared by the services
//!
//! This module provides the Redis connection handle and the handful of
//! commands the services rely on: sorted sets for session bookkeeping,
//! cursor-based key scans, and stream appends for lifecycle events.

use crate::error::{CacheError, CacheResult};
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tracing::info;

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (required)
    pub fn from_env() -> CacheResult<Self> {
        let url = std::env::var("REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                CacheError::Configuration("REDIS_URL environment variable not set".into())
            })?;

        Ok(RedisConfig { url })
    }
}

/// Host and port of the server, without credentials
fn endpoint(client: &Client) -> String {
    client.get_connection_info().addr.to_string()
}

/// Redis connection handle
///
/// Wraps a single multiplexed connection; clones share it.
#[derive(Clone)]
pub struct RedisPool {
    conn: MultiplexedConnection,
}

impl RedisPool {
    /// Open the client and establish the multiplexed connection.
    ///
    /// Fails when the server is unreachable, which callers treat as fatal at
    /// startup.
    pub async fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.clone()).map_err(CacheError::Connection)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(CacheError::Connection)?;
        info!("Redis client initialized for {}", endpoint(&client));
        Ok(RedisPool { conn })
    }

    fn connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    /// Add `member` to the sorted set at `key` with the given score
    pub async fn zadd(&self, key: &str, member: &str, score: i64) -> CacheResult<()> {
        let mut conn = self.connection();
        let _: i64 = conn.zadd(key, member, score).await?;
        Ok(())
    }

    /// Score of `member` in the sorted set at `key`, if present
    pub async fn zscore(&self, key: &str, member: &str) -> CacheResult<Option<i64>> {
        let mut conn = self.connection();
        let score: Option<f64> = conn.zscore(key, member).await?;
        Ok(score.map(|s| s as i64))
    }

    /// Remove `member` from the sorted set at `key`
    pub async fn zrem(&self, key: &str, member: &str) -> CacheResult<u64> {
        let mut conn = self.connection();
        let removed: u64 = conn.zrem(key, member).await?;
        Ok(removed)
    }

    /// Remove every member scored at or below `max_score`
    pub async fn zrem_up_to(&self, key: &str, max_score: i64) -> CacheResult<u64> {
        let mut conn = self.connection();
        let removed: u64 = conn.zrembyscore(key, "-inf", max_score).await?;
        Ok(removed)
    }

    /// Count members scored strictly above `min_score`
    pub async fn zcount_above(&self, key: &str, min_score: i64) -> CacheResult<u64> {
        let mut conn = self.connection();
        let count: u64 = conn.zcount(key, format!("({}", min_score), "+inf").await?;
        Ok(count)
    }

    /// Delete a key from Redis
    pub async fn delete(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.connection();
        let removed: u64 = conn.del(key).await?;
        Ok(removed)
    }

    /// Collect every key matching `pattern` using a SCAN cursor
    pub async fn scan_keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.connection();
        let mut iter = conn.scan_match::<_, String>(pattern).await?;
        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    /// Append an entry to the stream at `stream`, trimming it to roughly
    /// `max_len` entries. Returns the generated entry id.
    pub async fn xadd(
        &self,
        stream: &str,
        max_len: usize,
        fields: &[(&str, &str)],
    ) -> CacheResult<String> {
        let mut conn = self.connection();
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("MAXLEN").arg("~").arg(max_len).arg("*");
        for (field, value) in fields {
            cmd.arg(*field).arg(*value);
        }
        let id: String = cmd.query_async(&mut conn).await?;
        Ok(id)
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}
