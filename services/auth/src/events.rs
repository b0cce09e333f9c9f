//! User lifecycle events
//!
//! The auth service announces account creation and deletion so downstream
//! projections (the user-profile service) can follow. Publishing is best
//! effort: a failed publish is logged and the request carries on, which
//! leaves downstream projections eventually consistent with the credential
//! store.

use async_trait::async_trait;
use common::{cache::RedisPool, error::CacheError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

/// Topic announcing a new account
pub const USER_CREATED_TOPIC: &str = "user-created";
/// Topic announcing a deleted account
pub const USER_DELETED_TOPIC: &str = "user-deleted";

/// Payload of `user-created`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Payload of `user-deleted`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeleted {
    pub id: Uuid,
}

/// A user lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    Created(UserCreated),
    Deleted(UserDeleted),
}

impl UserEvent {
    /// Topic the event is published on
    pub fn topic(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => USER_CREATED_TOPIC,
            UserEvent::Deleted(_) => USER_DELETED_TOPIC,
        }
    }

    /// User the event is about; used as the message key
    pub fn user_id(&self) -> Uuid {
        match self {
            UserEvent::Created(event) => event.id,
            UserEvent::Deleted(event) => event.id,
        }
    }

    /// JSON payload for the topic
    pub fn payload(&self) -> Result<String, EventError> {
        let payload = match self {
            UserEvent::Created(event) => serde_json::to_string(event),
            UserEvent::Deleted(event) => serde_json::to_string(event),
        };
        Ok(payload?)
    }
}

/// Errors raised while publishing an event
#[derive(Error, Debug)]
pub enum EventError {
    #[error("failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to publish event: {0}")]
    Publish(String),
}

impl From<CacheError> for EventError {
    fn from(err: CacheError) -> Self {
        EventError::Publish(err.to_string())
    }
}

/// Sink for user lifecycle events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &UserEvent) -> Result<(), EventError>;
}

/// Publish `event`, logging instead of failing when the sink is down.
pub async fn emit(publisher: &dyn EventPublisher, event: UserEvent) {
    match publisher.publish(&event).await {
        Ok(()) => info!("Published {} for user {}", event.topic(), event.user_id()),
        Err(e) => error!(
            "Failed to publish {} for user {}: {}",
            event.topic(),
            event.user_id(),
            e
        ),
    }
}

/// Publishes events to Redis streams named after their topic
#[derive(Clone)]
pub struct RedisStreamPublisher {
    redis_pool: RedisPool,
    max_len: usize,
}

impl RedisStreamPublisher {
    /// Create a publisher that trims each stream to roughly `max_len` entries
    pub fn new(redis_pool: RedisPool, max_len: usize) -> Self {
        Self {
            redis_pool,
            max_len,
        }
    }
}

#[async_trait]
impl EventPublisher for RedisStreamPublisher {
    async fn publish(&self, event: &UserEvent) -> Result<(), EventError> {
        let key = event.user_id().to_string();
        let payload = event.payload()?;
        self.redis_pool
            .xadd(
                event.topic(),
                self.max_len,
                &[("key", key.as_str()), ("payload", payload.as_str())],
            )
            .await?;
        Ok(())
    }
}

/// Keeps published events in memory; can be told to fail every publish
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<UserEvent>>>,
    failing: bool,
}

impl RecordingPublisher {
    /// Publisher that records every event
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher whose every publish fails, as if the broker were down
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Events published so far, oldest first
    pub async fn events(&self) -> Vec<UserEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &UserEvent) -> Result<(), EventError> {
        if self.failing {
            return Err(EventError::Publish("broker unavailable".to_string()));
        }
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
