//! In-process topic backed by a `tokio::sync::broadcast` channel.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::{Publisher, encode_payload};
use crate::error::PublishError;
use crate::pipeline::types::FeedbackRecord;

/// A message as seen by a subscriber.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub id: String,
    /// Encoded payload, exactly as published.
    pub data: Arc<[u8]>,
    pub published_at: DateTime<Utc>,
}

impl QueuedMessage {
    /// Time between publish and `now`, clamped at zero.
    pub fn queued_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.published_at).max(chrono::Duration::zero())
    }
}

/// Fan-out topic: each subscriber receives its own copy of every message.
pub struct MemoryTopic {
    name: String,
    tx: broadcast::Sender<QueuedMessage>,
}

impl MemoryTopic {
    /// `capacity` bounds how far a slow subscriber may lag before it
    /// starts losing messages.
    pub fn new(name: impl Into<String>, capacity: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            name: name.into(),
            tx,
        })
    }

    /// Attach a new subscriber. It only sees messages published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<QueuedMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl Publisher for MemoryTopic {
    fn topic(&self) -> &str {
        &self.name
    }

    async fn publish(&self, record: &FeedbackRecord) -> Result<String, PublishError> {
        let msg = QueuedMessage {
            id: Uuid::new_v4().to_string(),
            data: encode_payload(record)?.into(),
            published_at: Utc::now(),
        };
        let id = msg.id.clone();

        let delivered = self.tx.send(msg).map_err(|_| PublishError::NoSubscribers {
            topic: self.name.clone(),
        })?;
        debug!(topic = %self.name, message_id = %id, subscribers = delivered, "Published");
        Ok(id)
    }
}
