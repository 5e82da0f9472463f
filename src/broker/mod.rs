//! Message channel between the receiver and the subscribers.
//!
//! - `MemoryTopic`: in-process broadcast, every subscriber sees every record
//! - `PubSubPublisher`: Google Cloud Pub/Sub REST publish
//! - `PushEnvelope`: decoding of Pub/Sub push deliveries

pub mod memory;
pub mod pubsub;

pub use memory::{MemoryTopic, QueuedMessage};
pub use pubsub::{PubSubPublisher, PushEnvelope};

use async_trait::async_trait;

use crate::error::PublishError;
use crate::pipeline::types::FeedbackRecord;

/// Publishes feedback records to a topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Topic name for logs.
    fn topic(&self) -> &str;

    /// Publish one record and return the broker-assigned message id.
    async fn publish(&self, record: &FeedbackRecord) -> Result<String, PublishError>;
}

/// Wire payload: UTF-8 JSON `{"user_id", "message"}`.
pub fn encode_payload(record: &FeedbackRecord) -> Result<Vec<u8>, PublishError> {
    Ok(serde_json::to_vec(record)?)
}
