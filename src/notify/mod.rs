//! Alert delivery.
//!
//! `Notifier` sends one `AlertMessage` to its destination channel, exactly
//! once. Implementations must not retry.

pub mod slack;

pub use slack::SlackNotifier;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::pipeline::types::AlertMessage;

/// Acknowledgement from the chat service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub channel: String,
    /// Service-assigned message id (Slack `ts`), when one is returned.
    pub message_id: Option<String>,
}

/// Delivers alerts to a chat destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, msg: &AlertMessage) -> Result<Ack, DeliveryError>;
}
