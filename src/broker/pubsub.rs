//! Google Cloud Pub/Sub over REST.
//!
//! Publishing uses `projects/{project}/topics/{topic}:publish`. Consumption
//! uses push subscriptions: Pub/Sub POSTs a `PushEnvelope` to our HTTP
//! endpoint and treats any 2xx as an ack.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Publisher, encode_payload};
use crate::error::{PublishError, ValidationError};
use crate::pipeline::types::FeedbackRecord;

const BROKER: &str = "pubsub";

/// Public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://pubsub.googleapis.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Publishes records to a Pub/Sub topic.
pub struct PubSubPublisher {
    client: reqwest::Client,
    access_token: SecretString,
    topic_path: String,
    base_url: String,
}

impl PubSubPublisher {
    pub fn new(
        project_id: &str,
        topic: &str,
        access_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, PublishError> {
        Self::with_base_url(project_id, topic, access_token, timeout, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        project_id: &str,
        topic: &str,
        access_token: SecretString,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Unreachable {
                broker: BROKER.into(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            access_token,
            topic_path: format!("projects/{project_id}/topics/{topic}"),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Publisher for PubSubPublisher {
    fn topic(&self) -> &str {
        &self.topic_path
    }

    async fn publish(&self, record: &FeedbackRecord) -> Result<String, PublishError> {
        let data = STANDARD.encode(encode_payload(record)?);
        let body = serde_json::json!({
            "messages": [{
                "data": data,
                "attributes": { "user_id": record.user_id },
            }]
        });

        let resp = self
            .client
            .post(format!("{}/v1/{}:publish", self.base_url, self.topic_path))
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::Unreachable {
                broker: BROKER.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                broker: BROKER.into(),
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: PublishResponse =
            resp.json().await.map_err(|e| PublishError::InvalidResponse {
                broker: BROKER.into(),
                reason: e.to_string(),
            })?;

        let id = parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| PublishError::InvalidResponse {
                broker: BROKER.into(),
                reason: "empty messageIds".into(),
            })?;
        debug!(topic = %self.topic_path, message_id = %id, "Published to Pub/Sub");
        Ok(id)
    }
}

// ── Push delivery ───────────────────────────────────────────────────

/// Body of a Pub/Sub push request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Base64 payload. Absent when the publisher sent attributes only.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, alias = "message_id")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl PushEnvelope {
    /// Decode the wrapped feedback record.
    pub fn decode(&self) -> Result<FeedbackRecord, ValidationError> {
        let data = self
            .message
            .data
            .as_deref()
            .ok_or_else(|| ValidationError::MalformedBody("push message has no data".into()))?;
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| ValidationError::MalformedBody(format!("invalid base64: {e}")))?;
        FeedbackRecord::from_slice(&bytes)
    }

    pub fn message_id(&self) -> &str {
        self.message.message_id.as_deref().unwrap_or("unknown")
    }
}
