//! Slack `chat.postMessage` notifier.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::{Ack, Notifier};
use crate::error::DeliveryError;
use crate::pipeline::types::AlertMessage;

/// Public Slack Web API host.
pub const DEFAULT_BASE_URL: &str = "https://slack.com";

/// Slack answers most errors with HTTP 200 and `"ok": false`.
#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Posts alerts through the Slack Web API using a bot token.
pub struct SlackNotifier {
    token: SecretString,
    client: reqwest::Client,
    base_url: String,
}

impl SlackNotifier {
    pub fn new(token: SecretString, timeout: Duration) -> Result<Self, DeliveryError> {
        Self::with_base_url(token, timeout, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        token: SecretString,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Unreachable {
                channel: "*".into(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            token,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/api/{method}", self.base_url)
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    async fn notify(&self, msg: &AlertMessage) -> Result<Ack, DeliveryError> {
        let resp = self
            .client
            .post(self.api_url("chat.postMessage"))
            .bearer_auth(self.token.expose_secret())
            .json(msg)
            .send()
            .await
            .map_err(|e| DeliveryError::Unreachable {
                channel: msg.destination_channel.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                channel: msg.destination_channel.clone(),
                status: status.as_u16(),
                reason: body.chars().take(200).collect(),
            });
        }

        // A 2xx without a parseable body still counts as delivered.
        let parsed = resp.json::<PostMessageResponse>().await.ok();
        match parsed {
            Some(PostMessageResponse { ok: false, error, .. }) => Err(DeliveryError::Rejected {
                channel: msg.destination_channel.clone(),
                status: status.as_u16(),
                reason: error.unwrap_or_else(|| "unknown_error".into()),
            }),
            Some(PostMessageResponse { ts, .. }) => {
                debug!(channel = %msg.destination_channel, ts = ?ts, "Slack message posted");
                Ok(Ack {
                    channel: msg.destination_channel.clone(),
                    message_id: ts,
                })
            }
            None => Ok(Ack {
                channel: msg.destination_channel.clone(),
                message_id: None,
            }),
        }
    }
}
