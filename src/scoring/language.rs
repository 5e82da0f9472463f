//! Google Cloud Natural Language `documents:analyzeSentiment` client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::{Scorer, check_range};
use crate::error::ScoringError;

const PROVIDER: &str = "google-language";

/// Public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://language.googleapis.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeSentimentResponse {
    document_sentiment: Option<Sentiment>,
}

#[derive(Debug, Deserialize)]
struct Sentiment {
    score: Option<f64>,
}

/// Scores text with the Natural Language REST API.
pub struct LanguageScorer {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    timeout: Duration,
}

impl LanguageScorer {
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self, ScoringError> {
        Self::with_base_url(api_key, timeout, DEFAULT_BASE_URL)
    }

    /// Point the client at a different host (emulators, tests).
    pub fn with_base_url(
        api_key: SecretString,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, ScoringError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScoringError::UpstreamFailure {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn map_transport(&self, e: reqwest::Error) -> ScoringError {
        if e.is_timeout() {
            ScoringError::Timeout {
                provider: PROVIDER.to_string(),
                timeout: self.timeout,
            }
        } else {
            ScoringError::UpstreamFailure {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Scorer for LanguageScorer {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn score(&self, text: &str) -> Result<f64, ScoringError> {
        let body = serde_json::json!({
            "document": {
                "type": "PLAIN_TEXT",
                "content": text,
            },
            "encodingType": "UTF8",
        });

        let resp = self
            .client
            .post(format!("{}/v1/documents:analyzeSentiment", self.base_url))
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        if !status.is_success() {
            // Auth, quota, and server errors are all upstream failures.
            let detail = resp.text().await.unwrap_or_default();
            return Err(ScoringError::UpstreamFailure {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {}", detail.chars().take(200).collect::<String>()),
            });
        }

        let parsed: AnalyzeSentimentResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_transport(e)
            } else {
                ScoringError::InvalidResponse {
                    provider: PROVIDER.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        // Proto3 JSON drops zero-valued fields, so an absent score is neutral.
        let score = parsed
            .document_sentiment
            .map(|s| s.score.unwrap_or(0.0))
            .ok_or_else(|| ScoringError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "response has no documentSentiment".to_string(),
            })?;

        debug!(score, "Sentiment scored");
        check_range(PROVIDER, score)
    }
}
