//! Error types for the feedback pipeline.

use std::time::Duration;

/// Configuration-related errors. All of these are raised at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Inbound feedback was rejected before anything was published.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid input: body is not a JSON object ({0})")]
    MalformedBody(String),

    #[error("Invalid input: missing or empty field `{0}`")]
    MissingField(&'static str),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] PublishError),
}

impl ValidationError {
    /// Whether the client may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }
}

/// Publishing to the message channel failed.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Broker {broker} unreachable: {reason}")]
    Unreachable { broker: String, reason: String },

    #[error("Broker {broker} rejected publish with status {status}: {body}")]
    Rejected {
        broker: String,
        status: u16,
        body: String,
    },

    #[error("Broker {broker} returned an invalid response: {reason}")]
    InvalidResponse { broker: String, reason: String },

    #[error("No subscribers attached to topic {topic}")]
    NoSubscribers { topic: String },

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sentiment scoring failed.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Scorer {provider} upstream failure: {reason}")]
    UpstreamFailure { provider: String, reason: String },

    #[error("Scorer {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ScoringError {
    /// Upstream failures are fail-open: the record is skipped, not failed.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamFailure { .. } | Self::Timeout { .. })
    }
}

/// Alert delivery failed. Logged only, never escalated.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Delivery to {channel} rejected with status {status}: {reason}")]
    Rejected {
        channel: String,
        status: u16,
        reason: String,
    },

    #[error("Delivery endpoint unreachable for {channel}: {reason}")]
    Unreachable { channel: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_publish_failures_are_retryable() {
        let missing = ValidationError::MissingField("user_id");
        assert!(!missing.is_retryable());

        let upstream: ValidationError = PublishError::NoSubscribers {
            topic: "feedback-topic".into(),
        }
        .into();
        assert!(upstream.is_retryable());
    }

    #[test]
    fn timeout_counts_as_upstream_failure() {
        let timeout = ScoringError::Timeout {
            provider: "language".into(),
            timeout: Duration::from_secs(10),
        };
        assert!(timeout.is_upstream());

        let invalid = ScoringError::InvalidResponse {
            provider: "language".into(),
            reason: "score 3.2 out of range".into(),
        };
        assert!(!invalid.is_upstream());
    }

    #[test]
    fn config_errors_name_the_key() {
        let err = ConfigError::MissingRequired {
            key: "SLACK_TOKEN".into(),
            hint: "Slack bot token with chat:write.".into(),
        };
        assert!(err.to_string().contains("SLACK_TOKEN"));
    }

    #[test]
    fn missing_field_message_names_field() {
        let err = ValidationError::MissingField("message");
        assert!(err.to_string().contains("`message`"));
    }
}
