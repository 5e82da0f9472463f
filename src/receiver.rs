//! HTTP ingress: `POST /receiver`.
//!
//! Validates inbound feedback and publishes it exactly once. Nothing is
//! published for invalid input.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use crate::broker::Publisher;
use crate::error::ValidationError;
use crate::pipeline::types::FeedbackRecord;

/// A record accepted onto the topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted {
    /// Broker-assigned message id.
    pub message_id: String,
}

/// Validates and publishes feedback.
pub struct Receiver {
    publisher: Arc<dyn Publisher>,
}

impl Receiver {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }

    /// Accept a raw JSON request body.
    pub async fn accept(&self, raw: &[u8]) -> Result<Accepted, ValidationError> {
        let record = FeedbackRecord::from_slice(raw)?;
        self.publish(record).await
    }

    /// Accept an already-parsed JSON value.
    pub async fn accept_value(
        &self,
        value: &serde_json::Value,
    ) -> Result<Accepted, ValidationError> {
        let record = FeedbackRecord::from_value(value)?;
        self.publish(record).await
    }

    async fn publish(&self, record: FeedbackRecord) -> Result<Accepted, ValidationError> {
        match self.publisher.publish(&record).await {
            Ok(message_id) => {
                info!(
                    user_id = %record.user_id,
                    topic = self.publisher.topic(),
                    message_id = %message_id,
                    "Feedback published"
                );
                Ok(Accepted { message_id })
            }
            Err(e) => {
                warn!(
                    user_id = %record.user_id,
                    topic = self.publisher.topic(),
                    error = %e,
                    "Publish failed"
                );
                Err(ValidationError::UpstreamUnavailable(e))
            }
        }
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let status = if self.is_retryable() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::BAD_REQUEST
        };
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// Shared state for receiver routes.
#[derive(Clone)]
pub struct ReceiverState {
    pub receiver: Arc<Receiver>,
}

/// Build the receiver routes.
pub fn receiver_routes(state: ReceiverState) -> Router {
    Router::new()
        .route("/receiver", post(receive))
        .with_state(state)
}

/// POST /receiver
///
/// Takes the body as bytes so malformed JSON is a 400 with our error shape.
async fn receive(State(state): State<ReceiverState>, body: Bytes) -> Response {
    match state.receiver.accept(&body).await {
        Ok(accepted) => Json(serde_json::json!({
            "success": true,
            "result": accepted.message_id,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::PublishError;

    struct CountingPublisher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingPublisher {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl Publisher for CountingPublisher {
        fn topic(&self) -> &str {
            "feedback-topic"
        }
        async fn publish(&self, _record: &FeedbackRecord) -> Result<String, PublishError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PublishError::Unreachable {
                    broker: "test".into(),
                    reason: "connection refused".into(),
                })
            } else {
                Ok(format!("msg-{n}"))
            }
        }
    }

    #[tokio::test]
    async fn valid_input_publishes_once() {
        let publisher = CountingPublisher::new(false);
        let receiver = Receiver::new(publisher.clone());

        let accepted = receiver
            .accept(br#"{"user_id": "test@example.com", "message": "I love this!"}"#)
            .await
            .unwrap();

        assert_eq!(accepted.message_id, "msg-0");
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_user_id_publishes_nothing() {
        let publisher = CountingPublisher::new(false);
        let receiver = Receiver::new(publisher.clone());

        let err = receiver.accept(br#"{"message": "hi"}"#).await.unwrap_err();

        assert!(matches!(err, ValidationError::MissingField("user_id")));
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_message_publishes_nothing() {
        let publisher = CountingPublisher::new(false);
        let receiver = Receiver::new(publisher.clone());

        let err = receiver
            .accept_value(&serde_json::json!({"user_id": "u1"}))
            .await
            .unwrap_err();

        assert!(matches!(err, ValidationError::MissingField("message")));
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn publish_failure_is_retryable() {
        let publisher = CountingPublisher::new(true);
        let receiver = Receiver::new(publisher.clone());

        let err = receiver
            .accept(br#"{"user_id": "u1", "message": "hello"}"#)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_errors_map_to_bad_request() {
        let resp = ValidationError::MissingField("user_id").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
