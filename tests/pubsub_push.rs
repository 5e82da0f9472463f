//! Tests for the Pub/Sub push endpoints, driven through `tower::ServiceExt`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use tokio::sync::Mutex;
use tower::ServiceExt;

use feedback_alerts::broker::MemoryTopic;
use feedback_alerts::config::AlertConfig;
use feedback_alerts::error::{DeliveryError, ScoringError};
use feedback_alerts::notify::{Ack, Notifier};
use feedback_alerts::pipeline::{AlertMessage, AlertRouter, Dispatcher};
use feedback_alerts::receiver::Receiver;
use feedback_alerts::scoring::Scorer;
use feedback_alerts::server::app_routes;

struct FixedScorer(Result<f64, ()>);

#[async_trait]
impl Scorer for FixedScorer {
    fn name(&self) -> &str {
        "fixed"
    }
    async fn score(&self, _text: &str) -> Result<f64, ScoringError> {
        self.0.map_err(|_| ScoringError::UpstreamFailure {
            provider: "fixed".into(),
            reason: "quota exceeded".into(),
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<AlertMessage>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }
    async fn notify(&self, msg: &AlertMessage) -> Result<Ack, DeliveryError> {
        self.sent.lock().await.push(msg.clone());
        Err(DeliveryError::Unreachable {
            channel: msg.destination_channel.clone(),
            reason: "webhook offline".into(),
        })
    }
}

fn app(score: Result<f64, ()>, notifier: Arc<RecordingNotifier>) -> Router {
    let scorer: Arc<dyn Scorer> = Arc::new(FixedScorer(score));
    let alerts = AlertConfig::default();
    let negative = Arc::new(Dispatcher::new(
        "negative",
        Arc::clone(&scorer),
        notifier.clone(),
        AlertRouter::new(alerts.negative_rules()),
    ));
    let positive = Arc::new(Dispatcher::new(
        "positive",
        scorer,
        notifier,
        AlertRouter::new(alerts.positive_rules()),
    ));
    let receiver = Arc::new(Receiver::new(MemoryTopic::new("unused", 4)));
    app_routes(receiver, vec![negative, positive])
}

fn push_request(subscriber: &str, payload: &[u8]) -> Request<Body> {
    let envelope = json!({
        "message": {
            "data": STANDARD.encode(payload),
            "messageId": "2070443601311540",
            "attributes": {}
        },
        "subscription": format!("projects/p/subscriptions/{subscriber}")
    });
    Request::builder()
        .method("POST")
        .uri(format!("/pubsub/{subscriber}"))
        .header("content-type", "application/json")
        .body(Body::from(envelope.to_string()))
        .unwrap()
}

#[tokio::test]
async fn negative_push_alerts_support_and_acks() {
    let notifier = Arc::new(RecordingNotifier::default());
    let response = app(Ok(-0.6), notifier.clone())
        .oneshot(push_request(
            "negative",
            br#"{"user_id": "u1", "message": "This is terrible"}"#,
        ))
        .await
        .unwrap();

    // Delivery failed, yet the message is still acknowledged.
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let sent = notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].destination_channel, "#support");
}

#[tokio::test]
async fn positive_subscriber_ignores_negative_feedback() {
    let notifier = Arc::new(RecordingNotifier::default());
    let response = app(Ok(-0.6), notifier.clone())
        .oneshot(push_request(
            "positive",
            br#"{"user_id": "u1", "message": "This is terrible"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn scoring_outage_still_acks() {
    let notifier = Arc::new(RecordingNotifier::default());
    let response = app(Err(()), notifier.clone())
        .oneshot(push_request(
            "negative",
            br#"{"user_id": "u1", "message": "This is terrible"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn undecodable_payload_is_acked_without_alert() {
    let notifier = Arc::new(RecordingNotifier::default());
    let response = app(Ok(-0.9), notifier.clone())
        .oneshot(push_request("negative", br#"{"message": "hi"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn garbage_envelope_is_acked() {
    let notifier = Arc::new(RecordingNotifier::default());
    let request = Request::builder()
        .method("POST")
        .uri("/pubsub/negative")
        .body(Body::from("not an envelope"))
        .unwrap();

    let response = app(Ok(-0.9), notifier.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn unknown_subscriber_is_not_found() {
    let notifier = Arc::new(RecordingNotifier::default());
    let response = app(Ok(0.9), notifier)
        .oneshot(push_request("sideways", br#"{"user_id": "u1", "message": "hi"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("sideways"));
}

#[tokio::test]
async fn receiver_rejects_missing_user_id_via_router() {
    let notifier = Arc::new(RecordingNotifier::default());
    let request = Request::builder()
        .method("POST")
        .uri("/receiver")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"message": "hi"}"#))
        .unwrap();

    let response = app(Ok(0.0), notifier).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
