//! Pub/Sub push endpoint: `POST /pubsub/{subscriber}`.
//!
//! Every terminal dispatch outcome is acknowledged with 204, including
//! Failed, so Pub/Sub never redelivers a record we have already handled.
//! Only an unknown subscriber name is refused.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{error, info, warn};

use crate::broker::PushEnvelope;
use crate::pipeline::dispatcher::Dispatcher;

/// Shared state for push routes.
#[derive(Clone)]
pub struct PushState {
    pub dispatchers: Arc<HashMap<String, Arc<Dispatcher>>>,
}

impl PushState {
    pub fn new(dispatchers: impl IntoIterator<Item = Arc<Dispatcher>>) -> Self {
        let dispatchers = dispatchers
            .into_iter()
            .map(|d| (d.name().to_string(), d))
            .collect();
        Self {
            dispatchers: Arc::new(dispatchers),
        }
    }
}

/// Build the push routes.
pub fn push_routes(state: PushState) -> Router {
    Router::new()
        .route("/pubsub/{subscriber}", post(handle_push))
        .with_state(state)
}

async fn handle_push(
    Path(subscriber): Path<String>,
    State(state): State<PushState>,
    body: Bytes,
) -> Response {
    let Some(dispatcher) = state.dispatchers.get(&subscriber) else {
        warn!(subscriber = %subscriber, "Push for unknown subscriber");
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("unknown subscriber: {subscriber}")})),
        )
            .into_response();
    };

    let envelope: PushEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!(subscriber = %subscriber, error = %e, "Unparseable push envelope, acking");
            return StatusCode::NO_CONTENT.into_response();
        }
    };

    let report = match envelope.decode() {
        Ok(record) => dispatcher.dispatch(record).await,
        Err(e) => {
            error!(
                subscriber = %subscriber,
                message_id = envelope.message_id(),
                error = %e,
                "Undecodable push payload, acking"
            );
            return StatusCode::NO_CONTENT.into_response();
        }
    };

    info!(
        subscriber = %subscriber,
        message_id = envelope.message_id(),
        outcome = report.outcome.label(),
        "Push message handled"
    );
    StatusCode::NO_CONTENT.into_response()
}
