//! HTTP surface: receiver, Pub/Sub push endpoints, and health.

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::dispatcher::Dispatcher;
use crate::pipeline::push::{PushState, push_routes};
use crate::receiver::{Receiver, ReceiverState, receiver_routes};

/// Build the full application router.
pub fn app_routes(receiver: Arc<Receiver>, dispatchers: Vec<Arc<Dispatcher>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(receiver_routes(ReceiverState { receiver }))
        .merge(push_routes(PushState::new(dispatchers)))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "feedback-alerts"
    }))
}
