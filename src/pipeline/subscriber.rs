//! Background consumer for an in-process topic.
//!
//! Each received message is dispatched on its own task, so a slow scorer
//! call for one record never holds up the next.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::QueuedMessage;
use crate::pipeline::dispatcher::Dispatcher;

/// Spawn a consumer loop. It exits when the topic is dropped.
pub fn spawn_subscriber(
    dispatcher: Arc<Dispatcher>,
    mut rx: broadcast::Receiver<QueuedMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            subscriber = dispatcher.name(),
            rules = dispatcher.router().rules().len(),
            "Subscriber started"
        );
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    let queued_ms = msg.queued_for(Utc::now()).num_milliseconds();
                    let dispatcher = Arc::clone(&dispatcher);
                    tokio::spawn(async move {
                        let report = dispatcher.dispatch_bytes(&msg.id, &msg.data).await;
                        debug!(
                            subscriber = dispatcher.name(),
                            message_id = %msg.id,
                            queued_ms,
                            outcome = report.outcome.label(),
                            "Message handled"
                        );
                    });
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(
                        subscriber = dispatcher.name(),
                        missed = n,
                        "Subscriber lagged behind topic, messages dropped"
                    );
                }
                Err(RecvError::Closed) => {
                    debug!(subscriber = dispatcher.name(), "Topic closed");
                    break;
                }
            }
        }
        info!(subscriber = dispatcher.name(), "Subscriber stopped");
    })
}
