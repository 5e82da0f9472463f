//! Dispatcher: scores one queued record, routes it, and sends alerts.
//!
//! Flow per record:
//! 1. Score (bounded by a timeout). Upstream failure → Skipped, unusable
//!    score → Failed.
//! 2. Route against this dispatcher's rules. No alerts → Skipped.
//! 3. Notify once per alert. Delivery failures are logged; the outcome is
//!    Notified as soon as one alert was attempted.
//!
//! Nothing here returns an error to the caller: every record ends in a
//! terminal `DispatchOutcome` so the broker never redelivers it.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::error::{DeliveryError, ScoringError};
use crate::notify::Notifier;
use crate::pipeline::rules::AlertRouter;
use crate::pipeline::types::{
    AlertMessage, DispatchOutcome, DispatchReport, FeedbackRecord, ScoredFeedback,
};
use crate::scoring::{Scorer, check_range};

/// Default bound on each scorer / notifier call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// One subscriber's processing pipeline.
///
/// Holds only shared read-only state, so a single instance can serve
/// concurrent dispatches.
pub struct Dispatcher {
    name: String,
    scorer: Arc<dyn Scorer>,
    notifier: Arc<dyn Notifier>,
    router: AlertRouter,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        name: impl Into<String>,
        scorer: Arc<dyn Scorer>,
        notifier: Arc<dyn Notifier>,
        router: AlertRouter,
    ) -> Self {
        Self {
            name: name.into(),
            scorer,
            notifier,
            router,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn router(&self) -> &AlertRouter {
        &self.router
    }

    /// Dispatch raw message-channel bytes. Undecodable payloads end in Failed.
    pub async fn dispatch_bytes(&self, message_id: &str, data: &[u8]) -> DispatchReport {
        match FeedbackRecord::from_slice(data) {
            Ok(record) => self.dispatch(record).await,
            Err(e) => {
                error!(
                    subscriber = %self.name,
                    message_id,
                    error = %e,
                    "Dropping undecodable message"
                );
                DispatchReport {
                    outcome: DispatchOutcome::Failed,
                    score: None,
                    alerts_sent: 0,
                    alerts_failed: 0,
                }
            }
        }
    }

    /// Run one record through score → route → notify.
    pub async fn dispatch(&self, record: FeedbackRecord) -> DispatchReport {
        debug!(subscriber = %self.name, user_id = %record.user_id, "Dispatch received");

        // Received → Scored | Skipped | Failed
        let scored = match self.score(&record.message).await {
            Ok(score) => ScoredFeedback::scored(record, score),
            Err(e) if e.is_upstream() => {
                warn!(
                    subscriber = %self.name,
                    user_id = %record.user_id,
                    error = %e,
                    "Scoring unavailable, skipping alerts"
                );
                return report(DispatchOutcome::Skipped, None, 0, 0);
            }
            Err(e) => {
                error!(
                    subscriber = %self.name,
                    user_id = %record.user_id,
                    error = %e,
                    "Scoring returned an unusable result"
                );
                return report(DispatchOutcome::Failed, None, 0, 0);
            }
        };

        // Scored → Routed | Skipped
        let alerts = self.router.route(&scored);
        if alerts.is_empty() {
            info!(
                subscriber = %self.name,
                user_id = %scored.record.user_id,
                score = scored.score,
                "No alert rule matched"
            );
            return report(DispatchOutcome::Skipped, Some(scored.score), 0, 0);
        }

        // Routed → Notified
        let results = join_all(alerts.iter().map(|alert| self.deliver(alert))).await;
        let alerts_failed = results.iter().filter(|r| r.is_err()).count();
        let alerts_sent = results.len() - alerts_failed;

        info!(
            subscriber = %self.name,
            user_id = %scored.record.user_id,
            score = scored.score,
            alerts_sent,
            alerts_failed,
            "Feedback dispatched"
        );
        report(
            DispatchOutcome::Notified,
            Some(scored.score),
            alerts_sent,
            alerts_failed,
        )
    }

    async fn score(&self, text: &str) -> Result<f64, ScoringError> {
        let score = match tokio::time::timeout(self.call_timeout, self.scorer.score(text)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ScoringError::Timeout {
                    provider: self.scorer.name().to_string(),
                    timeout: self.call_timeout,
                });
            }
        };
        // Enforced for every Scorer, not only the built-in client.
        check_range(self.scorer.name(), score)
    }

    async fn deliver(&self, alert: &AlertMessage) -> Result<(), DeliveryError> {
        let result = match tokio::time::timeout(self.call_timeout, self.notifier.notify(alert))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Unreachable {
                channel: alert.destination_channel.clone(),
                reason: format!("timed out after {:?}", self.call_timeout),
            }),
        };

        match result {
            Ok(ack) => {
                debug!(
                    subscriber = %self.name,
                    channel = %ack.channel,
                    message_id = ?ack.message_id,
                    "Alert delivered"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    subscriber = %self.name,
                    notifier = self.notifier.name(),
                    channel = %alert.destination_channel,
                    error = %e,
                    "Alert delivery failed"
                );
                Err(e)
            }
        }
    }
}

fn report(
    outcome: DispatchOutcome,
    score: Option<f64>,
    alerts_sent: usize,
    alerts_failed: usize,
) -> DispatchReport {
    DispatchReport {
        outcome,
        score,
        alerts_sent,
        alerts_failed,
    }
}
