//! Threshold router: turns a scored record into zero or more alerts.
//!
//! Rules are orthogonal. Every rule is evaluated on its own, and each
//! firing rule produces exactly one `AlertMessage`, in rule order. There is
//! no deduplication across destinations.

use tracing::debug;

use crate::pipeline::types::{AlertMessage, AlertRule, ScoredFeedback};

/// Evaluate `rules` against one scored record.
///
/// Pure: the same input always yields the same alerts. A record whose
/// scoring failed never matches anything.
pub fn route(record: &ScoredFeedback, rules: &[AlertRule]) -> Vec<AlertMessage> {
    if record.scoring_error.is_some() {
        return Vec::new();
    }

    rules
        .iter()
        .filter(|rule| rule.fires(record.score))
        .map(|rule| {
            debug!(
                user_id = %record.record.user_id,
                direction = rule.direction.label(),
                threshold = rule.threshold,
                score = record.score,
                channel = %rule.destination_channel,
                "Alert rule fired"
            );
            AlertMessage {
                destination_channel: rule.destination_channel.clone(),
                text: rule.render(&record.record, record.score),
            }
        })
        .collect()
}

/// Owns a fixed rule set for one subscriber.
#[derive(Debug, Clone, Default)]
pub struct AlertRouter {
    rules: Vec<AlertRule>,
}

impl AlertRouter {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self { rules }
    }

    /// A router with no rules (never alerts).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    pub fn route(&self, record: &ScoredFeedback) -> Vec<AlertMessage> {
        route(record, &self.rules)
    }
}
