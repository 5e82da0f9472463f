//! Shared types for the feedback pipeline.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ── Feedback record ─────────────────────────────────────────────────

/// A single piece of user feedback.
///
/// Built by the receiver from inbound JSON and published unchanged; the
/// same JSON shape is what subscribers decode off the message channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Who sent the feedback (email, account id, ...).
    pub user_id: String,
    /// Free-form feedback text.
    pub message: String,
}

impl FeedbackRecord {
    /// Build a record, rejecting empty or whitespace-only fields.
    pub fn new(
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let user_id = user_id.into();
        let message = message.into();
        if user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("user_id"));
        }
        if message.trim().is_empty() {
            return Err(ValidationError::MissingField("message"));
        }
        Ok(Self { user_id, message })
    }

    /// Validate an arbitrary JSON value.
    ///
    /// Both fields must be present, be strings, and be non-empty. Extra
    /// fields are ignored.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ValidationError> {
        let obj = value.as_object().ok_or_else(|| {
            ValidationError::MalformedBody(format!("expected object, got {}", kind_of(value)))
        })?;

        let user_id = obj
            .get("user_id")
            .and_then(|v| v.as_str())
            .ok_or(ValidationError::MissingField("user_id"))?;
        let message = obj
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or(ValidationError::MissingField("message"))?;

        Self::new(user_id, message)
    }

    /// Decode a record from raw message-channel bytes (UTF-8 JSON).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
        Self::from_value(&value)
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ── Scored feedback ─────────────────────────────────────────────────

/// A record after the scorer has run. Consumed once by the router.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFeedback {
    pub record: FeedbackRecord,
    /// Sentiment in [-1.0, 1.0]. Meaningless when `scoring_error` is set.
    pub score: f64,
    /// Why scoring failed, if it did.
    pub scoring_error: Option<String>,
}

impl ScoredFeedback {
    pub fn scored(record: FeedbackRecord, score: f64) -> Self {
        Self {
            record,
            score,
            scoring_error: None,
        }
    }

    pub fn unscored(record: FeedbackRecord, error: impl Into<String>) -> Self {
        Self {
            record,
            score: 0.0,
            scoring_error: Some(error.into()),
        }
    }
}

// ── Alert rules ─────────────────────────────────────────────────────

/// Which side of the threshold a rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Fires when `score < threshold`.
    Negative,
    /// Fires when `score > threshold`.
    Positive,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Positive => "positive",
        }
    }
}

/// A static alerting rule, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub direction: Direction,
    pub threshold: f64,
    pub destination_channel: String,
}

impl AlertRule {
    pub fn new(direction: Direction, threshold: f64, destination_channel: &str) -> Self {
        Self {
            direction,
            threshold,
            destination_channel: normalize_channel(destination_channel),
        }
    }

    pub fn negative(threshold: f64, destination_channel: &str) -> Self {
        Self::new(Direction::Negative, threshold, destination_channel)
    }

    pub fn positive(threshold: f64, destination_channel: &str) -> Self {
        Self::new(Direction::Positive, threshold, destination_channel)
    }

    /// Strict comparison: a score equal to the threshold never fires.
    pub fn fires(&self, score: f64) -> bool {
        match self.direction {
            Direction::Negative => score < self.threshold,
            Direction::Positive => score > self.threshold,
        }
    }

    /// Render the chat text for a record that tripped this rule.
    pub fn render(&self, record: &FeedbackRecord, score: f64) -> String {
        match self.direction {
            Direction::Negative => format!(
                "Negative feedback from {}: {} (Score: {})",
                record.user_id, record.message, score
            ),
            Direction::Positive => format!(
                "User {} sent a positive message: \"{}\"",
                record.user_id, record.message
            ),
        }
    }
}

/// Prefix channel names with `#`, leaving Slack conversation ids alone.
pub fn normalize_channel(channel: &str) -> String {
    let channel = channel.trim();
    if channel.starts_with('#') || is_conversation_id(channel) {
        channel.to_string()
    } else {
        format!("#{channel}")
    }
}

/// Slack ids: `C`/`G`/`D` prefix, 9+ uppercase alphanumerics, at least one digit.
fn is_conversation_id(channel: &str) -> bool {
    let mut chars = channel.chars();
    matches!(chars.next(), Some('C' | 'G' | 'D'))
        && channel.len() >= 9
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && channel.bytes().any(|b| b.is_ascii_digit())
}

// ── Alert message ───────────────────────────────────────────────────

/// One outbound chat alert. Discarded after a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    #[serde(rename = "channel")]
    pub destination_channel: String,
    pub text: String,
}

// ── Dispatch outcome ────────────────────────────────────────────────

/// Terminal state of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// At least one alert was attempted.
    Notified,
    /// No rule fired, or scoring failed upstream (fail-open).
    Skipped,
    /// The scorer returned something unusable.
    Failed,
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Notified => "notified",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Summary of a dispatch, returned to the subscriber loop / push handler.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub outcome: DispatchOutcome,
    pub score: Option<f64>,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_from_value_accepts_valid_object() {
        let record =
            FeedbackRecord::from_value(&json!({"user_id": "u1", "message": "hi", "extra": 1}))
                .unwrap();
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.message, "hi");
    }

    #[test]
    fn record_from_value_rejects_missing_user_id() {
        let err = FeedbackRecord::from_value(&json!({"message": "hi"})).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("user_id")));
    }

    #[test]
    fn record_from_value_rejects_empty_message() {
        let err = FeedbackRecord::from_value(&json!({"user_id": "u1", "message": "  "}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("message")));
    }

    #[test]
    fn record_from_value_rejects_non_string_field() {
        let err = FeedbackRecord::from_value(&json!({"user_id": 42, "message": "hi"}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("user_id")));
    }

    #[test]
    fn record_from_value_rejects_non_object() {
        let err = FeedbackRecord::from_value(&json!(["u1", "hi"])).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedBody(_)));
    }

    #[test]
    fn record_from_slice_rejects_garbage() {
        let err = FeedbackRecord::from_slice(b"not json").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedBody(_)));
    }

    #[test]
    fn negative_rule_is_strict() {
        let rule = AlertRule::negative(-0.25, "support");
        assert!(rule.fires(-0.26));
        assert!(!rule.fires(-0.25));
        assert!(!rule.fires(0.0));
    }

    #[test]
    fn positive_rule_is_strict() {
        let rule = AlertRule::positive(0.25, "followup");
        assert!(rule.fires(0.26));
        assert!(!rule.fires(0.25));
        assert!(!rule.fires(-1.0));
    }

    #[test]
    fn channel_names_gain_hash_prefix() {
        assert_eq!(normalize_channel("support"), "#support");
        assert_eq!(normalize_channel("#support"), "#support");
        assert_eq!(normalize_channel("C0123ABCD9"), "C0123ABCD9");
        // Short capitalised names are plain channel names, not ids.
        assert_eq!(normalize_channel("Cats"), "#Cats");
        // So are all-caps names with no digit.
        assert_eq!(normalize_channel("GENERALCHAT"), "#GENERALCHAT");
        assert_eq!(normalize_channel("DESIGNTEAM"), "#DESIGNTEAM");
        assert_eq!(normalize_channel("G01ABCDEFG"), "G01ABCDEFG");
    }

    #[test]
    fn render_matches_direction() {
        let record = FeedbackRecord::new("test@example.com", "This is terrible").unwrap();
        let neg = AlertRule::negative(-0.25, "support").render(&record, -0.6);
        assert_eq!(
            neg,
            "Negative feedback from test@example.com: This is terrible (Score: -0.6)"
        );

        let pos = AlertRule::positive(0.25, "followup").render(&record, 0.8);
        assert_eq!(
            pos,
            "User test@example.com sent a positive message: \"This is terrible\""
        );
    }

    #[test]
    fn alert_message_serializes_as_chat_payload() {
        let msg = AlertMessage {
            destination_channel: "#support".into(),
            text: "hello".into(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"channel": "#support", "text": "hello"}));
    }
}
