//! Configuration types.
//!
//! Everything is read from the environment once, in `AppConfig::from_env`,
//! before the server starts. Missing or invalid values fail startup.

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::pipeline::types::AlertRule;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TOPIC: &str = "feedback-topic";
pub const DEFAULT_NEGATIVE_THRESHOLD: f64 = -0.25;
pub const DEFAULT_POSITIVE_THRESHOLD: f64 = 0.25;
pub const DEFAULT_SUPPORT_CHANNEL: &str = "#support";
pub const DEFAULT_FOLLOWUP_CHANNEL: &str = "#followup";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// How many unconsumed messages the in-memory topic buffers per subscriber.
pub const MEMORY_TOPIC_CAPACITY: usize = 1024;

/// Which message channel carries records from receiver to subscribers.
#[derive(Debug, Clone)]
pub enum BrokerConfig {
    /// In-process broadcast; subscribers run as background tasks.
    Memory { topic: String },
    /// Google Cloud Pub/Sub; subscribers are push endpoints.
    PubSub {
        project_id: String,
        topic: String,
        access_token: SecretString,
    },
}

impl BrokerConfig {
    pub fn topic(&self) -> &str {
        match self {
            Self::Memory { topic } | Self::PubSub { topic, .. } => topic,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::PubSub { .. } => "pubsub",
        }
    }
}

/// Thresholds and destinations for the two subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertConfig {
    pub negative_threshold: f64,
    pub positive_threshold: f64,
    pub support_channel: String,
    pub followup_channel: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            negative_threshold: DEFAULT_NEGATIVE_THRESHOLD,
            positive_threshold: DEFAULT_POSITIVE_THRESHOLD,
            support_channel: DEFAULT_SUPPORT_CHANNEL.to_string(),
            followup_channel: DEFAULT_FOLLOWUP_CHANNEL.to_string(),
        }
    }
}

impl AlertConfig {
    /// Rules for the `negative` subscriber.
    pub fn negative_rules(&self) -> Vec<AlertRule> {
        vec![AlertRule::negative(self.negative_threshold, &self.support_channel)]
    }

    /// Rules for the `positive` subscriber.
    pub fn positive_rules(&self) -> Vec<AlertRule> {
        vec![AlertRule::positive(self.positive_threshold, &self.followup_channel)]
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub broker: BrokerConfig,
    pub language_api_key: SecretString,
    pub slack_token: SecretString,
    pub alerts: AlertConfig,
    /// Bound on every upstream call (scorer, notifier, publisher).
    pub upstream_timeout: Duration,
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Build config from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env = Env(vars.into_iter().collect());

        let port = env.parse_or("FEEDBACK_PORT", DEFAULT_PORT)?;
        let topic = env.get("PUBSUB_TOPIC").unwrap_or(DEFAULT_TOPIC).to_string();

        let broker = match env.get("FEEDBACK_BROKER").unwrap_or("memory") {
            "memory" => BrokerConfig::Memory { topic },
            "pubsub" => BrokerConfig::PubSub {
                project_id: env.require(
                    "GCP_PROJECT_ID",
                    "Required when FEEDBACK_BROKER=pubsub.",
                )?,
                topic,
                access_token: SecretString::from(env.require(
                    "GCP_ACCESS_TOKEN",
                    "OAuth access token with pubsub.topics.publish.",
                )?),
            },
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "FEEDBACK_BROKER".into(),
                    message: format!("expected `memory` or `pubsub`, got `{other}`"),
                });
            }
        };

        let language_api_key = SecretString::from(env.require(
            "GOOGLE_LANGUAGE_API_KEY",
            "API key for the Cloud Natural Language API.",
        )?);
        let slack_token = SecretString::from(env.require(
            "SLACK_TOKEN",
            "Slack bot token with chat:write.",
        )?);

        let alerts = AlertConfig {
            negative_threshold: env
                .threshold("ALERT_NEGATIVE_THRESHOLD", DEFAULT_NEGATIVE_THRESHOLD)?,
            positive_threshold: env
                .threshold("ALERT_POSITIVE_THRESHOLD", DEFAULT_POSITIVE_THRESHOLD)?,
            support_channel: env.channel("ALERT_SUPPORT_CHANNEL", DEFAULT_SUPPORT_CHANNEL)?,
            followup_channel: env.channel("ALERT_FOLLOWUP_CHANNEL", DEFAULT_FOLLOWUP_CHANNEL)?,
        };

        let timeout_secs: u64 = env.parse_or("UPSTREAM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "UPSTREAM_TIMEOUT_SECS".into(),
                message: "must be greater than 0".into(),
            });
        }

        Ok(Self {
            port,
            broker,
            language_api_key,
            slack_token,
            alerts,
            upstream_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Variable lookup where empty values count as unset.
struct Env(HashMap<String, String>);

impl Env {
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, key: &str, hint: &str) -> Result<String, ConfigError> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| ConfigError::MissingRequired {
                key: key.to_string(),
                hint: hint.to_string(),
            })
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("`{raw}`: {e}"),
            }),
        }
    }

    fn threshold(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        let value: f64 = self.parse_or(key, default)?;
        if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{value} is outside [-1.0, 1.0]"),
            });
        }
        Ok(value)
    }

    fn channel(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        let value = self.get(key).unwrap_or(default);
        if value.trim_start_matches('#').is_empty() {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: "channel name is empty".into(),
            });
        }
        Ok(value.to_string())
    }
}
