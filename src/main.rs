use std::sync::Arc;

use anyhow::Context;

use feedback_alerts::broker::{MemoryTopic, PubSubPublisher, Publisher};
use feedback_alerts::config::{AppConfig, BrokerConfig, MEMORY_TOPIC_CAPACITY};
use feedback_alerts::notify::{Notifier, SlackNotifier};
use feedback_alerts::pipeline::{AlertRouter, Dispatcher, spawn_subscriber};
use feedback_alerts::receiver::Receiver;
use feedback_alerts::scoring::{LanguageScorer, Scorer};
use feedback_alerts::server::app_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Fail before serving anything if configuration is incomplete.
    let config = AppConfig::from_env().context("invalid configuration")?;

    eprintln!("📣 Feedback Alerts v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Receiver: http://0.0.0.0:{}/receiver", config.port);
    eprintln!("   Broker: {} (topic: {})", config.broker.label(), config.broker.topic());
    eprintln!(
        "   Negative: score < {} → {}",
        config.alerts.negative_threshold, config.alerts.support_channel
    );
    eprintln!(
        "   Positive: score > {} → {}",
        config.alerts.positive_threshold, config.alerts.followup_channel
    );

    // ── Upstream clients ────────────────────────────────────────────────
    let scorer: Arc<dyn Scorer> = Arc::new(
        LanguageScorer::new(config.language_api_key.clone(), config.upstream_timeout)
            .context("failed to build scorer")?,
    );
    let notifier: Arc<dyn Notifier> = Arc::new(
        SlackNotifier::new(config.slack_token.clone(), config.upstream_timeout)
            .context("failed to build notifier")?,
    );

    // ── Subscribers ─────────────────────────────────────────────────────
    let negative = Arc::new(
        Dispatcher::new(
            "negative",
            Arc::clone(&scorer),
            Arc::clone(&notifier),
            AlertRouter::new(config.alerts.negative_rules()),
        )
        .with_call_timeout(config.upstream_timeout),
    );
    let positive = Arc::new(
        Dispatcher::new(
            "positive",
            Arc::clone(&scorer),
            Arc::clone(&notifier),
            AlertRouter::new(config.alerts.positive_rules()),
        )
        .with_call_timeout(config.upstream_timeout),
    );

    // ── Message channel ─────────────────────────────────────────────────
    let publisher: Arc<dyn Publisher> = match &config.broker {
        BrokerConfig::Memory { topic } => {
            let topic = MemoryTopic::new(topic.clone(), MEMORY_TOPIC_CAPACITY);
            let _negative_handle = spawn_subscriber(Arc::clone(&negative), topic.subscribe());
            let _positive_handle = spawn_subscriber(Arc::clone(&positive), topic.subscribe());
            tracing::info!(
                topic = topic.topic(),
                subscribers = topic.subscriber_count(),
                "In-process topic ready"
            );
            topic
        }
        BrokerConfig::PubSub {
            project_id,
            topic,
            access_token,
        } => {
            eprintln!("   Push endpoints: /pubsub/negative, /pubsub/positive");
            Arc::new(
                PubSubPublisher::new(
                    project_id,
                    topic,
                    access_token.clone(),
                    config.upstream_timeout,
                )
                .context("failed to build Pub/Sub publisher")?,
            )
        }
    };

    let receiver = Arc::new(Receiver::new(publisher));
    let app = app_routes(receiver, vec![negative, positive]);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Feedback server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("server error")?;

    Ok(())
}
