//! Feedback processing pipeline.
//!
//! Every record published to the topic flows through, per subscriber:
//! 1. `Scorer::score()`: external sentiment call, bounded by a timeout
//! 2. `rules::route()`: pure threshold evaluation
//! 3. `Notifier::notify()`: one delivery attempt per fired rule
//!
//! Alerting failures degrade to a missed alert. They never fail the
//! dispatch, so the broker never redelivers a record.

pub mod dispatcher;
pub mod push;
pub mod rules;
pub mod subscriber;
pub mod types;

pub use dispatcher::Dispatcher;
pub use rules::{AlertRouter, route};
pub use subscriber::spawn_subscriber;
pub use types::{
    AlertMessage, AlertRule, Direction, DispatchOutcome, DispatchReport, FeedbackRecord,
    ScoredFeedback,
};
