//! Feedback alerts: sentiment-routed chat alerts for user feedback.

pub mod broker;
pub mod config;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod receiver;
pub mod scoring;
pub mod server;
