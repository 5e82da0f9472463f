//! Sentiment scoring.
//!
//! The `Scorer` trait is the seam between the dispatcher and whatever NLP
//! service produces the score. `LanguageScorer` talks to Google Cloud
//! Natural Language; tests substitute fakes.

pub mod language;

pub use language::LanguageScorer;

use async_trait::async_trait;

use crate::error::ScoringError;

/// Lowest score a scorer may return.
pub const MIN_SCORE: f64 = -1.0;
/// Highest score a scorer may return.
pub const MAX_SCORE: f64 = 1.0;

/// Produces a sentiment score in [-1.0, 1.0] for a piece of text.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Provider name for logs and errors.
    fn name(&self) -> &str;

    /// Score `text`. Implementations must not retry.
    async fn score(&self, text: &str) -> Result<f64, ScoringError>;
}

/// Reject non-finite or out-of-range upstream scores.
pub fn check_range(provider: &str, score: f64) -> Result<f64, ScoringError> {
    if score.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(score)
    } else {
        Err(ScoringError::InvalidResponse {
            provider: provider.to_string(),
            reason: format!("score {score} outside [{MIN_SCORE}, {MAX_SCORE}]"),
        })
    }
}
