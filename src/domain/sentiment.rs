use crate::domain::direction::Direction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score magnitude past which sentiment implies a direction on its own.
pub const DIRECTION_THRESHOLD: f64 = 0.3;

/// Result of scoring one or more texts against the financial lexicons.
/// Recomputed per call; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    /// Polarity in [-1, 1]; positive is bullish.
    pub score: f64,
    /// Match-count saturation in [0, 1].
    pub confidence: f64,
    pub bullish_keywords: Vec<String>,
    pub bearish_keywords: Vec<String>,
    pub neutral_keywords: Vec<String>,
    pub excerpts: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl SentimentResult {
    /// Zero-score, zero-confidence result for empty or matchless input.
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            confidence: 0.0,
            bullish_keywords: Vec::new(),
            bearish_keywords: Vec::new(),
            neutral_keywords: Vec::new(),
            excerpts: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Direction implied by the score: bullish above +0.3, bearish below
    /// -0.3, neutral in between.
    pub fn implied_direction(&self) -> Direction {
        if self.score > DIRECTION_THRESHOLD {
            Direction::Long
        } else if self.score < -DIRECTION_THRESHOLD {
            Direction::Short
        } else {
            Direction::Neutral
        }
    }
}
