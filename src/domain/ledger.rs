use crate::domain::direction::Direction;
use crate::domain::features::FeatureVector;
use serde::{Deserialize, Serialize};

/// Validation state of a recorded prediction. A record transitions out of
/// Pending exactly once and is immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Pending,
    Correct,
    Incorrect,
}

/// One prediction awaiting (or holding) its validated outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Unix milliseconds; also the key validation looks the record up by.
    pub timestamp: i64,
    pub features: FeatureVector,
    pub predicted: Direction,
    pub confidence: f64,
    pub price_at_prediction: f64,
    pub price_after: Option<f64>,
    pub outcome: Outcome,
    pub return_pct: Option<f64>,
}

impl PredictionRecord {
    pub fn pending(
        timestamp: i64,
        features: FeatureVector,
        predicted: Direction,
        confidence: f64,
        price_at_prediction: f64,
    ) -> Self {
        Self {
            timestamp,
            features,
            predicted,
            confidence,
            price_at_prediction,
            price_after: None,
            outcome: Outcome::Pending,
            return_pct: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == Outcome::Pending
    }
}
