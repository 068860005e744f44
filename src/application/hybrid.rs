//! Blends the classifier's confidence with the sentiment signal.

use crate::domain::direction::Direction;
use crate::domain::sentiment::SentimentResult;
use crate::application::predictor::{OUTPUT_SIZE, Prediction};
use serde::{Deserialize, Serialize};

/// Cap on how much sentiment can move the model's confidence.
pub const SENTIMENT_WEIGHT_CAP: f64 = 0.2;
/// Multiplier applied when confident sentiment contradicts the model.
pub const DISAGREEMENT_PENALTY: f64 = 0.7;
/// Sentiment confidence required before a disagreement is penalized.
pub const DISAGREEMENT_CONFIDENCE_FLOOR: f64 = 0.5;

/// Combined signal carrying both the raw model output and the
/// sentiment-adjusted confidence, so callers can inspect either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridPrediction {
    pub direction: Direction,
    pub model_confidence: f64,
    pub combined_confidence: f64,
    pub class_probabilities: [f64; OUTPUT_SIZE],
    pub sentiment: Option<SentimentResult>,
}

pub struct HybridCombiner;

impl HybridCombiner {
    /// combined = clamp01(model confidence + score * confidence * 0.2),
    /// then scaled by 0.7 when a directional sentiment with confidence
    /// above 0.5 contradicts the predicted class.
    pub fn combine(prediction: &Prediction, sentiment: Option<SentimentResult>) -> HybridPrediction {
        let mut combined = prediction.confidence;
        if let Some(result) = &sentiment {
            let adjustment = result.score * result.confidence * SENTIMENT_WEIGHT_CAP;
            combined = (prediction.confidence + adjustment).clamp(0.0, 1.0);

            let implied = result.implied_direction();
            if implied != Direction::Neutral
                && implied != prediction.direction
                && result.confidence > DISAGREEMENT_CONFIDENCE_FLOOR
            {
                combined *= DISAGREEMENT_PENALTY;
            }
        }
        HybridPrediction {
            direction: prediction.direction,
            model_confidence: prediction.confidence,
            combined_confidence: combined,
            class_probabilities: prediction.class_probabilities,
            sentiment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn prediction(direction: Direction, confidence: f64) -> Prediction {
        let mut probs = [0.0; OUTPUT_SIZE];
        probs[direction.class_index()] = confidence;
        Prediction {
            direction,
            confidence,
            class_probabilities: probs,
        }
    }

    fn sentiment(score: f64, confidence: f64) -> SentimentResult {
        SentimentResult {
            score,
            confidence,
            bullish_keywords: Vec::new(),
            bearish_keywords: Vec::new(),
            neutral_keywords: Vec::new(),
            excerpts: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_no_sentiment_passes_confidence_through() {
        let result = HybridCombiner::combine(&prediction(Direction::Long, 0.62), None);
        assert_eq!(result.combined_confidence, 0.62);
        assert_eq!(result.model_confidence, 0.62);
    }

    #[test]
    fn test_agreeing_sentiment_boosts_confidence() {
        let result = HybridCombiner::combine(
            &prediction(Direction::Long, 0.6),
            Some(sentiment(0.8, 0.9)),
        );
        let expected = 0.6 + 0.8 * 0.9 * SENTIMENT_WEIGHT_CAP;
        assert!((result.combined_confidence - expected).abs() < 1e-12);
        assert!(result.combined_confidence > result.model_confidence);
    }

    #[test]
    fn test_confident_disagreement_is_penalized() {
        let result = HybridCombiner::combine(
            &prediction(Direction::Long, 0.6),
            Some(sentiment(-0.8, 0.9)),
        );
        let adjusted = 0.6 + (-0.8) * 0.9 * SENTIMENT_WEIGHT_CAP;
        let expected = adjusted * DISAGREEMENT_PENALTY;
        assert!((result.combined_confidence - expected).abs() < 1e-12);
    }

    #[test]
    fn test_weak_disagreement_is_not_penalized() {
        let result = HybridCombiner::combine(
            &prediction(Direction::Long, 0.6),
            Some(sentiment(-0.8, 0.4)),
        );
        let expected = 0.6 + (-0.8) * 0.4 * SENTIMENT_WEIGHT_CAP;
        assert!((result.combined_confidence - expected).abs() < 1e-12);
    }

    #[test]
    fn test_neutral_sentiment_never_penalizes() {
        // Score inside the +-0.3 band implies no direction, so even at high
        // confidence the penalty does not apply.
        let result = HybridCombiner::combine(
            &prediction(Direction::Long, 0.6),
            Some(sentiment(0.2, 0.9)),
        );
        let expected = 0.6 + 0.2 * 0.9 * SENTIMENT_WEIGHT_CAP;
        assert!((result.combined_confidence - expected).abs() < 1e-12);
    }

    #[test]
    fn test_combined_confidence_is_clamped() {
        let high = HybridCombiner::combine(
            &prediction(Direction::Long, 0.95),
            Some(sentiment(1.0, 1.0)),
        );
        assert!(high.combined_confidence <= 1.0);

        let low = HybridCombiner::combine(
            &prediction(Direction::Short, 0.05),
            Some(sentiment(1.0, 0.4)),
        );
        assert!(low.combined_confidence >= 0.0);
    }
}
