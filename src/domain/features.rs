//! Fixed-length feature vector and per-slot input normalization.

use serde::{Deserialize, Serialize};

/// Number of slots in every feature vector. Slot order is part of the model
/// contract: changing it invalidates persisted weight state.
pub const FEATURE_COUNT: usize = 20;

/// Ordered slot names, grouped: price levels (0-3), percent returns (4-6),
/// volatility / momentum (7-11), volume (12-15), structure (16-19).
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "close",
    "close_5_back",
    "close_10_back",
    "close_20_back",
    "return_5_pct",
    "return_10_pct",
    "return_20_pct",
    "realized_vol_pct",
    "rsi_14",
    "ema_9_dev_pct",
    "ema_21_dev_pct",
    "ema_spread_pct",
    "volume_ratio",
    "volume_trend",
    "log_volume",
    "log_avg_volume",
    "range_position_pct",
    "range_high",
    "range_low",
    "atr_14",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// The "insufficient history" vector.
    pub fn zeros() -> Self {
        Self {
            values: [0.0; FEATURE_COUNT],
        }
    }

    /// Builds a vector from arbitrary input: short slices are zero-padded,
    /// long slices truncated, and non-finite slots coerced to zero.
    pub fn from_slice(values: &[f64]) -> Self {
        let mut out = [0.0; FEATURE_COUNT];
        for (slot, value) in out.iter_mut().zip(values.iter()) {
            if value.is_finite() {
                *slot = *value;
            }
        }
        Self { values: out }
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn get_by_name(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .and_then(|index| self.get(index))
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }
}

/// How one input slot is squashed before it reaches the first layer. The
/// rules are data rather than code so price-scale divisors can be tuned per
/// asset regime instead of baked in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NormalizerRule {
    /// tanh(x / scale) compression for unbounded price-scale inputs.
    Tanh { scale: f64 },
    /// x / 100 for percentage and score inputs.
    Percent,
}

impl NormalizerRule {
    pub fn apply(&self, value: f64) -> f64 {
        let value = if value.is_finite() { value } else { 0.0 };
        match self {
            NormalizerRule::Tanh { scale } if *scale > 0.0 => (value / scale).tanh(),
            NormalizerRule::Tanh { .. } => value.tanh(),
            NormalizerRule::Percent => value / 100.0,
        }
    }
}

/// Per-slot normalization table applied to every vector before inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNormalizer {
    rules: [NormalizerRule; FEATURE_COUNT],
}

impl FeatureNormalizer {
    /// Default rules with a configurable scale for the price-level slots.
    pub fn with_price_scale(price_scale: f64) -> Self {
        let price = NormalizerRule::Tanh { scale: price_scale };
        let ratio = NormalizerRule::Tanh { scale: 1.0 };
        let rules = [
            price,                  // close
            price,                  // close_5_back
            price,                  // close_10_back
            price,                  // close_20_back
            NormalizerRule::Percent, // return_5_pct
            NormalizerRule::Percent, // return_10_pct
            NormalizerRule::Percent, // return_20_pct
            NormalizerRule::Percent, // realized_vol_pct
            NormalizerRule::Percent, // rsi_14
            NormalizerRule::Percent, // ema_9_dev_pct
            NormalizerRule::Percent, // ema_21_dev_pct
            NormalizerRule::Percent, // ema_spread_pct
            ratio,                  // volume_ratio
            ratio,                  // volume_trend
            ratio,                  // log_volume
            ratio,                  // log_avg_volume
            NormalizerRule::Percent, // range_position_pct
            price,                  // range_high
            price,                  // range_low
            price,                  // atr_14
        ];
        Self { rules }
    }

    pub fn rules(&self) -> &[NormalizerRule; FEATURE_COUNT] {
        &self.rules
    }

    pub fn set_rule(&mut self, index: usize, rule: NormalizerRule) {
        if let Some(slot) = self.rules.get_mut(index) {
            *slot = rule;
        }
    }

    pub fn normalize(&self, features: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for ((slot, rule), value) in out.iter_mut().zip(&self.rules).zip(&features.values) {
            *slot = rule.apply(*value);
        }
        out
    }
}

impl Default for FeatureNormalizer {
    fn default() -> Self {
        Self::with_price_scale(100_000.0)
    }
}
