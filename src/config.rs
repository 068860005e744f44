//! Engine configuration.
//!
//! Defaults cover the stock deployment; every knob can be overridden
//! through `CANDLECAST_*` environment variables (a `.env` file is honored).

use crate::domain::features::FeatureNormalizer;
use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Fixed SGD learning rate; no momentum or decay.
    pub learning_rate: f64,
    /// Maximum ledger records before oldest-first eviction.
    pub ledger_capacity: usize,
    /// Percent return at or above which the actual class is LONG.
    pub profit_threshold_pct: f64,
    /// Percent return at or below which the actual class is SHORT.
    pub loss_threshold_pct: f64,
    /// tanh scale for the price-level feature slots. Tune this to the
    /// asset's price magnitude (100000 suits majors priced in the tens of
    /// thousands; use 100 for sub-dollar assets).
    pub price_scale: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            ledger_capacity: 500,
            profit_threshold_pct: 0.5,
            loss_threshold_pct: -0.5,
            price_scale: 100_000.0,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            learning_rate: Self::parse_f64("CANDLECAST_LEARNING_RATE", 0.01)?,
            ledger_capacity: Self::parse_usize("CANDLECAST_LEDGER_CAPACITY", 500)?,
            profit_threshold_pct: Self::parse_f64("CANDLECAST_PROFIT_THRESHOLD_PCT", 0.5)?,
            loss_threshold_pct: Self::parse_f64("CANDLECAST_LOSS_THRESHOLD_PCT", -0.5)?,
            price_scale: Self::parse_f64("CANDLECAST_PRICE_SCALE", 100_000.0)?,
        })
    }

    /// Per-slot normalizer derived from the configured price scale.
    pub fn normalizer(&self) -> FeatureNormalizer {
        FeatureNormalizer::with_price_scale(self.price_scale)
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        match env::var(key) {
            Ok(value) => value
                .parse::<f64>()
                .with_context(|| format!("Failed to parse {}", key)),
            Err(_) => Ok(default),
        }
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        match env::var(key) {
            Ok(value) => value
                .parse::<usize>()
                .with_context(|| format!("Failed to parse {}", key)),
            Err(_) => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.ledger_capacity, 500);
        assert_eq!(config.profit_threshold_pct, 0.5);
        assert_eq!(config.loss_threshold_pct, -0.5);
    }

    #[test]
    fn test_normalizer_uses_price_scale() {
        let config = EngineConfig {
            price_scale: 100.0,
            ..EngineConfig::default()
        };
        let normalizer = config.normalizer();
        assert_eq!(
            normalizer,
            FeatureNormalizer::with_price_scale(100.0)
        );
    }
}
