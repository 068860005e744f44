//! Candle-window feature extraction.
//!
//! Turns an OHLCV history and an index into the fixed 20-slot vector the
//! classifier consumes. Extraction is a pure function of its inputs: the
//! same window always yields the same vector.

use crate::domain::candle::Candle;
use crate::domain::features::{FEATURE_COUNT, FeatureVector};
use statrs::statistics::Statistics;
use ta::indicators::{AverageTrueRange, ExponentialMovingAverage};
use ta::{DataItem, Next};

/// Bars of history required before a non-zero vector can be produced.
/// Shorter histories yield the all-zero "insufficient history" vector.
pub const MIN_HISTORY: usize = 20;

const VOLATILITY_WINDOW: usize = 20;
const RSI_PERIOD: usize = 14;
const ATR_PERIOD: usize = 14;
const EMA_FAST_PERIOD: usize = 9;
const EMA_SLOW_PERIOD: usize = 21;
/// Bars fed into the streaming EMAs so their warm-up transient has decayed.
const EMA_WARMUP: usize = 64;
const VOLUME_WINDOW: usize = 20;
const RANGE_WINDOW: usize = 20;

pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Extracts the feature vector for `candles[index]` from the bars at and
    /// before that index. Returns zeros when the index is out of range or
    /// fewer than [`MIN_HISTORY`] bars precede it.
    pub fn extract(candles: &[Candle], index: usize) -> FeatureVector {
        if index >= candles.len() || index < MIN_HISTORY {
            return FeatureVector::zeros();
        }

        let current = &candles[index];
        let price = current.close;
        let pct_from = |from: f64| {
            if from > 0.0 {
                (price - from) / from * 100.0
            } else {
                0.0
            }
        };

        let mut values = [0.0f64; FEATURE_COUNT];

        // Price levels and the returns over the same lookbacks.
        values[0] = price;
        values[1] = candles[index - 5].close;
        values[2] = candles[index - 10].close;
        values[3] = candles[index - 20].close;
        values[4] = pct_from(values[1]);
        values[5] = pct_from(values[2]);
        values[6] = pct_from(values[3]);

        values[7] = realized_volatility(candles, index);
        values[8] = rsi(candles, index);

        let ema_fast = ema(candles, index, EMA_FAST_PERIOD);
        let ema_slow = ema(candles, index, EMA_SLOW_PERIOD);
        values[9] = if price > 0.0 {
            (ema_fast - price) / price * 100.0
        } else {
            0.0
        };
        values[10] = if price > 0.0 {
            (ema_slow - price) / price * 100.0
        } else {
            0.0
        };
        // Fast/slow EMA spread as a MACD proxy, in percent of price.
        values[11] = if price > 0.0 {
            (ema_fast - ema_slow) / price * 100.0
        } else {
            0.0
        };

        let volume_window = &candles[index + 1 - VOLUME_WINDOW..=index];
        let avg_volume =
            volume_window.iter().map(|c| c.volume).sum::<f64>() / VOLUME_WINDOW as f64;
        values[12] = if avg_volume > 0.0 {
            current.volume / avg_volume
        } else {
            0.0
        };
        let recent: f64 = candles[index - 4..=index].iter().map(|c| c.volume).sum();
        let prior: f64 = candles[index - 9..=index - 5].iter().map(|c| c.volume).sum();
        values[13] = if prior > 0.0 { recent / prior } else { 0.0 };
        values[14] = (1.0 + current.volume.max(0.0)).ln();
        values[15] = (1.0 + avg_volume.max(0.0)).ln();

        let range = &candles[index + 1 - RANGE_WINDOW..=index];
        let high = range.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let low = range.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        values[16] = if high > low {
            (price - low) / (high - low) * 100.0
        } else {
            50.0
        };
        values[17] = high;
        values[18] = low;
        values[19] = atr(candles, index);

        FeatureVector::from_slice(&values)
    }
}

/// Sample stdev of bar-to-bar percent returns over the trailing window.
fn realized_volatility(candles: &[Candle], index: usize) -> f64 {
    let mut returns = Vec::with_capacity(VOLATILITY_WINDOW);
    for i in index + 1 - VOLATILITY_WINDOW..=index {
        let prev = candles[i - 1].close;
        if prev > 0.0 {
            returns.push((candles[i].close - prev) / prev * 100.0);
        }
    }
    if returns.len() < 2 {
        return 0.0;
    }
    let std_dev = returns.iter().std_dev();
    if std_dev.is_finite() { std_dev } else { 0.0 }
}

/// Classic RSI from simple average gain/loss over the period. 50 without
/// usable movement data; exactly 100 when the window holds no losses.
fn rsi(candles: &[Candle], index: usize) -> f64 {
    if index < RSI_PERIOD {
        return 50.0;
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in index + 1 - RSI_PERIOD..=index {
        let delta = candles[i].close - candles[i - 1].close;
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let avg_gain = gains / RSI_PERIOD as f64;
    let avg_loss = losses / RSI_PERIOD as f64;
    if avg_loss <= f64::EPSILON {
        return if avg_gain > 0.0 { 100.0 } else { 50.0 };
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

fn ema(candles: &[Candle], index: usize, period: usize) -> f64 {
    let start = index.saturating_sub(EMA_WARMUP - 1);
    let mut indicator = ExponentialMovingAverage::new(period).unwrap();
    let mut value = candles[index].close;
    for candle in &candles[start..=index] {
        value = indicator.next(candle.close);
    }
    value
}

fn atr(candles: &[Candle], index: usize) -> f64 {
    let start = index.saturating_sub(ATR_PERIOD);
    let mut indicator = AverageTrueRange::new(ATR_PERIOD).unwrap();
    let mut value = 0.0;
    for candle in &candles[start..=index] {
        let item = DataItem::builder()
            .open(candle.open)
            .high(candle.high)
            .low(candle.low)
            .close(candle.close)
            .volume(candle.volume)
            .build();
        // Bars with inconsistent high/low bounds are skipped rather than fed
        // into the true-range average.
        if let Ok(item) = item {
            value = indicator.next(&item);
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(index: usize, close: f64, volume: f64) -> Candle {
        Candle::new(
            index as i64 * 60_000,
            close,
            close * 1.01,
            close * 0.99,
            close,
            volume,
        )
    }

    fn rising_series(bars: usize) -> Vec<Candle> {
        (0..bars)
            .map(|i| candle(i, 100.0 + i as f64, 1_000.0 + i as f64 * 10.0))
            .collect()
    }

    #[test]
    fn test_insufficient_history_yields_zeros() {
        let candles = rising_series(25);
        assert!(FeatureExtractor::extract(&candles, 10).is_zero());
        assert!(FeatureExtractor::extract(&candles, 19).is_zero());
        assert!(!FeatureExtractor::extract(&candles, 20).is_zero());
    }

    #[test]
    fn test_out_of_range_index_yields_zeros() {
        let candles = rising_series(25);
        assert!(FeatureExtractor::extract(&candles, 25).is_zero());
        assert!(FeatureExtractor::extract(&[], 0).is_zero());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let candles = rising_series(40);
        let first = FeatureExtractor::extract(&candles, 30);
        let second = FeatureExtractor::extract(&candles, 30);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rsi_saturates_on_monotonic_rise() {
        let candles = rising_series(40);
        let features = FeatureExtractor::extract(&candles, 30);
        assert_eq!(features.get_by_name("rsi_14"), Some(100.0));
    }

    #[test]
    fn test_rsi_low_on_monotonic_fall() {
        let candles: Vec<Candle> = (0..40)
            .map(|i| candle(i, 200.0 - i as f64, 1_000.0))
            .collect();
        let features = FeatureExtractor::extract(&candles, 30);
        let rsi = features.get_by_name("rsi_14").unwrap();
        assert!(rsi < 1.0, "expected RSI near 0, got {rsi}");
    }

    #[test]
    fn test_price_and_return_slots() {
        let candles = rising_series(40);
        let features = FeatureExtractor::extract(&candles, 30);
        assert_eq!(features.get_by_name("close"), Some(130.0));
        assert_eq!(features.get_by_name("close_5_back"), Some(125.0));
        let ret5 = features.get_by_name("return_5_pct").unwrap();
        assert!((ret5 - (130.0 - 125.0) / 125.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_range_position_within_bounds() {
        let candles = rising_series(40);
        let features = FeatureExtractor::extract(&candles, 30);
        let position = features.get_by_name("range_position_pct").unwrap();
        assert!((0.0..=100.0).contains(&position));
        let high = features.get_by_name("range_high").unwrap();
        let low = features.get_by_name("range_low").unwrap();
        assert!(high > low);
    }

    #[test]
    fn test_flat_series_is_neutral() {
        let candles: Vec<Candle> = (0..40).map(|i| candle(i, 100.0, 1_000.0)).collect();
        let features = FeatureExtractor::extract(&candles, 30);
        assert_eq!(features.get_by_name("rsi_14"), Some(50.0));
        assert_eq!(features.get_by_name("realized_vol_pct"), Some(0.0));
        assert_eq!(features.get_by_name("return_10_pct"), Some(0.0));
        // Flat closes leave the volume ratio at exactly 1.
        assert_eq!(features.get_by_name("volume_ratio"), Some(1.0));
    }
}
