//! Backtest harness scenarios over synthetic candle series.

use candlecast::application::backtest::{BacktestConfig, BacktestEngine};
use candlecast::application::engine::PredictionEngine;
use candlecast::application::feature_extractor::FeatureExtractor;
use candlecast::application::predictor::{OUTPUT_SIZE, Prediction};
use candlecast::config::EngineConfig;
use candlecast::domain::candle::Candle;
use candlecast::domain::direction::Direction;

fn candle(index: usize, close: f64) -> Candle {
    Candle::new(
        index as i64 * 60_000,
        close,
        close * 1.001,
        close * 0.999,
        close,
        1_000.0 + index as f64,
    )
}

fn constant_prediction(direction: Direction) -> Prediction {
    let mut probs = [0.0; OUTPUT_SIZE];
    probs[direction.class_index()] = 1.0;
    Prediction {
        direction,
        confidence: 1.0,
        class_probabilities: probs,
    }
}

/// Rising monotonically 100 -> 200 over 60 bars, horizon 5, thresholds
/// +-0.5%, always-LONG predictor: every long call is correct and there are
/// no losing steps.
#[test]
fn rising_market_always_long_is_perfect() {
    let candles: Vec<Candle> = (0..60)
        .map(|i| candle(i, 100.0 + i as f64 * (100.0 / 59.0)))
        .collect();
    let config = BacktestConfig {
        horizon: 5,
        profit_threshold_pct: 0.5,
        loss_threshold_pct: -0.5,
        ..BacktestConfig::default()
    };

    let result = BacktestEngine::run(&candles, &config, FeatureExtractor::extract, |_| {
        constant_prediction(Direction::Long)
    });

    assert!(result.total_evaluated > 0);
    assert!((result.long.accuracy - 1.0).abs() < 1e-12);
    assert_eq!(result.long.count, result.total_evaluated);
    assert!(result.profit_factor.is_infinite() && result.profit_factor > 0.0);
    assert!((result.win_rate - 1.0).abs() < 1e-12);
    assert_eq!(result.max_drawdown_pct, 0.0);
}

#[test]
fn falling_market_rewards_shorts() {
    let candles: Vec<Candle> = (0..60)
        .map(|i| candle(i, 200.0 - i as f64 * (100.0 / 59.0)))
        .collect();
    let result = BacktestEngine::run(
        &candles,
        &BacktestConfig::default(),
        FeatureExtractor::extract,
        |_| constant_prediction(Direction::Short),
    );
    assert!((result.short.accuracy - 1.0).abs() < 1e-12);
    assert!(result.profit_factor.is_infinite());
    assert!(result.final_equity_pct > 0.0);
}

#[test]
fn engine_backtests_are_reproducible() {
    let candles: Vec<Candle> = (0..120)
        .map(|i| {
            // Zig-zag around a rising trend.
            let wave = if i % 2 == 0 { 1.5 } else { -1.0 };
            candle(i, 100.0 + i as f64 * 0.3 + wave)
        })
        .collect();

    let engine = PredictionEngine::new(EngineConfig::default());
    let first = engine.run_backtest(&candles, None);
    let second = engine.run_backtest(&candles, None);

    assert_eq!(first.accuracy, second.accuracy);
    assert_eq!(first.profit_factor, second.profit_factor);
    assert_eq!(first.max_drawdown_pct, second.max_drawdown_pct);
    assert_eq!(first.sharpe_ratio, second.sharpe_ratio);
    assert_eq!(first.timeline, second.timeline);
}

#[test]
fn breakdown_counts_cover_all_evaluations() {
    let candles: Vec<Candle> = (0..100)
        .map(|i| candle(i, 100.0 + (i as f64 * 0.7).sin() * 5.0))
        .collect();
    let engine = PredictionEngine::new(EngineConfig::default());
    let result = engine.run_backtest(&candles, None);

    assert_eq!(
        result.long.count + result.short.count + result.neutral.count,
        result.total_evaluated
    );
    assert_eq!(
        result.long.correct + result.short.correct + result.neutral.correct,
        result.correct
    );
    assert!((0.0..=1.0).contains(&result.accuracy));
}

#[test]
fn each_run_replaces_the_previous_result() {
    use candlecast::application::engine::BACKTEST_KEY;
    use candlecast::infrastructure::persistence::{InMemoryStore, KeyValueStore};
    use std::sync::Arc;

    let store = Arc::new(InMemoryStore::new());
    let engine = PredictionEngine::with_store(EngineConfig::default(), store.clone());

    let rising: Vec<Candle> = (0..60).map(|i| candle(i, 100.0 + i as f64)).collect();
    engine.run_backtest(&rising, None);
    let first_bytes = store.get(BACKTEST_KEY).unwrap().unwrap();

    let falling: Vec<Candle> = (0..80).map(|i| candle(i, 200.0 - i as f64)).collect();
    engine.run_backtest(&falling, None);
    let second_bytes = store.get(BACKTEST_KEY).unwrap().unwrap();

    assert_ne!(first_bytes, second_bytes);
}
