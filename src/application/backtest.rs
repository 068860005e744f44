//! Historical replay harness.
//!
//! Walks a candle series, asks the supplied predict function for a signal at
//! each bar, scores it against the realized return `horizon` bars ahead, and
//! folds everything into one [`BacktestResult`]: accuracy, win rate, profit
//! factor, an annualized Sharpe-like ratio, max drawdown, a per-direction
//! breakdown, and a bounded timeline.

use crate::application::feature_extractor::MIN_HISTORY;
use crate::application::predictor::Prediction;
use crate::domain::candle::Candle;
use crate::domain::direction::Direction;
use crate::domain::features::FeatureVector;
use crate::domain::stats::FloatStats;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Timeline entries kept in the persisted form of a result.
pub const PERSISTED_TIMELINE_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub start_index: usize,
    /// Last index to evaluate. `None` stops `horizon` bars before the series
    /// end so every evaluated bar has a full horizon; an explicit index may
    /// extend into the clamped tail.
    pub end_index: Option<usize>,
    /// Bars to look ahead when scoring a prediction.
    pub horizon: usize,
    /// Percent return at or above which a LONG call is correct.
    pub profit_threshold_pct: f64,
    /// Percent return at or below which a SHORT call is correct.
    pub loss_threshold_pct: f64,
    /// Timeline entries retained in the in-memory result.
    pub timeline_limit: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start_index: MIN_HISTORY,
            end_index: None,
            horizon: 5,
            profit_threshold_pct: 0.5,
            loss_threshold_pct: -0.5,
            timeline_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DirectionBreakdown {
    pub count: usize,
    pub correct: usize,
    /// Fraction in [0, 1]; 0 when the direction was never predicted.
    pub accuracy: f64,
}

impl DirectionBreakdown {
    fn tally(&mut self, correct: bool) {
        self.count += 1;
        if correct {
            self.correct += 1;
        }
    }

    fn finalize(&mut self) {
        self.accuracy = if self.count > 0 {
            self.correct as f64 / self.count as f64
        } else {
            0.0
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: i64,
    pub predicted: Direction,
    pub actual: Direction,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub total_evaluated: usize,
    pub correct: usize,
    /// Overall fraction of correct calls in [0, 1].
    pub accuracy: f64,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_win_pct: f64,
    pub total_loss_pct: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    /// Total win amount over total loss amount; +inf with wins and no
    /// losses, 0 with neither.
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    /// Final value of the synthetic equity curve, in percent points.
    pub final_equity_pct: f64,
    pub long: DirectionBreakdown,
    pub short: DirectionBreakdown,
    pub neutral: DirectionBreakdown,
    pub timeline: Vec<TimelineEntry>,
}

impl BacktestResult {
    pub fn empty() -> Self {
        Self {
            total_evaluated: 0,
            correct: 0,
            accuracy: 0.0,
            wins: 0,
            losses: 0,
            win_rate: 0.0,
            total_win_pct: 0.0,
            total_loss_pct: 0.0,
            avg_win_pct: 0.0,
            avg_loss_pct: 0.0,
            profit_factor: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown_pct: 0.0,
            final_equity_pct: 0.0,
            long: DirectionBreakdown::default(),
            short: DirectionBreakdown::default(),
            neutral: DirectionBreakdown::default(),
            timeline: Vec::new(),
        }
    }

    /// Persisted form: profit factor becomes `None` when non-finite and the
    /// timeline is truncated to its newest entries.
    pub fn to_persisted(&self) -> PersistedBacktest {
        let skip = self.timeline.len().saturating_sub(PERSISTED_TIMELINE_LIMIT);
        PersistedBacktest {
            version: PersistedBacktest::VERSION,
            total_evaluated: self.total_evaluated,
            correct: self.correct,
            accuracy: self.accuracy,
            wins: self.wins,
            losses: self.losses,
            win_rate: self.win_rate,
            avg_win_pct: self.avg_win_pct,
            avg_loss_pct: self.avg_loss_pct,
            profit_factor: self.profit_factor.is_finite().then_some(self.profit_factor),
            sharpe_ratio: self.sharpe_ratio,
            max_drawdown_pct: self.max_drawdown_pct,
            final_equity_pct: self.final_equity_pct,
            long: self.long,
            short: self.short,
            neutral: self.neutral,
            timeline: self.timeline[skip..].to_vec(),
        }
    }
}

/// Snapshot written to the key-value store after every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedBacktest {
    pub version: u32,
    pub total_evaluated: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    pub profit_factor: Option<f64>,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub final_equity_pct: f64,
    pub long: DirectionBreakdown,
    pub short: DirectionBreakdown,
    pub neutral: DirectionBreakdown,
    pub timeline: Vec<TimelineEntry>,
}

impl PersistedBacktest {
    pub const VERSION: u32 = 1;
}

pub struct BacktestEngine;

impl BacktestEngine {
    /// Replays `candles` through `predict_fn`. `features_fn` maps a window
    /// position to the vector handed to the predictor, so callers can swap
    /// in precomputed features during optimization runs.
    pub fn run<F, P>(
        candles: &[Candle],
        config: &BacktestConfig,
        mut features_fn: F,
        mut predict_fn: P,
    ) -> BacktestResult
    where
        F: FnMut(&[Candle], usize) -> FeatureVector,
        P: FnMut(&FeatureVector) -> Prediction,
    {
        let mut result = BacktestResult::empty();
        if candles.is_empty() {
            return result;
        }

        let last = candles.len() - 1;
        let default_end = last.saturating_sub(config.horizon);
        let end = config.end_index.unwrap_or(default_end).min(last);
        if config.start_index > end {
            return result;
        }

        let mut equity = 0.0;
        // Starts at the flat initial equity so a losing first step already
        // registers as drawdown.
        let mut equity_curve = vec![0.0];
        let mut step_returns = Vec::with_capacity(end - config.start_index + 1);
        let mut timeline: VecDeque<TimelineEntry> = VecDeque::new();

        for index in config.start_index..=end {
            let features = features_fn(candles, index);
            let prediction = predict_fn(&features);

            let entry_price = candles[index].close;
            let exit_index = (index + config.horizon).min(last);
            let exit_price = candles[exit_index].close;
            let realized_pct = if entry_price > 0.0 {
                (exit_price - entry_price) / entry_price * 100.0
            } else {
                0.0
            };

            let actual = classify(realized_pct, config);
            let correct = match prediction.direction {
                Direction::Long => realized_pct >= config.profit_threshold_pct,
                Direction::Short => realized_pct <= config.loss_threshold_pct,
                Direction::Neutral => {
                    realized_pct.abs() < config.profit_threshold_pct.abs()
                        && realized_pct.abs() < config.loss_threshold_pct.abs()
                }
            };

            let step_return = match prediction.direction {
                Direction::Long => realized_pct,
                Direction::Short => -realized_pct,
                Direction::Neutral => 0.0,
            };
            equity += step_return;
            equity_curve.push(equity);
            step_returns.push(step_return);

            if step_return > 0.0 {
                result.wins += 1;
                result.total_win_pct += step_return;
            } else if step_return < 0.0 {
                result.losses += 1;
                result.total_loss_pct += -step_return;
            }

            result.total_evaluated += 1;
            if correct {
                result.correct += 1;
            }
            match prediction.direction {
                Direction::Long => result.long.tally(correct),
                Direction::Short => result.short.tally(correct),
                Direction::Neutral => result.neutral.tally(correct),
            }

            timeline.push_back(TimelineEntry {
                timestamp: candles[index].timestamp,
                predicted: prediction.direction,
                actual,
                correct,
            });
            while timeline.len() > config.timeline_limit {
                timeline.pop_front();
            }
        }

        result.accuracy = if result.total_evaluated > 0 {
            result.correct as f64 / result.total_evaluated as f64
        } else {
            0.0
        };
        let decided = result.wins + result.losses;
        result.win_rate = if decided > 0 {
            result.wins as f64 / decided as f64
        } else {
            0.0
        };
        result.avg_win_pct = if result.wins > 0 {
            result.total_win_pct / result.wins as f64
        } else {
            0.0
        };
        result.avg_loss_pct = if result.losses > 0 {
            result.total_loss_pct / result.losses as f64
        } else {
            0.0
        };
        result.profit_factor = if result.total_loss_pct > 0.0 {
            result.total_win_pct / result.total_loss_pct
        } else if result.total_win_pct > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        result.sharpe_ratio = FloatStats::sharpe_ratio(&step_returns, true);
        result.max_drawdown_pct = FloatStats::max_drawdown(&equity_curve);
        result.final_equity_pct = equity;
        result.timeline = timeline.into_iter().collect();

        debug!(
            "backtest evaluated {} bars: accuracy {:.1}%, equity {:.2}%",
            result.total_evaluated,
            result.accuracy * 100.0,
            result.final_equity_pct
        );
        result
    }
}

fn classify(return_pct: f64, config: &BacktestConfig) -> Direction {
    if return_pct >= config.profit_threshold_pct {
        Direction::Long
    } else if return_pct <= config.loss_threshold_pct {
        Direction::Short
    } else {
        Direction::Neutral
    }
}
