//! Engine facade: one explicitly constructed value wiring the classifier,
//! the prediction ledger, the sentiment scorer, and the backtest harness
//! behind the public operations. Each instance owns its state outright, so
//! callers and tests can run isolated engines side by side.
//!
//! Persistence is best-effort throughout: every mutating operation tries to
//! save through the injected key-value capability, failures are logged and
//! swallowed, and the in-memory state stays authoritative.

use crate::application::backtest::{BacktestConfig, BacktestEngine, BacktestResult};
use crate::application::feature_extractor::FeatureExtractor;
use crate::application::hybrid::{HybridCombiner, HybridPrediction};
use crate::application::ledger::PredictionLedger;
use crate::application::predictor::{Prediction, Predictor, WeightSnapshot};
use crate::application::sentiment_analyzer::SentimentAnalyzer;
use crate::config::EngineConfig;
use crate::domain::candle::Candle;
use crate::domain::direction::Direction;
use crate::domain::features::FeatureVector;
use crate::domain::sentiment::SentimentResult;
use crate::infrastructure::persistence::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const WEIGHTS_KEY: &str = "candlecast/weights";
pub const LEDGER_KEY: &str = "candlecast/ledger";
pub const BACKTEST_KEY: &str = "candlecast/backtest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub epochs: u64,
    pub last_loss: f64,
    pub total_predictions: usize,
    pub pending_predictions: usize,
    /// Accuracy over validated ledger records only.
    pub accuracy: f64,
}

pub struct PredictionEngine {
    config: EngineConfig,
    predictor: Predictor,
    ledger: PredictionLedger,
    sentiment: SentimentAnalyzer,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl PredictionEngine {
    /// Engine with fresh state and no persistence.
    pub fn new(config: EngineConfig) -> Self {
        let predictor = Predictor::new(config.normalizer(), config.learning_rate);
        let ledger = PredictionLedger::new(
            config.ledger_capacity,
            config.profit_threshold_pct,
            config.loss_threshold_pct,
        );
        Self {
            config,
            predictor,
            ledger,
            sentiment: SentimentAnalyzer::new(),
            store: None,
        }
    }

    /// Engine backed by a key-value store. Previously persisted weights and
    /// ledger records are restored best-effort; missing or corrupt data
    /// silently falls back to fresh defaults.
    pub fn with_store(config: EngineConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let mut engine = Self::new(config);
        engine.store = Some(store);
        engine.load_state();
        engine
    }

    /// Forward inference over a raw feature slice. The slice is padded,
    /// truncated, and sanitized to exactly 20 finite slots first, so this
    /// never fails.
    pub fn predict(&self, features: &[f64]) -> Prediction {
        self.predictor.predict(&FeatureVector::from_slice(features))
    }

    /// Extracts features at `index` and predicts in one step. Insufficient
    /// history produces the all-zero vector and a degenerate-but-valid
    /// prediction.
    pub fn predict_at(&self, candles: &[Candle], index: usize) -> Prediction {
        self.predictor.predict(&FeatureExtractor::extract(candles, index))
    }

    /// One supervised training step; returns the cross-entropy loss and
    /// persists the updated weights.
    pub fn train(&mut self, features: &[f64], actual: Direction) -> f64 {
        let loss = self
            .predictor
            .train(&FeatureVector::from_slice(features), actual);
        self.persist_weights();
        loss
    }

    /// Appends a pending ledger record keyed by `timestamp`.
    pub fn record_prediction(
        &mut self,
        timestamp: i64,
        features: &[f64],
        predicted: Direction,
        confidence: f64,
        price: f64,
    ) {
        self.ledger.record(
            timestamp,
            FeatureVector::from_slice(features),
            predicted,
            confidence,
            price,
        );
        self.persist_ledger();
    }

    /// Validates the pending prediction at `timestamp` against the observed
    /// price. Returns false for unknown or already-validated timestamps.
    /// An incorrect outcome immediately trains the classifier on the
    /// derived actual class; this is the engine's only learning trigger.
    /// Correct outcomes are recorded without reinforcement.
    pub fn validate_prediction(&mut self, timestamp: i64, observed_price: f64) -> bool {
        let Some(outcome) = self.ledger.validate(timestamp, observed_price) else {
            return false;
        };
        if outcome.correct {
            debug!(
                "prediction at {} confirmed {} ({:+.2}%)",
                timestamp, outcome.predicted, outcome.return_pct
            );
        } else {
            debug!(
                "prediction at {} was {}, actual {} ({:+.2}%); applying correction",
                timestamp, outcome.predicted, outcome.actual, outcome.return_pct
            );
            self.predictor.train(&outcome.features, outcome.actual);
            self.persist_weights();
        }
        self.persist_ledger();
        true
    }

    pub fn analyze_text(&self, text: &str) -> SentimentResult {
        self.sentiment.analyze_text(text)
    }

    pub fn analyze_texts<S: AsRef<str>>(&self, texts: &[S]) -> SentimentResult {
        self.sentiment.analyze_texts(texts)
    }

    /// Prediction blended with sentiment over the supplied texts. An empty
    /// text list skips the sentiment pass entirely.
    pub fn hybrid_prediction<S: AsRef<str>>(
        &self,
        features: &[f64],
        texts: &[S],
    ) -> HybridPrediction {
        let prediction = self.predict(features);
        let sentiment = if texts.is_empty() {
            None
        } else {
            Some(self.sentiment.analyze_texts(texts))
        };
        HybridCombiner::combine(&prediction, sentiment)
    }

    /// Replays `candles` through this engine's own classifier and persists
    /// the truncated result, replacing any previous one.
    pub fn run_backtest(
        &self,
        candles: &[Candle],
        config: Option<BacktestConfig>,
    ) -> BacktestResult {
        let config = config.unwrap_or(BacktestConfig {
            profit_threshold_pct: self.config.profit_threshold_pct,
            loss_threshold_pct: self.config.loss_threshold_pct,
            ..BacktestConfig::default()
        });
        let predictor = &self.predictor;
        let result = BacktestEngine::run(candles, &config, FeatureExtractor::extract, |features| {
            predictor.predict(features)
        });
        self.persist_backtest(&result);
        result
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            epochs: self.predictor.state().epochs,
            last_loss: self.predictor.state().last_loss,
            total_predictions: self.ledger.total(),
            pending_predictions: self.ledger.pending(),
            accuracy: self.ledger.accuracy(),
        }
    }

    /// Fresh weights and an empty ledger, persisted.
    pub fn reset(&mut self) {
        self.predictor.reset();
        self.ledger.clear();
        self.persist_weights();
        self.persist_ledger();
        info!("engine reset: fresh weights, empty ledger");
    }

    pub fn ledger(&self) -> &PredictionLedger {
        &self.ledger
    }

    fn load_state(&mut self) {
        let Some(store) = self.store.clone() else {
            return;
        };
        match store.get(WEIGHTS_KEY) {
            Ok(Some(bytes)) => match WeightSnapshot::decode(&bytes) {
                Ok(state) => {
                    info!("restored weight state at epoch {}", state.epochs);
                    self.predictor.replace_state(state);
                }
                Err(err) => warn!("stored weights unreadable, starting fresh: {}", err),
            },
            Ok(None) => {}
            Err(err) => warn!("weight load failed, starting fresh: {:#}", err),
        }
        match store.get(LEDGER_KEY) {
            Ok(Some(bytes)) => {
                if let Err(err) = self.ledger.restore(&bytes) {
                    warn!("stored ledger unreadable, starting empty: {}", err);
                } else {
                    info!("restored {} ledger records", self.ledger.total());
                }
            }
            Ok(None) => {}
            Err(err) => warn!("ledger load failed, starting empty: {:#}", err),
        }
    }

    fn persist_weights(&self) {
        let Some(store) = &self.store else { return };
        match WeightSnapshot::encode(self.predictor.state()) {
            Ok(bytes) => {
                if let Err(err) = store.set(WEIGHTS_KEY, &bytes) {
                    warn!("failed to persist weights: {:#}", err);
                }
            }
            Err(err) => warn!("failed to encode weight snapshot: {}", err),
        }
    }

    fn persist_ledger(&self) {
        let Some(store) = &self.store else { return };
        match self.ledger.encode() {
            Ok(bytes) => {
                if let Err(err) = store.set(LEDGER_KEY, &bytes) {
                    warn!("failed to persist ledger: {:#}", err);
                }
            }
            Err(err) => warn!("failed to encode ledger snapshot: {}", err),
        }
    }

    fn persist_backtest(&self, result: &BacktestResult) {
        let Some(store) = &self.store else { return };
        match serde_json::to_vec(&result.to_persisted()) {
            Ok(bytes) => {
                if let Err(err) = store.set(BACKTEST_KEY, &bytes) {
                    warn!("failed to persist backtest result: {:#}", err);
                }
            }
            Err(err) => warn!("failed to encode backtest result: {}", err),
        }
    }
}
