//! Prediction ledger: records every emitted signal and validates it against
//! the price observed later. Validation derives the ground-truth class from
//! fixed percent-return thresholds; incorrect outcomes are the engine's only
//! training trigger.

use crate::domain::direction::Direction;
use crate::domain::errors::SnapshotError;
use crate::domain::features::FeatureVector;
use crate::domain::ledger::{Outcome, PredictionRecord};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 500;

/// What a successful validation produced. `correct == false` is the signal
/// for the engine to run a corrective training step.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub timestamp: i64,
    pub features: FeatureVector,
    pub predicted: Direction,
    pub actual: Direction,
    pub return_pct: f64,
    pub correct: bool,
}

pub struct PredictionLedger {
    records: VecDeque<PredictionRecord>,
    capacity: usize,
    profit_threshold_pct: f64,
    loss_threshold_pct: f64,
}

impl PredictionLedger {
    pub fn new(capacity: usize, profit_threshold_pct: f64, loss_threshold_pct: f64) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.max(1),
            profit_threshold_pct,
            loss_threshold_pct,
        }
    }

    /// Appends a pending record, evicting the oldest entries once capacity
    /// is exceeded. Eviction ignores validation state.
    pub fn record(
        &mut self,
        timestamp: i64,
        features: FeatureVector,
        predicted: Direction,
        confidence: f64,
        price: f64,
    ) {
        self.records.push_back(PredictionRecord::pending(
            timestamp, features, predicted, confidence, price,
        ));
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// Validates the pending record at `timestamp` against the observed
    /// price. Returns `None` when no pending record matches (unknown
    /// timestamp, or already validated); callers treat that as `false`.
    pub fn validate(&mut self, timestamp: i64, observed_price: f64) -> Option<ValidationOutcome> {
        let profit = self.profit_threshold_pct;
        let loss = self.loss_threshold_pct;
        let record = self
            .records
            .iter_mut()
            .find(|r| r.timestamp == timestamp && r.outcome == Outcome::Pending)?;

        let return_pct = if record.price_at_prediction > 0.0 {
            (observed_price - record.price_at_prediction) / record.price_at_prediction * 100.0
        } else {
            0.0
        };
        let actual = classify_return(return_pct, profit, loss);
        let correct = record.predicted == actual;

        record.price_after = Some(observed_price);
        record.return_pct = Some(return_pct);
        record.outcome = if correct {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        };

        Some(ValidationOutcome {
            timestamp,
            features: record.features.clone(),
            predicted: record.predicted,
            actual,
            return_pct,
            correct,
        })
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn pending(&self) -> usize {
        self.records.iter().filter(|r| r.is_pending()).count()
    }

    /// Fraction of validated records marked correct; 0 when nothing has
    /// validated yet.
    pub fn accuracy(&self) -> f64 {
        let mut validated = 0usize;
        let mut correct = 0usize;
        for record in &self.records {
            match record.outcome {
                Outcome::Correct => {
                    validated += 1;
                    correct += 1;
                }
                Outcome::Incorrect => validated += 1,
                Outcome::Pending => {}
            }
        }
        if validated == 0 {
            0.0
        } else {
            correct as f64 / validated as f64
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &PredictionRecord> {
        self.records.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&LedgerSnapshot {
            version: LedgerSnapshot::VERSION,
            records: self.records.iter().cloned().collect(),
        })
    }

    /// Replaces the record set from a snapshot, keeping the newest entries
    /// if the snapshot exceeds the configured capacity.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let snapshot: LedgerSnapshot = serde_json::from_slice(bytes)?;
        if snapshot.version != LedgerSnapshot::VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                expected: LedgerSnapshot::VERSION,
            });
        }
        self.records = snapshot.records.into();
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
        Ok(())
    }
}

fn classify_return(return_pct: f64, profit_threshold: f64, loss_threshold: f64) -> Direction {
    if return_pct >= profit_threshold {
        Direction::Long
    } else if return_pct <= loss_threshold {
        Direction::Short
    } else {
        Direction::Neutral
    }
}

/// Versioned persistence envelope for the ledger's records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub records: Vec<PredictionRecord>,
}

impl LedgerSnapshot {
    pub const VERSION: u32 = 1;
}
