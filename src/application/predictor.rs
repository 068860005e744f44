//! Feed-forward classifier with manual backpropagation.
//!
//! Fixed 20 -> 64 -> 32 -> 3 topology over explicit layer matrices. The
//! softmax output ranks LONG / SHORT / NEUTRAL; training is single-example
//! online gradient descent with the combined softmax + cross-entropy
//! gradient seeded as (predicted - target).

use crate::domain::direction::Direction;
use crate::domain::errors::SnapshotError;
use crate::domain::features::{FEATURE_COUNT, FeatureNormalizer, FeatureVector};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

pub const INPUT_SIZE: usize = FEATURE_COUNT;
pub const HIDDEN1_SIZE: usize = 64;
pub const HIDDEN2_SIZE: usize = 32;
pub const OUTPUT_SIZE: usize = 3;

const LOSS_EPSILON: f64 = 1e-12;

/// The network's entire mutable state: weights, biases, and training
/// bookkeeping. Matrices are row-major, one row per output neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightState {
    pub w1: Vec<Vec<f64>>,
    pub b1: Vec<f64>,
    pub w2: Vec<Vec<f64>>,
    pub b2: Vec<f64>,
    pub w3: Vec<Vec<f64>>,
    pub b3: Vec<f64>,
    pub epochs: u64,
    pub last_loss: f64,
    pub updated_at: DateTime<Utc>,
}

impl WeightState {
    /// Fresh Xavier/Glorot-initialized state: Gaussian weights with
    /// sigma = sqrt(2 / (fan_in + fan_out)) per layer, zero biases.
    pub fn initialize() -> Self {
        Self::initialize_with(&mut rand::rng())
    }

    pub fn initialize_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let (w1, b1) = Self::layer(&mut *rng, INPUT_SIZE, HIDDEN1_SIZE);
        let (w2, b2) = Self::layer(&mut *rng, HIDDEN1_SIZE, HIDDEN2_SIZE);
        let (w3, b3) = Self::layer(&mut *rng, HIDDEN2_SIZE, OUTPUT_SIZE);
        Self {
            w1,
            b1,
            w2,
            b2,
            w3,
            b3,
            epochs: 0,
            last_loss: 0.0,
            updated_at: Utc::now(),
        }
    }

    fn layer<R: Rng + ?Sized>(
        rng: &mut R,
        fan_in: usize,
        fan_out: usize,
    ) -> (Vec<Vec<f64>>, Vec<f64>) {
        let std_dev = (2.0 / (fan_in + fan_out) as f64).sqrt();
        let normal = Normal::new(0.0, std_dev).unwrap();
        let mut weights = Vec::with_capacity(fan_out);
        for _ in 0..fan_out {
            let mut row = Vec::with_capacity(fan_in);
            for _ in 0..fan_in {
                row.push(normal.sample(&mut *rng));
            }
            weights.push(row);
        }
        (weights, vec![0.0; fan_out])
    }

    /// Whether the matrices match the fixed topology. Snapshots failing this
    /// check are rejected at decode time.
    pub fn dimensions_valid(&self) -> bool {
        let matrix_ok = |m: &[Vec<f64>], rows: usize, cols: usize| {
            m.len() == rows && m.iter().all(|row| row.len() == cols)
        };
        matrix_ok(&self.w1, HIDDEN1_SIZE, INPUT_SIZE)
            && self.b1.len() == HIDDEN1_SIZE
            && matrix_ok(&self.w2, HIDDEN2_SIZE, HIDDEN1_SIZE)
            && self.b2.len() == HIDDEN2_SIZE
            && matrix_ok(&self.w3, OUTPUT_SIZE, HIDDEN2_SIZE)
            && self.b3.len() == OUTPUT_SIZE
    }
}

/// Versioned persistence envelope for [`WeightState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub version: u32,
    pub state: WeightState,
}

impl WeightSnapshot {
    pub const VERSION: u32 = 1;

    pub fn encode(state: &WeightState) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&Self {
            version: Self::VERSION,
            state: state.clone(),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<WeightState, SnapshotError> {
        let snapshot: WeightSnapshot = serde_json::from_slice(bytes)?;
        if snapshot.version != Self::VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                expected: Self::VERSION,
            });
        }
        if !snapshot.state.dimensions_valid() {
            return Err(SnapshotError::ShapeMismatch);
        }
        Ok(snapshot.state)
    }
}

/// One classifier output: the argmax class, its probability, and the full
/// distribution for callers that want the raw signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub direction: Direction,
    pub confidence: f64,
    pub class_probabilities: [f64; OUTPUT_SIZE],
}

struct ForwardPass {
    input: [f64; INPUT_SIZE],
    z1: Vec<f64>,
    a1: Vec<f64>,
    z2: Vec<f64>,
    a2: Vec<f64>,
    probs: [f64; OUTPUT_SIZE],
}

pub struct Predictor {
    state: WeightState,
    normalizer: FeatureNormalizer,
    learning_rate: f64,
}

impl Predictor {
    pub fn new(normalizer: FeatureNormalizer, learning_rate: f64) -> Self {
        Self {
            state: WeightState::initialize(),
            normalizer,
            learning_rate,
        }
    }

    pub fn with_state(state: WeightState, normalizer: FeatureNormalizer, learning_rate: f64) -> Self {
        Self {
            state,
            normalizer,
            learning_rate,
        }
    }

    pub fn state(&self) -> &WeightState {
        &self.state
    }

    pub fn replace_state(&mut self, state: WeightState) {
        self.state = state;
    }

    pub fn reset(&mut self) {
        self.state = WeightState::initialize();
    }

    /// Pure forward inference. Repeated calls without an intervening
    /// [`Predictor::train`] return bit-identical probabilities.
    pub fn predict(&self, features: &FeatureVector) -> Prediction {
        let pass = self.forward(features);
        let mut best = 0;
        for (index, prob) in pass.probs.iter().enumerate() {
            if *prob > pass.probs[best] {
                best = index;
            }
        }
        Prediction {
            direction: Direction::from_class_index(best),
            confidence: pass.probs[best],
            class_probabilities: pass.probs,
        }
    }

    /// Cross-entropy loss of a forward pass against `actual`, without
    /// touching any weights.
    pub fn evaluate_loss(&self, features: &FeatureVector, actual: Direction) -> f64 {
        let pass = self.forward(features);
        -(pass.probs[actual.class_index()].max(LOSS_EPSILON)).ln()
    }

    /// One online gradient-descent step on a single example. Returns the
    /// cross-entropy loss before the update. This is the sole mutator of
    /// [`WeightState`].
    pub fn train(&mut self, features: &FeatureVector, actual: Direction) -> f64 {
        let pass = self.forward(features);
        let mut target = [0.0; OUTPUT_SIZE];
        target[actual.class_index()] = 1.0;

        let loss = -(pass.probs[actual.class_index()].max(LOSS_EPSILON)).ln();

        // Softmax + cross-entropy collapse to (p - y) at the output layer.
        let delta3: Vec<f64> = pass
            .probs
            .iter()
            .zip(&target)
            .map(|(p, y)| p - y)
            .collect();

        // All deltas come from the pre-update weights.
        let delta2: Vec<f64> = (0..HIDDEN2_SIZE)
            .map(|j| {
                if pass.z2[j] > 0.0 {
                    (0..OUTPUT_SIZE).map(|k| self.state.w3[k][j] * delta3[k]).sum()
                } else {
                    0.0
                }
            })
            .collect();
        let delta1: Vec<f64> = (0..HIDDEN1_SIZE)
            .map(|i| {
                if pass.z1[i] > 0.0 {
                    (0..HIDDEN2_SIZE).map(|j| self.state.w2[j][i] * delta2[j]).sum()
                } else {
                    0.0
                }
            })
            .collect();

        let lr = self.learning_rate;
        for k in 0..OUTPUT_SIZE {
            for j in 0..HIDDEN2_SIZE {
                self.state.w3[k][j] -= lr * delta3[k] * pass.a2[j];
            }
            self.state.b3[k] -= lr * delta3[k];
        }
        for j in 0..HIDDEN2_SIZE {
            for i in 0..HIDDEN1_SIZE {
                self.state.w2[j][i] -= lr * delta2[j] * pass.a1[i];
            }
            self.state.b2[j] -= lr * delta2[j];
        }
        for i in 0..HIDDEN1_SIZE {
            for n in 0..INPUT_SIZE {
                self.state.w1[i][n] -= lr * delta1[i] * pass.input[n];
            }
            self.state.b1[i] -= lr * delta1[i];
        }

        self.state.epochs += 1;
        self.state.last_loss = loss;
        self.state.updated_at = Utc::now();
        loss
    }

    fn forward(&self, features: &FeatureVector) -> ForwardPass {
        let input = self.normalizer.normalize(features);
        let z1 = affine(&self.state.w1, &self.state.b1, &input);
        let a1 = relu(&z1);
        let z2 = affine(&self.state.w2, &self.state.b2, &a1);
        let a2 = relu(&z2);
        let z3 = affine(&self.state.w3, &self.state.b3, &a2);
        let probs = softmax(&z3);
        ForwardPass {
            input,
            z1,
            a1,
            z2,
            a2,
            probs,
        }
    }
}

fn affine(weights: &[Vec<f64>], biases: &[f64], input: &[f64]) -> Vec<f64> {
    weights
        .iter()
        .zip(biases)
        .map(|(row, bias)| {
            row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias
        })
        .collect()
}

fn relu(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v.max(0.0)).collect()
}

/// Max-subtracted softmax; the output always sums to 1.
fn softmax(logits: &[f64]) -> [f64; OUTPUT_SIZE] {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut out = [0.0; OUTPUT_SIZE];
    let mut sum = 0.0;
    for (slot, logit) in out.iter_mut().zip(logits) {
        *slot = (logit - max).exp();
        sum += *slot;
    }
    for slot in out.iter_mut() {
        *slot /= sum;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn seeded_predictor(seed: u64) -> Predictor {
        let mut rng = StdRng::seed_from_u64(seed);
        Predictor::with_state(
            WeightState::initialize_with(&mut rng),
            FeatureNormalizer::default(),
            0.01,
        )
    }

    fn sample_features() -> FeatureVector {
        let values: Vec<f64> = (0..FEATURE_COUNT).map(|i| (i as f64) * 0.37 - 2.0).collect();
        FeatureVector::from_slice(&values)
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let predictor = seeded_predictor(1);
        for scale in [-100.0, -1.0, 0.0, 0.5, 42.0, 1e6] {
            let features = FeatureVector::from_slice(&[scale; FEATURE_COUNT]);
            let prediction = predictor.predict(&features);
            let sum: f64 = prediction.class_probabilities.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "sum was {sum}");
            for p in prediction.class_probabilities {
                assert!((0.0..=1.0).contains(&p));
            }
        }
    }

    #[test]
    fn test_predict_is_deterministic() {
        let predictor = seeded_predictor(2);
        let features = sample_features();
        let first = predictor.predict(&features);
        let second = predictor.predict(&features);
        assert_eq!(first.class_probabilities, second.class_probabilities);
        assert_eq!(first.direction, second.direction);
    }

    #[test]
    fn test_confidence_matches_argmax() {
        let predictor = seeded_predictor(3);
        let prediction = predictor.predict(&sample_features());
        let max = prediction
            .class_probabilities
            .iter()
            .cloned()
            .fold(f64::MIN, f64::max);
        assert_eq!(prediction.confidence, max);
        assert_eq!(
            prediction.class_probabilities[prediction.direction.class_index()],
            max
        );
    }

    #[test]
    fn test_training_raises_target_probability() {
        for target in [Direction::Long, Direction::Short, Direction::Neutral] {
            let mut predictor = seeded_predictor(4);
            let features = sample_features();
            let before = predictor.predict(&features).class_probabilities[target.class_index()];
            predictor.train(&features, target);
            let after = predictor.predict(&features).class_probabilities[target.class_index()];
            assert!(
                after > before,
                "{target}: probability did not rise ({before} -> {after})"
            );
        }
    }

    #[test]
    fn test_training_updates_bookkeeping() {
        let mut predictor = seeded_predictor(5);
        assert_eq!(predictor.state().epochs, 0);
        let loss = predictor.train(&sample_features(), Direction::Long);
        assert!(loss > 0.0);
        assert_eq!(predictor.state().epochs, 1);
        assert_eq!(predictor.state().last_loss, loss);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let features = sample_features();
        let target = Direction::Short;
        let lr = 0.01;
        let epsilon = 1e-6;

        let mut rng = StdRng::seed_from_u64(6);
        let state = WeightState::initialize_with(&mut rng);

        // Analytic gradients recovered from the SGD update: g = (w - w') / lr.
        let mut trained = Predictor::with_state(state.clone(), FeatureNormalizer::default(), lr);
        trained.train(&features, target);

        let spots = [(0usize, 7usize, 3usize), (0, 31, 11), (2, 1, 5), (2, 2, 20)];
        for (layer, row, col) in spots {
            let (old_w, new_w) = match layer {
                0 => (state.w1[row][col], trained.state().w1[row][col]),
                _ => (state.w3[row][col], trained.state().w3[row][col]),
            };
            let analytic = (old_w - new_w) / lr;

            let mut plus = state.clone();
            let mut minus = state.clone();
            match layer {
                0 => {
                    plus.w1[row][col] += epsilon;
                    minus.w1[row][col] -= epsilon;
                }
                _ => {
                    plus.w3[row][col] += epsilon;
                    minus.w3[row][col] -= epsilon;
                }
            }
            let loss_plus = Predictor::with_state(plus, FeatureNormalizer::default(), lr)
                .evaluate_loss(&features, target);
            let loss_minus = Predictor::with_state(minus, FeatureNormalizer::default(), lr)
                .evaluate_loss(&features, target);
            let numeric = (loss_plus - loss_minus) / (2.0 * epsilon);

            assert!(
                (analytic - numeric).abs() < 1e-4,
                "layer {layer} [{row}][{col}]: analytic {analytic} vs numeric {numeric}"
            );
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        let state = WeightState::initialize_with(&mut rng);
        let bytes = WeightSnapshot::encode(&state).unwrap();
        let restored = WeightSnapshot::decode(&bytes).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_snapshot_rejects_wrong_version() {
        let mut rng = StdRng::seed_from_u64(8);
        let state = WeightState::initialize_with(&mut rng);
        let snapshot = WeightSnapshot { version: 99, state };
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        assert!(matches!(
            WeightSnapshot::decode(&bytes),
            Err(SnapshotError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_snapshot_rejects_bad_shape() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut state = WeightState::initialize_with(&mut rng);
        state.w2.pop();
        let bytes = WeightSnapshot::encode(&state).unwrap();
        assert!(matches!(
            WeightSnapshot::decode(&bytes),
            Err(SnapshotError::ShapeMismatch)
        ));
    }

    #[test]
    fn test_malformed_input_still_predicts() {
        let predictor = seeded_predictor(10);
        let garbage = FeatureVector::from_slice(&[f64::NAN, f64::INFINITY, 5.0]);
        let prediction = predictor.predict(&garbage);
        let sum: f64 = prediction.class_probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
