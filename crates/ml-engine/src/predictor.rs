use analysis_core::{AnalysisError, DirectionCall};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::features::FeatureSet;
use crate::forest::{ForestConfig, RandomForest};

pub const MIN_TRAINING_ROWS: usize = 5;
/// Below this many rows every row is used for fitting and no holdout is scored.
pub const HOLDOUT_MIN_ROWS: usize = 20;
pub const HOLDOUT_FRACTION: f64 = 0.2;

/// Trained next-day direction classifier.
#[derive(Debug, Clone)]
pub struct DirectionModel {
    forest: RandomForest,
    holdout_accuracy: Option<f64>,
    training_rows: usize,
}

impl DirectionModel {
    /// Accuracy on the stratified holdout, when one was drawn.
    pub fn holdout_accuracy(&self) -> Option<f64> {
        self.holdout_accuracy
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    pub fn n_features(&self) -> usize {
        self.forest.n_features()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectionPredictor {
    config: ForestConfig,
}

impl DirectionPredictor {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn train(&self, features: &[Vec<f64>], targets: &[bool]) -> Result<DirectionModel, AnalysisError> {
        if features.len() != targets.len() {
            return Err(AnalysisError::AlignmentError(format!(
                "{} feature rows for {} targets",
                features.len(),
                targets.len()
            )));
        }
        if features.len() < MIN_TRAINING_ROWS {
            return Err(AnalysisError::InsufficientData(format!(
                "need at least {} labeled rows to train, got {}",
                MIN_TRAINING_ROWS,
                features.len()
            )));
        }

        let holdout_accuracy = if features.len() >= HOLDOUT_MIN_ROWS {
            Some(self.holdout_accuracy(features, targets)?)
        } else {
            None
        };

        let forest = RandomForest::fit(&self.config, features, targets)?;
        Ok(DirectionModel {
            forest,
            holdout_accuracy,
            training_rows: features.len(),
        })
    }

    pub fn predict(&self, model: &DirectionModel, row: &[f64]) -> Result<DirectionCall, AnalysisError> {
        if row.is_empty() {
            return Err(AnalysisError::InvalidInput("empty feature row".to_string()));
        }
        let probs = model.forest.predict_proba(row)?;
        Ok(call_from_probs(probs))
    }

    /// Train on the labeled rows of `set` and predict its unlabeled last row.
    pub fn forecast(&self, set: &FeatureSet) -> Result<(DirectionModel, DirectionCall), AnalysisError> {
        let (features, targets) = set.training_data();
        let latest = set.prediction_row().ok_or_else(|| {
            AnalysisError::AlignmentError("feature set has no unlabeled row".to_string())
        })?;

        let model = self.train(&features, &targets)?;
        let call = self.predict(&model, &latest.features)?;
        tracing::debug!(
            "Next-day call for {}: {} ({:.3})",
            latest.date,
            if call.direction { "up" } else { "down" },
            call.confidence
        );
        Ok((model, call))
    }

    fn holdout_accuracy(&self, features: &[Vec<f64>], targets: &[bool]) -> Result<f64, AnalysisError> {
        let (train_idx, test_idx) = stratified_split(targets, HOLDOUT_FRACTION, self.config.seed);

        let train_x: Vec<Vec<f64>> = train_idx.iter().map(|&i| features[i].clone()).collect();
        let train_y: Vec<bool> = train_idx.iter().map(|&i| targets[i]).collect();
        let forest = RandomForest::fit(&self.config, &train_x, &train_y)?;

        let mut correct = 0usize;
        for &i in &test_idx {
            if call_from_probs(forest.predict_proba(&features[i])?).direction == targets[i] {
                correct += 1;
            }
        }
        let accuracy = if test_idx.is_empty() {
            0.0
        } else {
            correct as f64 / test_idx.len() as f64
        };

        tracing::info!(
            "Holdout accuracy {:.3} ({} of {} rows held out)",
            accuracy,
            test_idx.len(),
            targets.len()
        );
        Ok(accuracy)
    }
}

/// Ties go to "down".
fn call_from_probs(probs: [f64; 2]) -> DirectionCall {
    let direction = probs[1] > probs[0];
    DirectionCall {
        direction,
        confidence: probs[0].max(probs[1]),
    }
}

/// Split row indices so each class contributes its share of the test set.
/// A class always keeps at least one row for training.
fn stratified_split(targets: &[bool], fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let n = targets.len();
    let n_test = (n as f64 * fraction).ceil() as usize;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut train = Vec::with_capacity(n);
    let mut test = Vec::with_capacity(n_test);

    for class in [false, true] {
        let mut members: Vec<usize> = (0..n).filter(|&i| targets[i] == class).collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);

        let share = (n_test as f64 * members.len() as f64 / n as f64).round() as usize;
        let share = share.min(members.len() - 1);
        test.extend_from_slice(&members[..share]);
        train.extend_from_slice(&members[share..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}
