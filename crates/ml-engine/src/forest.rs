//! Bagged ensemble of [`DecisionTree`]s.

use analysis_core::AnalysisError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::tree::{ClassProbs, DecisionTree, TreeConfig};

/// Random forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split (floor of sqrt of total if None)
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    /// Tree `i` is seeded with `seed + i`
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 0,
        }
    }
}

/// `w_c = n / (2 * n_c)`, so both classes carry equal total weight.
/// An absent class gets weight 0.
pub fn balanced_class_weights(labels: &[bool]) -> ClassProbs {
    let n = labels.len() as f64;
    let up = labels.iter().filter(|&&l| l).count() as f64;
    let down = n - up;
    let weight = |count: f64| if count > 0.0 { n / (2.0 * count) } else { 0.0 };
    [weight(down), weight(up)]
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    class_weights: ClassProbs,
}

impl RandomForest {
    pub fn fit(
        config: &ForestConfig,
        features: &[Vec<f64>],
        labels: &[bool],
    ) -> Result<Self, AnalysisError> {
        if features.is_empty() {
            return Err(AnalysisError::InsufficientData("no training rows".to_string()));
        }
        if features.len() != labels.len() {
            return Err(AnalysisError::AlignmentError(format!(
                "{} feature rows for {} labels",
                features.len(),
                labels.len()
            )));
        }
        let n_features = features[0].len();
        if n_features == 0 {
            return Err(AnalysisError::InvalidInput("feature rows are empty".to_string()));
        }
        if features.iter().any(|row| row.len() != n_features) {
            return Err(AnalysisError::AlignmentError(
                "feature rows have differing lengths".to_string(),
            ));
        }
        if config.n_trees == 0 {
            return Err(AnalysisError::InvalidInput("forest needs at least one tree".to_string()));
        }

        let class_weights = balanced_class_weights(labels);
        let tree_config = TreeConfig {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: Some(
                config
                    .max_features
                    .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
                    .clamp(1, n_features),
            ),
        };
        let n = features.len();

        // Build trees in parallel; per-tree seeds keep the result independent
        // of scheduling.
        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let samples: Vec<usize> = if config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit(features, labels, &samples, class_weights, &tree_config, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            n_features,
            class_weights,
        })
    }

    /// Mean of the per-tree leaf probabilities.
    pub fn predict_proba(&self, row: &[f64]) -> Result<ClassProbs, AnalysisError> {
        if row.len() != self.n_features {
            return Err(AnalysisError::AlignmentError(format!(
                "model expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }

        let sum = self.trees.iter().fold([0.0, 0.0], |mut acc, tree| {
            let probs = tree.predict_proba(row);
            acc[0] += probs[0];
            acc[1] += probs[1];
            acc
        });
        let n = self.trees.len() as f64;
        Ok([sum[0] / n, sum[1] / n])
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn class_weights(&self) -> ClassProbs {
        self.class_weights
    }
}
