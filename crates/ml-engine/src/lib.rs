//! Feature engineering and the next-day direction classifier.
//!
//! Everything here is synchronous and CPU-bound; tree construction fans out
//! over rayon's pool.

pub mod features;
pub mod forest;
pub mod predictor;
pub mod tree;

pub use features::{
    daily_sentiment, FeatureBuilder, FeatureConfig, FeatureDiagnostics, FeatureSet,
    DEFAULT_SMOOTHING_WINDOW, MAX_SMOOTHING_WINDOW,
};
pub use forest::{balanced_class_weights, ForestConfig, RandomForest};
pub use predictor::{DirectionModel, DirectionPredictor, HOLDOUT_MIN_ROWS, MIN_TRAINING_ROWS};
pub use tree::{DecisionTree, TreeConfig};
