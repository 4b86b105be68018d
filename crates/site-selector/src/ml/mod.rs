//! Small regression models trained in-process
//!
//! Every model is built from a [`ModelKind`] and a seed, so cross-validation
//! can train a fresh, identically seeded copy per fold before the final fit.

use crate::{AnalysisError, Result};
use rand::rngs::SmallRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod cv;
pub mod forest;
pub mod gbm;
pub mod mlp;
pub mod scaler;
pub mod tree;

pub use cv::{cross_val_r2, r2_score, CvReport};
pub use forest::RandomForestRegressor;
pub use gbm::GradientBoostingRegressor;
pub use mlp::MlpRegressor;
pub use scaler::RobustScaler;
pub use tree::{DecisionTreeRegressor, TreeParams};

/// A trainable single-output regressor
pub trait Regressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()>;

    fn predict_one(&self, features: &[f64]) -> f64;

    fn predict(&self, samples: &[Vec<f64>]) -> Vec<f64> {
        samples.iter().map(|s| self.predict_one(s)).collect()
    }
}

/// Members of the ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    NeuralNetwork,
    DecisionTree,
    RandomForest,
    GradientBoosting,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::NeuralNetwork,
        ModelKind::DecisionTree,
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::NeuralNetwork => "neural_network",
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }

    /// Fresh, untrained model with its reference hyperparameters
    pub fn build(&self, seed: u64) -> Box<dyn Regressor> {
        match self {
            ModelKind::NeuralNetwork => Box::new(MlpRegressor::new(mlp::MlpParams::default(), seed)),
            ModelKind::DecisionTree => Box::new(DecisionTreeRegressor::new(TreeParams {
                max_depth: 3,
                min_samples_split: 10,
                min_samples_leaf: 5,
            })),
            ModelKind::RandomForest => Box::new(RandomForestRegressor::new(
                30,
                TreeParams {
                    max_depth: 4,
                    min_samples_split: 10,
                    min_samples_leaf: 1,
                },
                seed,
            )),
            ModelKind::GradientBoosting => Box::new(GradientBoostingRegressor::new(gbm::GbmParams::default(), seed)),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reject empty or ragged training data
pub(crate) fn check_training_data(x: &[Vec<f64>], y: &[f64]) -> Result<usize> {
    if x.is_empty() {
        return Err(AnalysisError::Model("no training samples".into()));
    }
    if x.len() != y.len() {
        return Err(AnalysisError::Model(format!(
            "{} samples but {} targets",
            x.len(),
            y.len()
        )));
    }
    let width = x[0].len();
    if width == 0 || x.iter().any(|row| row.len() != width) {
        return Err(AnalysisError::Model("feature rows must share a non-zero width".into()));
    }
    Ok(width)
}

/// Standard normal draw (Box-Muller)
pub fn standard_normal(rng: &mut SmallRng) -> f64 {
    // u1 in (0, 1] keeps ln finite
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
