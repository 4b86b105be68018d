//! Gradient boosting with squared-error loss
//!
//! ```text
//! F₀ = mean(y)
//! Fₘ = Fₘ₋₁ + η · treeₘ(residuals on a random subsample)
//! ```

use super::tree::{DecisionTreeRegressor, TreeParams};
use super::{check_training_data, Regressor};
use crate::{mean, Result};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom as _;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GbmParams {
    pub n_stages: usize,
    pub learning_rate: f64,
    /// Fraction of samples drawn (without replacement) per stage
    pub subsample: f64,
    pub tree: TreeParams,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_stages: 30,
            learning_rate: 0.100000000,
            subsample: 0.800000000,
            tree: TreeParams {
                max_depth: 3,
                min_samples_split: 2,
                min_samples_leaf: 1,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoostingRegressor {
    params: GbmParams,
    seed: u64,
    init: f64,
    stages: Vec<DecisionTreeRegressor>,
}

impl GradientBoostingRegressor {
    pub fn new(params: GbmParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            init: 0.0,
            stages: Vec::new(),
        }
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        check_training_data(x, y)?;
        let n = x.len();
        let in_bag = ((self.params.subsample * n as f64) as usize).clamp(1, n);
        let mut rng = SmallRng::seed_from_u64(self.seed);

        self.init = mean(y);
        self.stages.clear();
        let mut fitted = vec![self.init; n];

        for _ in 0..self.params.n_stages {
            let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(t, f)| t - f).collect();
            let mut sample: Vec<usize> = (0..n).collect();
            sample.shuffle(&mut rng);
            sample.truncate(in_bag);

            let mut tree = DecisionTreeRegressor::new(self.params.tree);
            tree.fit_indices(x, &residuals, sample);
            for (f, row) in fitted.iter_mut().zip(x) {
                *f += self.params.learning_rate * tree.predict_one(row);
            }
            self.stages.push(tree);
        }
        Ok(())
    }

    fn predict_one(&self, features: &[f64]) -> f64 {
        self.init
            + self
                .stages
                .iter()
                .map(|t| self.params.learning_rate * t.predict_one(features))
                .sum::<f64>()
    }
}
