//! Bagged regression trees

use super::tree::{DecisionTreeRegressor, TreeParams};
use super::{check_training_data, Regressor};
use crate::Result;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Averages trees fit on bootstrap resamples; every tree sees all features
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    n_trees: usize,
    params: TreeParams,
    seed: u64,
    trees: Vec<DecisionTreeRegressor>,
}

impl RandomForestRegressor {
    pub fn new(n_trees: usize, params: TreeParams, seed: u64) -> Self {
        Self {
            n_trees,
            params,
            seed,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        check_training_data(x, y)?;
        let n = x.len();
        let mut rng = SmallRng::seed_from_u64(self.seed);

        self.trees = (0..self.n_trees.max(1))
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut tree = DecisionTreeRegressor::new(self.params);
                tree.fit_indices(x, y, bootstrap);
                tree
            })
            .collect();
        Ok(())
    }

    fn predict_one(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict_one(features)).sum::<f64>() / self.trees.len() as f64
    }
}
