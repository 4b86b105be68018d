//! Multi-layer perceptron regressor
//!
//! ReLU hidden layers, identity output, squared-error loss with L2 penalty,
//! trained by mini-batch Adam. With early stopping a validation split is held
//! out and the weights with the best validation R² are kept.

use super::{check_training_data, cv::r2_score, Regressor};
use crate::Result;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom as _;
use rand::{Rng, SeedableRng};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct MlpParams {
    pub hidden_layers: Vec<usize>,
    /// L2 penalty
    pub alpha: f64,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    pub early_stopping: bool,
    pub validation_fraction: f64,
    /// Epochs without `tol` improvement before stopping
    pub n_iter_no_change: usize,
    pub tol: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layers: vec![15, 10],
            alpha: 0.100000000,
            learning_rate: 0.001000000,
            max_epochs: 1500,
            batch_size: 200,
            early_stopping: true,
            validation_fraction: 0.200000000,
            n_iter_no_change: 10,
            tol: 0.000100000,
            beta1: 0.900000000,
            beta2: 0.999000000,
            epsilon: 1e-8,
        }
    }
}

/// Dense layer, weights stored row-major as `[out][in]`
#[derive(Debug, Clone)]
struct Layer {
    n_in: usize,
    n_out: usize,
    weights: Vec<f64>,
    biases: Vec<f64>,
}

impl Layer {
    /// Glorot uniform initialization
    fn init(n_in: usize, n_out: usize, rng: &mut SmallRng) -> Self {
        let bound = (6.0 / (n_in + n_out) as f64).sqrt();
        let mut draw = || rng.gen_range(-bound..bound);
        let weights = (0..n_in * n_out).map(|_| draw()).collect();
        let biases = (0..n_out).map(|_| draw()).collect();
        Self {
            n_in,
            n_out,
            weights,
            biases,
        }
    }

    fn forward(&self, input: &[f64], relu: bool) -> Vec<f64> {
        (0..self.n_out)
            .map(|o| {
                let row = &self.weights[o * self.n_in..(o + 1) * self.n_in];
                let z = self.biases[o] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>();
                if relu {
                    z.max(0.0)
                } else {
                    z
                }
            })
            .collect()
    }

    fn param_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

#[derive(Debug, Clone)]
pub struct MlpRegressor {
    params: MlpParams,
    seed: u64,
    layers: Vec<Layer>,
    epochs_run: usize,
    best_validation_r2: Option<f64>,
}

impl MlpRegressor {
    pub fn new(params: MlpParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            layers: Vec::new(),
            epochs_run: 0,
            best_validation_r2: None,
        }
    }

    pub fn epochs_run(&self) -> usize {
        self.epochs_run
    }

    pub fn best_validation_r2(&self) -> Option<f64> {
        self.best_validation_r2
    }

    /// Activations of every layer, input included
    fn forward_all(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let mut acts = Vec::with_capacity(self.layers.len() + 1);
        acts.push(input.to_vec());
        for (i, layer) in self.layers.iter().enumerate() {
            let relu = i + 1 < self.layers.len();
            let next = layer.forward(&acts[i], relu);
            acts.push(next);
        }
        acts
    }

    fn param_count(&self) -> usize {
        self.layers.iter().map(Layer::param_count).sum()
    }

    fn params_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.layers
            .iter_mut()
            .flat_map(|l| l.weights.iter_mut().chain(l.biases.iter_mut()))
    }

    /// Gradient of the penalized loss over one batch, flattened in parameter order
    fn batch_gradient(&self, x: &[Vec<f64>], y: &[f64], batch: &[usize]) -> Vec<f64> {
        let mut grads: Vec<(Vec<f64>, Vec<f64>)> = self
            .layers
            .iter()
            .map(|l| (vec![0.0; l.weights.len()], vec![0.0; l.biases.len()]))
            .collect();

        for &s in batch {
            let acts = self.forward_all(&x[s]);
            let output = acts[acts.len() - 1][0];
            let mut delta = vec![output - y[s]];

            for l in (0..self.layers.len()).rev() {
                let layer = &self.layers[l];
                let input = &acts[l];
                let (gw, gb) = &mut grads[l];
                for o in 0..layer.n_out {
                    gb[o] += delta[o];
                    for i in 0..layer.n_in {
                        gw[o * layer.n_in + i] += delta[o] * input[i];
                    }
                }
                if l > 0 {
                    delta = (0..layer.n_in)
                        .map(|i| {
                            if input[i] <= 0.0 {
                                return 0.0;
                            }
                            (0..layer.n_out).map(|o| delta[o] * layer.weights[o * layer.n_in + i]).sum()
                        })
                        .collect();
                }
            }
        }

        let n = batch.len() as f64;
        let alpha = self.params.alpha;
        self.layers
            .iter()
            .zip(grads)
            .flat_map(|(layer, (gw, gb))| {
                let weights = gw
                    .into_iter()
                    .zip(&layer.weights)
                    .map(move |(g, w)| (g + alpha * w) / n)
                    .collect::<Vec<_>>();
                let biases = gb.into_iter().map(move |g| g / n).collect::<Vec<_>>();
                weights.into_iter().chain(biases)
            })
            .collect()
    }

    fn loss(&self, x: &[Vec<f64>], y: &[f64], rows: &[usize]) -> f64 {
        let n = rows.len().max(1) as f64;
        let sse: f64 = rows.iter().map(|&s| (self.predict_one(&x[s]) - y[s]).powi(2)).sum();
        let l2: f64 = self
            .layers
            .iter()
            .flat_map(|l| l.weights.iter())
            .map(|w| w * w)
            .sum();
        0.5 * sse / n + 0.5 * self.params.alpha * l2 / n
    }
}

impl Regressor for MlpRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let n_features = check_training_data(x, y)?;
        let mut rng = SmallRng::seed_from_u64(self.seed);

        let mut sizes = vec![n_features];
        sizes.extend(self.params.hidden_layers.iter().copied());
        sizes.push(1);
        self.layers = sizes.windows(2).map(|w| Layer::init(w[0], w[1], &mut rng)).collect();

        // Hold out a shuffled validation split
        let n = x.len();
        let n_val = (self.params.validation_fraction * n as f64).ceil() as usize;
        let early_stopping = self.params.early_stopping && n_val >= 1 && n_val < n;
        let (train, val) = if early_stopping {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(&mut rng);
            let (val, train) = order.split_at(n_val);
            (train.to_vec(), val.to_vec())
        } else {
            ((0..n).collect::<Vec<_>>(), Vec::new())
        };
        let val_y: Vec<f64> = val.iter().map(|&i| y[i]).collect();

        let batch_size = self.params.batch_size.clamp(1, train.len());
        let mut m = vec![0.0; self.param_count()];
        let mut v = vec![0.0; self.param_count()];
        let mut step = 0i32;

        let mut best_score = f64::NEG_INFINITY;
        let mut best_loss = f64::INFINITY;
        let mut best_layers = self.layers.clone();
        let mut no_improvement = 0;
        self.epochs_run = 0;

        for epoch in 0..self.params.max_epochs {
            let mut order = train.clone();
            order.shuffle(&mut rng);

            for batch in order.chunks(batch_size) {
                let grad = self.batch_gradient(x, y, batch);
                step += 1;
                let p = &self.params;
                let lr = p.learning_rate * (1.0 - p.beta2.powi(step)).sqrt() / (1.0 - p.beta1.powi(step));
                let (beta1, beta2, eps) = (p.beta1, p.beta2, p.epsilon);
                for (k, param) in self.params_mut().enumerate() {
                    m[k] = beta1 * m[k] + (1.0 - beta1) * grad[k];
                    v[k] = beta2 * v[k] + (1.0 - beta2) * grad[k] * grad[k];
                    *param -= lr * m[k] / (v[k].sqrt() + eps);
                }
            }
            self.epochs_run = epoch + 1;

            if early_stopping {
                let preds: Vec<f64> = val.iter().map(|&i| self.predict_one(&x[i])).collect();
                let score = r2_score(&val_y, &preds);
                if score < best_score + self.params.tol {
                    no_improvement += 1;
                } else {
                    no_improvement = 0;
                }
                if score > best_score {
                    best_score = score;
                    best_layers = self.layers.clone();
                }
            } else {
                let loss = self.loss(x, y, &train);
                if loss > best_loss - self.params.tol {
                    no_improvement += 1;
                } else {
                    no_improvement = 0;
                }
                best_loss = best_loss.min(loss);
            }

            if no_improvement > self.params.n_iter_no_change {
                debug!("MLP stopped after {} epochs", self.epochs_run);
                break;
            }
        }

        if early_stopping {
            self.layers = best_layers;
            self.best_validation_r2 = Some(best_score);
        }
        Ok(())
    }

    fn predict_one(&self, features: &[f64]) -> f64 {
        let mut acts = features.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            acts = layer.forward(&acts, i + 1 < self.layers.len());
        }
        acts.first().copied().unwrap_or(0.0)
    }
}
