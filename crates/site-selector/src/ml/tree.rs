//! CART regression tree
//!
//! Greedy variance-reduction splits over every feature, stored as an array of
//! nodes. Samples with `x[feature] <= threshold` go left.

use super::{check_training_data, Regressor};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// A node in the tree; leaves have no split feature
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub feature: Option<usize>,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    /// Mean target of the samples reaching this node
    pub value: f64,
    pub samples: usize,
}

impl TreeNode {
    fn leaf(value: f64, samples: usize) -> Self {
        Self {
            feature: None,
            threshold: 0.0,
            left: 0,
            right: 0,
            value,
            samples,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature.is_none()
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct DecisionTreeRegressor {
    params: TreeParams,
    nodes: Vec<TreeNode>,
}

impl DecisionTreeRegressor {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            nodes: Vec::new(),
        }
    }

    /// Fit on the rows selected by `indices` (repeats allowed)
    pub(crate) fn fit_indices(&mut self, x: &[Vec<f64>], y: &[f64], indices: Vec<usize>) {
        self.nodes.clear();
        self.grow(x, y, indices, 0);
    }

    fn grow(&mut self, x: &[Vec<f64>], y: &[f64], idx: Vec<usize>, depth: usize) -> usize {
        let n = idx.len();
        let sum: f64 = idx.iter().map(|&i| y[i]).sum();
        let value = if n > 0 { sum / n as f64 } else { 0.0 };
        let impurity = idx.iter().map(|&i| (y[i] - value).powi(2)).sum::<f64>();

        let node_id = self.nodes.len();
        self.nodes.push(TreeNode::leaf(value, n));

        let splittable = depth < self.params.max_depth
            && n >= self.params.min_samples_split
            && n >= 2 * self.params.min_samples_leaf.max(1)
            && impurity > 1e-12;
        if !splittable {
            return node_id;
        }

        if let Some(split) = self.best_split(x, y, &idx) {
            let left = self.grow(x, y, split.left, depth + 1);
            let right = self.grow(x, y, split.right, depth + 1);
            let node = &mut self.nodes[node_id];
            node.feature = Some(split.feature);
            node.threshold = split.threshold;
            node.left = left;
            node.right = right;
        }
        node_id
    }

    fn best_split(&self, x: &[Vec<f64>], y: &[f64], idx: &[usize]) -> Option<Split> {
        let n = idx.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let width = x[idx[0]].len();
        let mut best: Option<(f64, usize, usize, Vec<usize>)> = None;

        for feature in 0..width {
            let mut sorted = idx.to_vec();
            sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let total_sum: f64 = sorted.iter().map(|&i| y[i]).sum();
            let total_sq: f64 = sorted.iter().map(|&i| y[i] * y[i]).sum();
            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            for k in 1..n {
                let prev = sorted[k - 1];
                left_sum += y[prev];
                left_sq += y[prev] * y[prev];

                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                if x[prev][feature] >= x[sorted[k]][feature] {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / k as f64)
                    + (right_sq - right_sum * right_sum / (n - k) as f64);

                if best.as_ref().map_or(true, |(b, ..)| sse < *b) {
                    best = Some((sse, feature, k, sorted.clone()));
                }
            }
        }

        best.map(|(_, feature, k, sorted)| {
            let lo = x[sorted[k - 1]][feature];
            let hi = x[sorted[k]][feature];
            let mut threshold = (lo + hi) / 2.0;
            if threshold >= hi {
                threshold = lo;
            }
            let (left, right) = sorted.split_at(k);
            Split {
                feature,
                threshold,
                left: left.to_vec(),
                right: right.to_vec(),
            }
        })
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Longest root-to-leaf path, in edges
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], id: usize) -> usize {
            let node = &nodes[id];
            if node.is_leaf() {
                0
            } else {
                1 + walk(nodes, node.left).max(walk(nodes, node.right))
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        check_training_data(x, y)?;
        self.fit_indices(x, y, (0..x.len()).collect());
        Ok(())
    }

    fn predict_one(&self, features: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            let Some(node) = self.nodes.get(id) else {
                return 0.0;
            };
            match node.feature {
                None => return node.value,
                Some(f) => {
                    let v = features.get(f).copied().unwrap_or(0.0);
                    id = if v <= node.threshold { node.left } else { node.right };
                }
            }
        }
    }
}
