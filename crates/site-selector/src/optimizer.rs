//! Category weight optimizer
//!
//! Searches weight vectors that separate the two cities while discouraging
//! lopsided weights:
//!
//! ```text
//! maximize  |Σ wᵢ·aᵢ − Σ wᵢ·bᵢ| − λ·std(w)
//! subject to Σ wᵢ = 1,  lo ≤ wᵢ ≤ hi
//! ```
//!
//! Differential evolution (best/1/bin, dithered mutation, Latin-hypercube
//! start) explores the box `[lo, hi]ⁿ`; every candidate is mapped onto the
//! feasible set by normalizing and projecting onto the bounded simplex before
//! it is evaluated, so evaluated and returned weights always satisfy the
//! constraints.

use crate::config::OptimizerConfig;
use crate::scoring::{Category, ScoreTable};
use crate::{population_std, CityPair};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom as _;
use rand::{Rng, SeedableRng};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{debug, info};

const PROJECTION_ITERATIONS: usize = 200;

/// One weight per category, in [`Category::ALL`] order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryWeights([f64; Category::COUNT]);

impl CategoryWeights {
    pub fn new(weights: [f64; Category::COUNT]) -> Self {
        Self(weights)
    }

    pub fn uniform() -> Self {
        Self([1.0 / Category::COUNT as f64; Category::COUNT])
    }

    pub fn get(&self, category: Category) -> f64 {
        self.0[category.index()]
    }

    pub fn as_array(&self) -> &[f64; Category::COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        Category::ALL.iter().map(move |c| (*c, self.get(*c)))
    }

    /// Categories sorted by descending weight (stable on ties)
    pub fn ranked(&self) -> Vec<(Category, f64)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Weighted sum of the category scores for each city
    pub fn combine(&self, table: &ScoreTable) -> CityPair<f64> {
        CityPair::from_fn(|city| {
            table
                .iter()
                .zip(self.0.iter())
                .map(|(scores, w)| w * scores.get(city))
                .sum()
        })
    }
}

impl Serialize for CategoryWeights {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Category::COUNT))?;
        for (category, weight) in self.iter() {
            map.serialize_entry(category.key(), &weight)?;
        }
        map.end()
    }
}

/// Optimized weights plus search diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub weights: CategoryWeights,
    pub final_scores: CityPair<f64>,
    /// Objective value at the returned weights (the quantity maximized)
    pub objective: f64,
    pub generations: usize,
    pub evaluations: usize,
    pub converged: bool,
}

/// Euclidean projection of `v` onto `{w : Σw = 1, lo ≤ wᵢ ≤ hi}`
///
/// Finds τ with `Σ clamp(vᵢ − τ, lo, hi) = 1` by bisection. Requires
/// `n·lo ≤ 1 ≤ n·hi`.
pub fn project_to_bounded_simplex(v: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    let total = |tau: f64| v.iter().map(|x| (x - tau).clamp(lo, hi)).sum::<f64>();
    let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = v.iter().copied().fold(f64::INFINITY, f64::min);

    // total(low) = n·hi ≥ 1, total(high) = n·lo ≤ 1
    let mut low = min - hi;
    let mut high = max - lo;
    for _ in 0..PROJECTION_ITERATIONS {
        let mid = 0.5 * (low + high);
        if total(mid) > 1.0 {
            low = mid;
        } else {
            high = mid;
        }
        if high - low < 1e-16 {
            break;
        }
    }
    let tau = 0.5 * (low + high);
    v.iter().map(|x| (x - tau).clamp(lo, hi)).collect()
}

pub struct WeightOptimizer {
    config: OptimizerConfig,
}

impl WeightOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Map a raw candidate onto the feasible weight set
    pub fn feasible(&self, raw: &[f64]) -> CategoryWeights {
        let sum: f64 = raw.iter().sum();
        let normalized: Vec<f64> = if sum > 0.0 {
            raw.iter().map(|x| x / sum).collect()
        } else {
            vec![1.0 / raw.len() as f64; raw.len()]
        };
        let projected = project_to_bounded_simplex(&normalized, self.config.min_weight, self.config.max_weight);
        let mut weights = [0.0; Category::COUNT];
        weights.copy_from_slice(&projected);
        CategoryWeights(weights)
    }

    /// Negated objective: lower is better
    fn energy(&self, table: &ScoreTable, weights: &CategoryWeights) -> f64 {
        let scores = weights.combine(table);
        -(scores.gap() - self.config.balance_penalty * population_std(weights.as_array()))
    }

    pub fn optimize(&self, table: &ScoreTable) -> OptimizationResult {
        let cfg = &self.config;
        let dims = Category::COUNT;
        let (lo, hi) = (cfg.min_weight, cfg.max_weight);
        let pop_size = (cfg.population_multiplier * dims).max(5);
        let mut rng = SmallRng::seed_from_u64(cfg.seed);

        // Unit-cube population, scaled to [lo, hi] on evaluation
        let mut population = latin_hypercube(&mut rng, pop_size, dims);
        let to_box = |unit: &[f64]| -> Vec<f64> { unit.iter().map(|u| lo + u * (hi - lo)).collect() };

        let mut evaluations = 0;
        let mut energies: Vec<f64> = population
            .iter()
            .map(|member| {
                evaluations += 1;
                self.energy(table, &self.feasible(&to_box(member.as_slice())))
            })
            .collect();
        let mut best = argmin(&energies);

        let mut generations = 0;
        let mut converged = false;
        while generations < cfg.max_generations {
            generations += 1;
            let scale = rng.gen_range(cfg.mutation.0..=cfg.mutation.1);

            for i in 0..pop_size {
                let (r0, r1) = two_distinct_others(&mut rng, pop_size, i);
                let fill_point = rng.gen_range(0..dims);
                let mut trial = population[i].clone();
                for j in 0..dims {
                    if j == fill_point || rng.gen::<f64>() < cfg.recombination {
                        trial[j] = population[best][j] + scale * (population[r0][j] - population[r1][j]);
                    }
                }
                for t in trial.iter_mut() {
                    if !(0.0..=1.0).contains(t) {
                        *t = rng.gen::<f64>();
                    }
                }

                let energy = self.energy(table, &self.feasible(&to_box(&trial[..])));
                evaluations += 1;
                if energy <= energies[i] {
                    population[i] = trial;
                    energies[i] = energy;
                    if energy < energies[best] {
                        best = i;
                    }
                }
            }

            let spread = population_std(&energies);
            let centre = crate::mean(&energies).abs();
            debug!(
                "   generation {}: best {:.6}, spread {:.2e}",
                generations, -energies[best], spread
            );
            if spread <= cfg.atol + cfg.tol * centre {
                converged = true;
                break;
            }
        }

        let weights = self.feasible(&to_box(&population[best][..]));
        let final_scores = weights.combine(table);
        let objective = -self.energy(table, &weights);

        info!(
            "   Weights found after {} generations ({} evaluations, converged: {})",
            generations, evaluations, converged
        );
        for (category, weight) in weights.iter() {
            info!("      {}: {:.1}%", category, weight * 100.0);
        }

        OptimizationResult {
            weights,
            final_scores,
            objective,
            generations,
            evaluations,
            converged,
        }
    }
}

/// One point per stratum in every dimension, strata shuffled per column
fn latin_hypercube(rng: &mut SmallRng, n: usize, dims: usize) -> Vec<Vec<f64>> {
    let segment = 1.0 / n as f64;
    let mut points: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..dims).map(|_| segment * (i as f64 + rng.gen::<f64>())).collect())
        .collect();
    for j in 0..dims {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);
        let column: Vec<f64> = order.iter().map(|&i| points[i][j]).collect();
        for (point, value) in points.iter_mut().zip(column) {
            point[j] = value;
        }
    }
    points
}

fn two_distinct_others(rng: &mut SmallRng, n: usize, exclude: usize) -> (usize, usize) {
    let pick = |rng: &mut SmallRng, taken: &[usize]| loop {
        let k = rng.gen_range(0..n);
        if !taken.contains(&k) {
            return k;
        }
    };
    let r0 = pick(rng, &[exclude]);
    let r1 = pick(rng, &[exclude, r0]);
    (r0, r1)
}

fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(bi, bv), (i, &v)| if v < bv { (i, v) } else { (bi, bv) })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;

    /// Only logistics tells the cities apart
    fn table() -> ScoreTable {
        [
            CityPair::new(0.50, 0.50),
            CityPair::new(0.95, 0.20),
            CityPair::new(0.60, 0.60),
            CityPair::new(0.70, 0.70),
        ]
    }

    fn assert_feasible(weights: &CategoryWeights) {
        let sum: f64 = weights.as_array().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "sum {}", sum);
        for w in weights.as_array() {
            assert!(*w >= 0.15 - 1e-12 && *w <= 0.40 + 1e-12, "weight {}", w);
        }
    }

    #[test]
    fn test_latin_hypercube_covers_every_stratum() {
        let mut rng = SmallRng::seed_from_u64(7);
        let n = 20;
        let points = latin_hypercube(&mut rng, n, 4);
        assert_eq!(points.len(), n);
        for j in 0..4 {
            let mut strata: Vec<usize> = points.iter().map(|p| (p[j] * n as f64) as usize).collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_projection_respects_bounds() {
        let projected = project_to_bounded_simplex(&[0.47, 0.176, 0.176, 0.176], 0.15, 0.40);
        assert!((projected[0] - 0.40).abs() < 1e-9);
        assert!((projected.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((projected[1] - 0.2).abs() < 1e-9);

        // Already feasible points are unchanged
        let inside = project_to_bounded_simplex(&[0.3, 0.2, 0.25, 0.25], 0.15, 0.40);
        for (a, b) in inside.iter().zip([0.3, 0.2, 0.25, 0.25]) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_feasible_normalizes_then_projects() {
        let optimizer = WeightOptimizer::new(OptimizerConfig::default());
        let w = optimizer.feasible(&[0.40, 0.15, 0.15, 0.15]);
        assert_feasible(&w);
        assert!((w.get(Category::Cost) - 0.40).abs() < 1e-9);
    }

    #[test]
    fn test_optimize_returns_feasible_weights() {
        let optimizer = WeightOptimizer::new(OptimizerConfig::default());
        let result = optimizer.optimize(&table());
        assert_feasible(&result.weights);
        assert!(result.generations >= 1 && result.generations <= 200);

        assert_eq!(result.weights.ranked()[0].0, Category::Logistics);
        assert!(result.weights.get(Category::Logistics) > 0.35);
        // Uniform weights score exactly their gap (zero spread)
        let uniform = CategoryWeights::uniform().combine(&table());
        assert!(result.objective > uniform.gap());
        assert!((result.final_scores.gap() - 0.75 * result.weights.get(Category::Logistics)).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_weights() {
        let optimizer = WeightOptimizer::new(OptimizerConfig::default());
        let a = optimizer.optimize(&table());
        let b = optimizer.optimize(&table());
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.evaluations, b.evaluations);
    }

    #[test]
    fn test_identical_cities_prefer_uniform_weights() {
        let optimizer = WeightOptimizer::new(OptimizerConfig::default());
        let flat = [CityPair::new(0.5, 0.5); Category::COUNT];
        let result = optimizer.optimize(&flat);
        assert_eq!(result.final_scores.gap(), 0.0);
        let spread = population_std(result.weights.as_array());
        assert!(spread < 0.05, "spread {}", spread);
    }

    #[test]
    fn test_weights_serialize_by_category_key() {
        let json = serde_json::to_value(CategoryWeights::uniform()).unwrap();
        assert_eq!(json["cost_economics"], 0.25);
        assert_eq!(json["ml_ensemble"], 0.25);
    }
}
