//! Analysis configuration
//!
//! Every section has defaults reproducing the reference analysis. A JSON file
//! may override any subset of them:
//!
//! ```json
//! { "optimizer": { "seed": 7 }, "decision": { "tie_threshold": 0.05 } }
//! ```

use crate::scoring::Category;
use crate::{AnalysisError, CityPair, CityProfile, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Default seed for every stochastic component
pub const DEFAULT_SEED: u64 = 42;

/// Density with the best distribution efficiency (inhabitants/km²)
pub const DENSITY_OPTIMUM: f64 = 2000.000000000;

/// Cost sub-score weights (sum = 1.000000000)
pub const W_COST: f64 = 0.300000000;
pub const W_ROI: f64 = 0.250000000;
pub const W_GDP: f64 = 0.150000000;
pub const W_MARKET: f64 = 0.200000000;
pub const W_DENSITY: f64 = 0.100000000;

/// Weight bounds for each decision category
pub const MIN_CATEGORY_WEIGHT: f64 = 0.150000000;
pub const MAX_CATEGORY_WEIGHT: f64 = 0.400000000;

/// Score gap below which the outcome is a technical tie
pub const TIE_THRESHOLD: f64 = 0.030000000;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub cities: CityPair<CityProfile>,
    pub data: DataConfig,
    pub cost: CostConfig,
    pub logistics: LogisticsConfig,
    pub market: MarketConfig,
    pub ensemble: EnsembleConfig,
    pub optimizer: OptimizerConfig,
    pub decision: DecisionConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cities: CityPair::new(
                CityProfile {
                    name: "Recife".to_string(),
                    home_region: "Pernambuco".to_string(),
                },
                CityProfile {
                    name: "Salvador".to_string(),
                    home_region: "Bahia".to_string(),
                },
            ),
            data: DataConfig::default(),
            cost: CostConfig::default(),
            logistics: LogisticsConfig::default(),
            market: MarketConfig::default(),
            ensemble: EnsembleConfig::default(),
            optimizer: OptimizerConfig::default(),
            decision: DecisionConfig::default(),
        }
    }
}

/// Dataset discovery and route cost completion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub costs_file: String,
    pub demographics_file: String,
    pub routes_file: String,
    /// Directories searched, in order, for files given by name only
    pub search_dirs: Vec<PathBuf>,
    pub route_costs: RouteCostModel,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            costs_file: "dataset_custos_imobiliario.csv".to_string(),
            demographics_file: "dataset_demografica_vizinhos_recife_salvador.csv".to_string(),
            routes_file: "dataset_rotas_nordeste.csv".to_string(),
            search_dirs: vec![PathBuf::from("."), PathBuf::from("datasets_gerados")],
            route_costs: RouteCostModel::default(),
        }
    }
}

/// Fuel and toll model used to fill routes without an estimated cost
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteCostModel {
    pub km_per_litre: f64,
    pub fuel_price_per_litre: f64,
    pub toll_per_100km: f64,
}

impl Default for RouteCostModel {
    fn default() -> Self {
        Self {
            km_per_litre: 12.000000000,
            fuel_price_per_litre: 5.500000000,
            toll_per_100km: 15.000000000,
        }
    }
}

impl RouteCostModel {
    /// Estimated trip cost (fuel + tolls) for a distance in km
    pub fn estimate(&self, distance_km: f64) -> f64 {
        let fuel = distance_km / self.km_per_litre * self.fuel_price_per_litre;
        let tolls = distance_km / 100.000000000 * self.toll_per_100km;
        fuel + tolls
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub w_cost: f64,
    pub w_roi: f64,
    pub w_gdp: f64,
    pub w_market: f64,
    pub w_density: f64,
    /// Peak of the triangular density preference
    pub density_optimum: f64,
    /// Sale price multiplier in the ROI ratio
    pub roi_multiplier: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            w_cost: W_COST,
            w_roi: W_ROI,
            w_gdp: W_GDP,
            w_market: W_MARKET,
            w_density: W_DENSITY,
            density_optimum: DENSITY_OPTIMUM,
            roi_multiplier: 1000.000000000,
        }
    }
}

impl CostConfig {
    fn weight_sum(&self) -> f64 {
        self.w_cost + self.w_roi + self.w_gdp + self.w_market + self.w_density
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsConfig {
    /// Efficiency points added per destination inside `bonus_radius_km`
    pub bonus_per_destination: f64,
    pub bonus_radius_km: f64,
    /// Radius of the "very close" destination count
    pub near_radius_km: f64,
    pub efficiency_cap: f64,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            bonus_per_destination: 2.000000000,
            bonus_radius_km: 500.000000000,
            near_radius_km: 300.000000000,
            efficiency_cap: 100.000000000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RadiusWeight {
    pub radius_km: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub radii: Vec<RadiusWeight>,
    pub population_mix: f64,
    pub consumption_mix: f64,
    /// Radius used for the ensemble features and the population factor
    pub reference_radius_km: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            radii: vec![
                RadiusWeight { radius_km: 300.0, weight: 0.350000000 },
                RadiusWeight { radius_km: 500.0, weight: 0.350000000 },
                RadiusWeight { radius_km: 800.0, weight: 0.200000000 },
                RadiusWeight { radius_km: 1200.0, weight: 0.100000000 },
            ],
            population_mix: 0.400000000,
            consumption_mix: 0.600000000,
            reference_radius_km: 500.000000000,
        }
    }
}

/// Coefficients of the heuristic training target
///
/// ```text
/// t = base + (cost_ref - cost)/cost_span·w_cost + gdp/gdp_ref·w_gdp
///          + (dist_ref - dist)/dist_span·w_dist + consumption/cons_ref·w_cons
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicTarget {
    pub base: f64,
    pub cost_reference: f64,
    pub cost_span: f64,
    pub cost_weight: f64,
    pub gdp_reference: f64,
    pub gdp_weight: f64,
    pub distance_reference: f64,
    pub distance_span: f64,
    pub distance_weight: f64,
    pub consumption_reference: f64,
    pub consumption_weight: f64,
}

impl Default for HeuristicTarget {
    fn default() -> Self {
        Self {
            base: 0.500000000,
            cost_reference: 900000.000000000,
            cost_span: 1800000.000000000,
            cost_weight: 0.300000000,
            gdp_reference: 150000.000000000,
            gdp_weight: 0.200000000,
            distance_reference: 1000.000000000,
            distance_span: 2000.000000000,
            distance_weight: 0.250000000,
            consumption_reference: 300.000000000,
            consumption_weight: 0.250000000,
        }
    }
}

impl HeuristicTarget {
    /// Target value clipped to [0, 1]
    pub fn evaluate(&self, cost: f64, gdp_per_capita: f64, mean_distance: f64, consumption: f64) -> f64 {
        let target = self.base
            + (self.cost_reference - cost) / self.cost_span * self.cost_weight
            + gdp_per_capita / self.gdp_reference * self.gdp_weight
            + (self.distance_reference - mean_distance) / self.distance_span * self.distance_weight
            + consumption / self.consumption_reference * self.consumption_weight;
        target.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub samples_per_city: usize,
    /// Standard deviation of the multiplicative gaussian noise
    pub noise_std: f64,
    pub cv_folds: usize,
    pub seed: u64,
    pub target: HeuristicTarget,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            samples_per_city: 50,
            noise_std: 0.020000000,
            cv_folds: 5,
            seed: DEFAULT_SEED,
            target: HeuristicTarget::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub min_weight: f64,
    pub max_weight: f64,
    /// Multiplier of the weight standard deviation in the objective
    pub balance_penalty: f64,
    /// Population size is `population_multiplier × dimensions`
    pub population_multiplier: usize,
    pub max_generations: usize,
    /// Dithering range of the differential weight
    pub mutation: (f64, f64),
    pub recombination: f64,
    pub tol: f64,
    pub atol: f64,
    pub seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_weight: MIN_CATEGORY_WEIGHT,
            max_weight: MAX_CATEGORY_WEIGHT,
            balance_penalty: 0.500000000,
            population_multiplier: 20,
            max_generations: 200,
            mutation: (0.500000000, 1.000000000),
            recombination: 0.700000000,
            tol: 0.010000000,
            atol: 0.000001000,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub tie_threshold: f64,
    pub tie_confidence: f64,
    pub base_confidence: f64,
    /// Confidence gained per unit of score gap
    pub confidence_slope: f64,
    pub max_confidence: f64,
    pub max_factors: usize,
    /// Number of heaviest categories inspected for decisive factors
    pub factor_categories: usize,
    /// Minimum construction cost advantage (%) worth reporting
    pub cost_advantage_pct: f64,
    /// Minimum mean route distance gap (km) worth reporting
    pub distance_gap_km: f64,
    /// Radius whose reachable population is quoted in the factors
    pub population_radius_km: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            tie_threshold: TIE_THRESHOLD,
            tie_confidence: 0.300000000,
            base_confidence: 0.500000000,
            confidence_slope: 2.000000000,
            max_confidence: 0.950000000,
            max_factors: 5,
            factor_categories: 3,
            cost_advantage_pct: 5.000000000,
            distance_gap_km: 50.000000000,
            population_radius_km: 500.000000000,
        }
    }
}

impl AnalysisConfig {
    /// Load from a JSON file (missing keys keep their defaults), or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str::<Self>(&raw)?
            }
            None => {
                info!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Override every stochastic seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.ensemble.seed = seed;
        self.optimizer.seed = seed;
        self
    }

    /// Check internal consistency of weights, bounds and sizes
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AnalysisError::InvalidConfig(msg));

        if self.cities.a.name.trim().is_empty() || self.cities.b.name.trim().is_empty() {
            return invalid("city names must not be empty".into());
        }
        if self.cities.a.name == self.cities.b.name {
            return invalid(format!("both candidates are named {}", self.cities.a.name));
        }

        let cost_sum = self.cost.weight_sum();
        if (cost_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return invalid(format!("cost weights sum to {cost_sum}, expected 1"));
        }
        if self.cost.density_optimum <= 0.0 {
            return invalid("density optimum must be positive".into());
        }

        if self.market.radii.is_empty() {
            return invalid("at least one market radius is required".into());
        }
        if self.market.radii.iter().any(|r| r.radius_km <= 0.0 || r.weight < 0.0) {
            return invalid("market radii must be positive with non-negative weights".into());
        }
        let radius_sum: f64 = self.market.radii.iter().map(|r| r.weight).sum();
        if (radius_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return invalid(format!("market radius weights sum to {radius_sum}, expected 1"));
        }
        let mix = self.market.population_mix + self.market.consumption_mix;
        if (mix - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return invalid(format!("population/consumption mix sums to {mix}, expected 1"));
        }

        if self.ensemble.cv_folds < 2 {
            return invalid("cross-validation needs at least 2 folds".into());
        }
        if self.ensemble.samples_per_city * 2 < self.ensemble.cv_folds {
            return invalid("fewer augmented samples than cross-validation folds".into());
        }
        if !(self.ensemble.noise_std >= 0.0) {
            return invalid("noise standard deviation must be non-negative".into());
        }

        let n = Category::ALL.len() as f64;
        let opt = &self.optimizer;
        if !(opt.min_weight > 0.0 && opt.min_weight <= opt.max_weight) {
            return invalid(format!(
                "weight bounds [{}, {}] are not ordered",
                opt.min_weight, opt.max_weight
            ));
        }
        if opt.min_weight * n > 1.0 + WEIGHT_SUM_TOLERANCE || opt.max_weight * n < 1.0 - WEIGHT_SUM_TOLERANCE {
            return invalid(format!(
                "weight bounds [{}, {}] cannot sum to 1 over {} categories",
                opt.min_weight, opt.max_weight, n
            ));
        }
        if opt.population_multiplier == 0 || opt.max_generations == 0 {
            return invalid("optimizer population and generations must be positive".into());
        }
        if !(0.0..=1.0).contains(&opt.recombination) {
            return invalid("recombination must lie in [0, 1]".into());
        }
        if !(0.0..=2.0).contains(&opt.mutation.0) || !(0.0..=2.0).contains(&opt.mutation.1) || opt.mutation.0 > opt.mutation.1 {
            return invalid("mutation range must be ordered within [0, 2]".into());
        }

        let d = &self.decision;
        for (name, value) in [
            ("tie_confidence", d.tie_confidence),
            ("base_confidence", d.base_confidence),
            ("max_confidence", d.max_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must lie in [0, 1]"));
            }
        }
        if d.tie_threshold < 0.0 || d.confidence_slope < 0.0 {
            return invalid("tie threshold and confidence slope must be non-negative".into());
        }

        Ok(())
    }
}
