//! Distribution Center Site Selector
//!
//! Compares two candidate cities for a new distribution center by combining
//! four independent scoring methods into one weighted decision.
//!
//! # Decision Model
//!
//! ```text
//! Score(city) = w_C·C + w_L·L + w_M·M + w_E·E      (Σw = 1, 0.15 ≤ w ≤ 0.40)
//! ```
//!
//! | Factor | Method | Description |
//! |--------|--------|-------------|
//! | C | Weighted sub-scores | Construction cost, ROI, GDP, market, density |
//! | L | Mamdani fuzzy inference | Route distance/time/cost efficiency |
//! | M | Radius aggregation | Regional population and consumption shares |
//! | E | CV-weighted regressor ensemble | Predicted attractiveness |
//!
//! Weights are not fixed: a seeded differential evolution search picks the
//! vector that best separates the two cities while penalizing skewed weights.
//!
//! # Pipeline
//!
//! ```text
//! loader ─▶ {cost, logistics, market, ensemble} ─▶ optimizer ─▶ decision ─▶ report
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod analysis;
pub mod config;
pub mod decision;
pub mod fuzzy;
pub mod loader;
pub mod ml;
pub mod optimizer;
pub mod report;
pub mod scoring;

pub use analysis::SiteAnalyzer;
pub use config::AnalysisConfig;
pub use decision::{DecisionResult, Recommendation};
pub use loader::{DatasetKind, Datasets};
pub use scoring::{Category, CategoryBreakdown, CategoryScorer};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing datasets: {}", DatasetKind::join(.0))]
    MissingDataset(Vec<DatasetKind>),
    #[error("City {city} not found in {dataset} dataset")]
    MissingCity { dataset: DatasetKind, city: String },
    #[error("Null value in critical column {column} for {city}")]
    NullCritical { column: &'static str, city: String },
    #[error("No routes found for origin {0}")]
    NoRoutes(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("No score for category {0}")]
    MissingCategory(scoring::Category),
    #[error("Fuzzy inference error: {0}")]
    Fuzzy(#[from] fuzzy::FuzzyError),
    #[error("Model training error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// One of the two candidate cities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum City {
    A,
    B,
}

impl City {
    pub const ALL: [City; 2] = [City::A, City::B];

    pub fn other(self) -> Self {
        match self {
            City::A => City::B,
            City::B => City::A,
        }
    }
}

/// A value held for each candidate city
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CityPair<T> {
    pub a: T,
    pub b: T,
}

impl<T> CityPair<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    /// Build a pair by evaluating `f` for each city
    pub fn from_fn(mut f: impl FnMut(City) -> T) -> Self {
        let a = f(City::A);
        let b = f(City::B);
        Self { a, b }
    }

    pub fn get(&self, city: City) -> &T {
        match city {
            City::A => &self.a,
            City::B => &self.b,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> CityPair<U> {
        CityPair {
            a: f(&self.a),
            b: f(&self.b),
        }
    }

    /// Fallible version of [`CityPair::from_fn`]
    pub fn try_from_fn<E>(mut f: impl FnMut(City) -> std::result::Result<T, E>) -> std::result::Result<Self, E> {
        let a = f(City::A)?;
        let b = f(City::B)?;
        Ok(Self { a, b })
    }
}

impl CityPair<f64> {
    /// Absolute difference between the two values
    pub fn gap(&self) -> f64 {
        (self.a - self.b).abs()
    }

    /// City holding the strictly larger value
    pub fn leader(&self) -> Option<City> {
        if self.a > self.b {
            Some(City::A)
        } else if self.b > self.a {
            Some(City::B)
        } else {
            None
        }
    }

    /// Relative shares `a/(a+b)`, neutral 0.5/0.5 when both are zero
    pub fn shares(&self) -> CityPair<f64> {
        let total = self.a + self.b;
        if total > 0.0 {
            CityPair::new(self.a / total, self.b / total)
        } else {
            CityPair::new(0.5, 0.5)
        }
    }

    /// Normalize by the larger of the two, neutral 0.5 when the max is not positive
    pub fn max_normalized(&self) -> CityPair<f64> {
        let max = self.a.max(self.b);
        if max > 0.0 {
            CityPair::new(self.a / max, self.b / max)
        } else {
            CityPair::new(0.5, 0.5)
        }
    }
}

/// Candidate city identity: display name plus its home administrative region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityProfile {
    pub name: String,
    pub home_region: String,
}

impl fmt::Display for CityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Cost and economic indicators of a candidate city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityIndicators {
    pub city: String,
    /// Construction cost per m²
    pub construction_cost_per_area: f64,
    /// Sale price per m²
    pub sale_price_per_area: f64,
    pub population: f64,
    pub gdp_per_capita: f64,
    pub annual_market_potential: f64,
    /// Inhabitants per km²
    pub population_density: f64,
}

/// A road route from a candidate city to a neighboring capital
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub origin_city: String,
    pub destination_region: String,
    pub distance_km: f64,
    pub travel_time_hours: f64,
    pub estimated_total_cost: f64,
}

/// Demographic and economic indicators of a neighboring region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalIndicator {
    pub region_name: String,
    pub population: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdp_per_capita: Option<f64>,
    pub consumption_billions: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attractiveness_score: Option<f64>,
    pub distance_to_city_a: f64,
    pub distance_to_city_b: f64,
}

impl RegionalIndicator {
    /// Road distance from the region to the given candidate city
    pub fn distance_to(&self, city: City) -> f64 {
        match city {
            City::A => self.distance_to_city_a,
            City::B => self.distance_to_city_b,
        }
    }
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1), 0 for fewer than two values
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Population standard deviation (n)
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / values.len() as f64).sqrt()
}
