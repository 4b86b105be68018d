//! Category scorers
//!
//! Each scorer is a pure function of the loaded [`Datasets`] producing a score
//! per city plus a typed breakdown of how it got there.
//!
//! | Category | Scorer | Range |
//! |----------|--------|-------|
//! | Cost | [`cost::CostScorer`] | [0, 1] |
//! | Logistics | [`logistics::LogisticsScorer`] | [0, 1] |
//! | Market | [`market::MarketScorer`] | [0, 1] |
//! | Ensemble | [`ensemble::EnsembleScorer`] | unbounded regression output |

use crate::loader::Datasets;
use crate::{AnalysisError, City, CityPair, RegionalIndicator, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod cost;
pub mod ensemble;
pub mod logistics;
pub mod market;

pub use cost::{CostAnalysis, CostScorer};
pub use ensemble::{EnsembleAnalysis, EnsembleScorer};
pub use logistics::{LogisticsAnalysis, LogisticsScorer};
pub use market::{MarketAnalysis, MarketScorer};

/// Decision category, in the fixed order used by weight vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Cost,
    Logistics,
    Market,
    Ensemble,
}

impl Category {
    pub const COUNT: usize = 4;
    pub const ALL: [Category; Category::COUNT] =
        [Category::Cost, Category::Logistics, Category::Market, Category::Ensemble];

    /// Position inside weight and score arrays
    pub fn index(self) -> usize {
        match self {
            Category::Cost => 0,
            Category::Logistics => 1,
            Category::Market => 2,
            Category::Ensemble => 3,
        }
    }

    /// Stable machine-readable key
    pub fn key(self) -> &'static str {
        match self {
            Category::Cost => "cost_economics",
            Category::Logistics => "logistics_fuzzy",
            Category::Market => "regional_market",
            Category::Ensemble => "ml_ensemble",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Cost => "cost & economics",
            Category::Logistics => "fuzzy logistics",
            Category::Market => "regional market",
            Category::Ensemble => "ML ensemble",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-category scores in [`Category::ALL`] order
pub type ScoreTable = [CityPair<f64>; Category::COUNT];

/// One implementation per decision category
pub trait CategoryScorer {
    fn category(&self) -> Category;

    fn score(&self, datasets: &Datasets) -> Result<CategoryBreakdown>;

    /// Short descriptions of the techniques behind the score
    fn methodologies(&self) -> Vec<String>;
}

/// Scorer output tagged by category
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum CategoryBreakdown {
    Cost(CostAnalysis),
    Logistics(LogisticsAnalysis),
    Market(MarketAnalysis),
    Ensemble(EnsembleAnalysis),
}

impl CategoryBreakdown {
    pub fn category(&self) -> Category {
        match self {
            CategoryBreakdown::Cost(_) => Category::Cost,
            CategoryBreakdown::Logistics(_) => Category::Logistics,
            CategoryBreakdown::Market(_) => Category::Market,
            CategoryBreakdown::Ensemble(_) => Category::Ensemble,
        }
    }

    pub fn scores(&self) -> CityPair<f64> {
        match self {
            CategoryBreakdown::Cost(a) => a.scores,
            CategoryBreakdown::Logistics(a) => a.scores,
            CategoryBreakdown::Market(a) => a.scores,
            CategoryBreakdown::Ensemble(a) => a.scores,
        }
    }
}

/// Collect scores from breakdowns; every category must be present
pub fn score_table(breakdowns: &[CategoryBreakdown]) -> Result<ScoreTable> {
    let mut table = [None; Category::COUNT];
    for breakdown in breakdowns {
        table[breakdown.category().index()] = Some(breakdown.scores());
    }
    let mut scores = [CityPair::new(0.0, 0.0); Category::COUNT];
    for category in Category::ALL {
        scores[category.index()] = table[category.index()].ok_or(AnalysisError::MissingCategory(category))?;
    }
    Ok(scores)
}

pub fn find_cost(breakdowns: &[CategoryBreakdown]) -> Option<&CostAnalysis> {
    breakdowns.iter().find_map(|b| match b {
        CategoryBreakdown::Cost(a) => Some(a),
        _ => None,
    })
}

pub fn find_logistics(breakdowns: &[CategoryBreakdown]) -> Option<&LogisticsAnalysis> {
    breakdowns.iter().find_map(|b| match b {
        CategoryBreakdown::Logistics(a) => Some(a),
        _ => None,
    })
}

pub fn find_market(breakdowns: &[CategoryBreakdown]) -> Option<&MarketAnalysis> {
    breakdowns.iter().find_map(|b| match b {
        CategoryBreakdown::Market(a) => Some(a),
        _ => None,
    })
}

/// Regions within `radius_km` of `city`, excluding the city's own home region
pub fn regions_within<'a>(
    datasets: &'a Datasets,
    city: City,
    radius_km: f64,
) -> impl Iterator<Item = &'a RegionalIndicator> + 'a {
    let home = datasets.city(city).home_region.as_str();
    datasets
        .regions
        .iter()
        .filter(move |r| r.distance_to(city) <= radius_km && r.region_name != home)
}
