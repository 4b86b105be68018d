//! Cost and economics scorer
//!
//! Five normalized sub-scores per city, combined with fixed weights:
//!
//! ```text
//! C = 0.30·cost + 0.25·roi + 0.15·gdp + 0.20·market + 0.10·density
//! ```

use super::{Category, CategoryBreakdown, CategoryScorer};
use crate::config::CostConfig;
use crate::loader::Datasets;
use crate::{City, CityIndicators, CityPair, Result};
use serde::Serialize;
use tracing::{debug, info};

/// Normalized sub-scores of one city, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostSubScores {
    pub cost: f64,
    pub roi: f64,
    pub gdp: f64,
    pub market: f64,
    pub density: f64,
}

impl CostSubScores {
    fn weighted(&self, config: &CostConfig) -> f64 {
        config.w_cost * self.cost
            + config.w_roi * self.roi
            + config.w_gdp * self.gdp
            + config.w_market * self.market
            + config.w_density * self.density
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CostAnalysis {
    pub scores: CityPair<f64>,
    pub components: CityPair<CostSubScores>,
    /// Raw ROI ratio `sale_price·multiplier / construction_cost`
    pub roi: CityPair<f64>,
    /// City with the lower construction cost, `None` when equal
    pub cheaper: Option<City>,
    /// `(expensive - cheap) / expensive · 100`
    pub cost_advantage_percent: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CostScorer {
    config: CostConfig,
}

impl CostScorer {
    pub fn new(config: CostConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, costs: &CityPair<CityIndicators>) -> CostAnalysis {
        let construction = costs.map(|c| c.construction_cost_per_area);

        // Inverted: the cheaper city gets 1.0
        let cost = inverse_cost_scores(construction);
        let cheaper = construction.leader().map(City::other);
        let expensive = construction.a.max(construction.b);
        let cost_advantage_percent = if expensive > 0.0 {
            construction.gap() / expensive * 100.000000000
        } else {
            0.0
        };

        let roi = costs.map(|c| {
            if c.construction_cost_per_area > 0.0 {
                c.sale_price_per_area * self.config.roi_multiplier / c.construction_cost_per_area
            } else {
                0.0
            }
        });
        let roi_scores = roi.max_normalized();
        let gdp = costs.map(|c| c.gdp_per_capita).max_normalized();
        let market = costs.map(|c| c.annual_market_potential).max_normalized();
        let density = costs.map(|c| self.density_score(c.population_density));

        let components = CityPair::from_fn(|city| CostSubScores {
            cost: *cost.get(city),
            roi: *roi_scores.get(city),
            gdp: *gdp.get(city),
            market: *market.get(city),
            density: *density.get(city),
        });
        let scores = components.map(|c| c.weighted(&self.config));

        for city in City::ALL {
            let c = components.get(city);
            debug!(
                "   {} sub-scores: cost {:.3}, roi {:.3}, gdp {:.3}, market {:.3}, density {:.3}",
                costs.get(city).city,
                c.cost,
                c.roi,
                c.gdp,
                c.market,
                c.density
            );
        }
        info!(
            "   Cost score {}: {:.3} (cost {:.2}, ROI {:.2}) | {}: {:.3} (cost {:.2}, ROI {:.2})",
            costs.a.city,
            scores.a,
            components.a.cost,
            components.a.roi,
            costs.b.city,
            scores.b,
            components.b.cost,
            components.b.roi
        );

        CostAnalysis {
            scores,
            components,
            roi,
            cheaper,
            cost_advantage_percent,
        }
    }

    /// Triangular preference peaking at the optimum density, clamped to [0, 1]
    fn density_score(&self, density: f64) -> f64 {
        let optimum = self.config.density_optimum;
        (1.000000000 - (density - optimum).abs() / optimum).clamp(0.0, 1.0)
    }
}

fn inverse_cost_scores(construction: CityPair<f64>) -> CityPair<f64> {
    let (a, b) = (construction.a, construction.b);
    if a <= 0.0 && b <= 0.0 {
        return CityPair::new(0.5, 0.5);
    }
    if a < b {
        CityPair::new(1.0, a / b)
    } else if b < a {
        CityPair::new(b / a, 1.0)
    } else {
        CityPair::new(1.0, 1.0)
    }
}

impl CategoryScorer for CostScorer {
    fn category(&self) -> Category {
        Category::Cost
    }

    fn score(&self, datasets: &Datasets) -> Result<CategoryBreakdown> {
        info!("Analyzing costs and economics...");
        Ok(CategoryBreakdown::Cost(self.analyze(&datasets.costs)))
    }

    fn methodologies(&self) -> Vec<String> {
        vec!["Cost/economic indicator analysis (construction cost, ROI, GDP, market, density)".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::fixtures::northeast;

    fn indicators(city: &str, construction: f64, sale: f64, gdp: f64, market: f64, density: f64) -> CityIndicators {
        CityIndicators {
            city: city.to_string(),
            construction_cost_per_area: construction,
            sale_price_per_area: sale,
            population: 1_000_000.0,
            gdp_per_capita: gdp,
            annual_market_potential: market,
            population_density: density,
        }
    }

    #[test]
    fn test_cheaper_city_scores_one() {
        let costs = CityPair::new(
            indicators("A", 800.0, 1500.0, 30000.0, 1e9, 2000.0),
            indicators("B", 1000.0, 1500.0, 30000.0, 1e9, 2000.0),
        );
        let analysis = CostScorer::default().analyze(&costs);

        assert_eq!(analysis.components.a.cost, 1.0);
        assert!((analysis.components.b.cost - 0.8).abs() < 1e-12);
        assert!((analysis.cost_advantage_percent - 20.0).abs() < 1e-9);
        assert_eq!(analysis.cheaper, Some(City::A));

        // Same sale price: the cheaper build has the better ROI
        assert!((analysis.roi.a - 1875.0).abs() < 1e-9);
        assert_eq!(analysis.components.a.roi, 1.0);
        assert!((analysis.components.b.roi - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_density_preference() {
        let scorer = CostScorer::default();
        assert_eq!(scorer.density_score(2000.0), 1.0);
        assert!((scorer.density_score(3000.0) - 0.5).abs() < 1e-12);
        assert_eq!(scorer.density_score(6803.0), 0.0);
        assert_eq!(scorer.density_score(0.0), 0.0);
    }

    #[test]
    fn test_zero_maxima_are_neutral() {
        let costs = CityPair::new(
            indicators("A", 1000.0, 1500.0, 0.0, 0.0, 2000.0),
            indicators("B", 1000.0, 1500.0, 0.0, 0.0, 2000.0),
        );
        let analysis = CostScorer::default().analyze(&costs);
        assert_eq!(analysis.components.a.gdp, 0.5);
        assert_eq!(analysis.components.b.market, 0.5);
        assert_eq!(analysis.cheaper, None);
        assert_eq!(analysis.cost_advantage_percent, 0.0);
        assert_eq!(analysis.scores.a, analysis.scores.b);
    }

    #[test]
    fn test_scorer_on_northeast_snapshot() {
        let datasets = northeast();
        let breakdown = CostScorer::default().score(&datasets).unwrap();
        let scores = breakdown.scores();
        assert_eq!(breakdown.category(), Category::Cost);
        assert!(scores.a > 0.0 && scores.a <= 1.0);
        assert!(scores.b > 0.0 && scores.b <= 1.0);
    }
}
