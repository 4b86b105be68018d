//! Regional market scorer
//!
//! For each radius, sums population and consumption of the regions a city can
//! reach (its own home region excluded), converts both into relative shares
//! between the two cities and blends them:
//!
//! ```text
//! radius_score = 0.4·pop_share + 0.6·consumption_share
//! M = Σ radius_weight · radius_score
//! ```

use super::{regions_within, Category, CategoryBreakdown, CategoryScorer};
use crate::config::MarketConfig;
use crate::loader::Datasets;
use crate::{mean, City, CityPair, Result};
use serde::Serialize;
use tracing::{debug, info};

/// What one city reaches within one radius
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadiusDetail {
    pub radius_km: f64,
    pub population: f64,
    pub consumption_billions: f64,
    pub mean_monthly_income: f64,
    pub mean_gdp_per_capita: f64,
    pub mean_attractiveness: f64,
    pub region_count: usize,
    pub regions: Vec<String>,
}

impl RadiusDetail {
    fn collect(datasets: &Datasets, city: City, radius_km: f64) -> Self {
        let included: Vec<_> = regions_within(datasets, city, radius_km).collect();
        // Means skip missing values, 0 when nothing is available
        let mean_of = |values: Vec<f64>| mean(&values);

        Self {
            radius_km,
            population: included.iter().map(|r| r.population).sum(),
            consumption_billions: included.iter().map(|r| r.consumption_billions).sum(),
            mean_monthly_income: mean_of(included.iter().filter_map(|r| r.monthly_income).collect()),
            mean_gdp_per_capita: mean_of(included.iter().filter_map(|r| r.gdp_per_capita).collect()),
            mean_attractiveness: mean_of(included.iter().filter_map(|r| r.attractiveness_score).collect()),
            region_count: included.len(),
            regions: included.iter().map(|r| r.region_name.clone()).collect(),
        }
    }
}

/// Relative standing of the two cities at one radius
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadiusScore {
    pub radius_km: f64,
    pub weight: f64,
    pub population_share: CityPair<f64>,
    pub consumption_share: CityPair<f64>,
    pub score: CityPair<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketAnalysis {
    pub scores: CityPair<f64>,
    pub radii: Vec<RadiusScore>,
    pub detail: CityPair<Vec<RadiusDetail>>,
}

impl MarketAnalysis {
    pub fn detail_at(&self, city: City, radius_km: f64) -> Option<&RadiusDetail> {
        self.detail.get(city).iter().find(|d| d.radius_km == radius_km)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketScorer {
    config: MarketConfig,
}

impl MarketScorer {
    pub fn new(config: MarketConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, datasets: &Datasets) -> MarketAnalysis {
        let detail = CityPair::from_fn(|city| {
            self.config
                .radii
                .iter()
                .map(|r| RadiusDetail::collect(datasets, city, r.radius_km))
                .collect::<Vec<_>>()
        });

        let radii: Vec<RadiusScore> = self
            .config
            .radii
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let population_share = CityPair::new(detail.a[i].population, detail.b[i].population).shares();
                let consumption_share =
                    CityPair::new(detail.a[i].consumption_billions, detail.b[i].consumption_billions).shares();
                let score = CityPair::from_fn(|city| {
                    self.config.population_mix * population_share.get(city)
                        + self.config.consumption_mix * consumption_share.get(city)
                });
                RadiusScore {
                    radius_km: r.radius_km,
                    weight: r.weight,
                    population_share,
                    consumption_share,
                    score,
                }
            })
            .collect();

        let scores = CityPair::from_fn(|city| radii.iter().map(|r| r.weight * r.score.get(city)).sum::<f64>());

        for r in &radii {
            debug!(
                "   {:.0} km: population share {:.3}/{:.3}, consumption share {:.3}/{:.3}",
                r.radius_km, r.population_share.a, r.population_share.b, r.consumption_share.a, r.consumption_share.b
            );
        }
        let reference = self.config.reference_radius_km;
        for city in City::ALL {
            if let Some(d) = detail.get(city).iter().find(|d| d.radius_km == reference) {
                info!(
                    "   Population within {:.0} km of {} (excl. {}): {:.1}M across {} regions",
                    reference,
                    datasets.city(city),
                    datasets.city(city).home_region,
                    d.population / 1e6,
                    d.region_count
                );
            }
        }
        info!(
            "   Market score {}: {:.3} | {}: {:.3}",
            datasets.city(City::A),
            scores.a,
            datasets.city(City::B),
            scores.b
        );

        MarketAnalysis { scores, radii, detail }
    }
}

impl CategoryScorer for MarketScorer {
    fn category(&self) -> Category {
        Category::Market
    }

    fn score(&self, datasets: &Datasets) -> Result<CategoryBreakdown> {
        info!("Analyzing regional demographics and market...");
        Ok(CategoryBreakdown::Market(self.analyze(datasets)))
    }

    fn methodologies(&self) -> Vec<String> {
        let radii: Vec<String> = self.config.radii.iter().map(|r| format!("{:.0}", r.radius_km)).collect();
        vec![format!("Regional demographic analysis by radius ({} km)", radii.join("/"))]
    }
}
