//! Fuzzy logistics scorer
//!
//! Route statistics per city feed a 13-rule Mamdani system over mean distance,
//! mean travel time and mean trip cost. Each destination within the bonus
//! radius adds a fixed number of efficiency points, capped at 100.
//!
//! | Input | Universe | Terms |
//! |-------|----------|-------|
//! | distance (km) | 0..1500 | excellent, good, regular, poor |
//! | time (h) | 0..25 step 0.1 | very_fast, fast, medium, slow |
//! | cost | 0..1500 | very_low, low, medium, high |
//! | efficiency | 0..100 | very_low, low, medium, high, very_high |

use super::{Category, CategoryBreakdown, CategoryScorer};
use crate::config::LogisticsConfig;
use crate::fuzzy::{Antecedent, ControlSystem, FuzzyError, FuzzyVariable, Rule, TriangularMf, Universe};
use crate::loader::Datasets;
use crate::{mean, sample_std, City, CityPair, Result, RouteRecord};
use serde::Serialize;
use tracing::{debug, info, warn};

const DISTANCE: &str = "distance";
const TIME: &str = "time";
const COST: &str = "cost";
const EFFICIENCY: &str = "efficiency";

/// Summary of the routes leaving one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStats {
    pub mean_distance_km: f64,
    pub min_distance_km: f64,
    pub std_distance_km: f64,
    pub mean_time_hours: f64,
    pub mean_cost: f64,
    pub route_count: usize,
    pub within_near_radius: usize,
    pub within_bonus_radius: usize,
}

impl RouteStats {
    pub fn from_routes(routes: &[RouteRecord], config: &LogisticsConfig) -> Self {
        let distances: Vec<f64> = routes.iter().map(|r| r.distance_km).collect();
        let times: Vec<f64> = routes.iter().map(|r| r.travel_time_hours).collect();
        let costs: Vec<f64> = routes.iter().map(|r| r.estimated_total_cost).collect();
        let within = |radius: f64| distances.iter().filter(|&&d| d <= radius).count();

        Self {
            mean_distance_km: mean(&distances),
            min_distance_km: distances.iter().copied().fold(f64::INFINITY, f64::min),
            std_distance_km: sample_std(&distances),
            mean_time_hours: mean(&times),
            mean_cost: mean(&costs),
            route_count: routes.len(),
            within_near_radius: within(config.near_radius_km),
            within_bonus_radius: within(config.bonus_radius_km),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogisticsAnalysis {
    /// Bonused efficiency / 100
    pub scores: CityPair<f64>,
    pub stats: CityPair<RouteStats>,
    /// Defuzzified efficiency before the proximity bonus, in [0, 100]
    pub raw_efficiency: CityPair<f64>,
    /// Efficiency after the proximity bonus
    pub efficiency: CityPair<f64>,
    /// Strongest distance term for each city's mean distance
    pub distance_terms: CityPair<String>,
}

pub struct LogisticsScorer {
    config: LogisticsConfig,
    system: ControlSystem,
}

impl LogisticsScorer {
    pub fn new(config: LogisticsConfig) -> Result<Self> {
        Ok(Self {
            config,
            system: build_system()?,
        })
    }

    pub fn system(&self) -> &ControlSystem {
        &self.system
    }

    /// Defuzzified efficiency for one set of route statistics
    pub fn raw_efficiency(&self, stats: &RouteStats) -> Result<f64> {
        let inputs = [
            (DISTANCE, stats.mean_distance_km),
            (TIME, stats.mean_time_hours),
            (COST, stats.mean_cost),
        ];
        match self.system.compute(&inputs) {
            Ok(inference) => Ok(inference.output),
            Err(FuzzyError::NoActivation) => {
                warn!(
                    "No logistics rule fired for distance {:.0} km, time {:.1} h, cost {:.0}; efficiency set to 0",
                    stats.mean_distance_km, stats.mean_time_hours, stats.mean_cost
                );
                Ok(0.0)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Add the proximity bonus and cap
    pub fn apply_bonus(&self, raw: f64, nearby_destinations: usize) -> f64 {
        (raw + self.config.bonus_per_destination * nearby_destinations as f64).min(self.config.efficiency_cap)
    }

    pub fn analyze(&self, datasets: &Datasets) -> Result<LogisticsAnalysis> {
        let stats = datasets.routes.map(|routes| RouteStats::from_routes(routes, &self.config));
        let raw_efficiency = CityPair::try_from_fn(|city| self.raw_efficiency(stats.get(city)))?;
        let efficiency = CityPair::from_fn(|city| {
            self.apply_bonus(*raw_efficiency.get(city), stats.get(city).within_bonus_radius)
        });
        let scores = efficiency.map(|e| e / 100.000000000);

        let distance = self.system.input(DISTANCE)?;
        let distance_terms = stats.map(|s| {
            distance
                .dominant_term(s.mean_distance_km)
                .map(|(term, _)| term)
                .unwrap_or_default()
        });

        for city in City::ALL {
            let s = stats.get(city);
            debug!(
                "   {}: {} routes, min {:.0} km, std {:.0} km, {} within {:.0} km, {} within {:.0} km",
                datasets.city(city),
                s.route_count,
                s.min_distance_km,
                s.std_distance_km,
                s.within_near_radius,
                self.config.near_radius_km,
                s.within_bonus_radius,
                self.config.bonus_radius_km
            );
            info!(
                "   Efficiency {}: {:.1}% (raw {:.1}, mean distance {:.0} km, {})",
                datasets.city(city),
                efficiency.get(city),
                raw_efficiency.get(city),
                s.mean_distance_km,
                distance_terms.get(city)
            );
        }

        Ok(LogisticsAnalysis {
            scores,
            stats,
            raw_efficiency,
            efficiency,
            distance_terms,
        })
    }
}

impl CategoryScorer for LogisticsScorer {
    fn category(&self) -> Category {
        Category::Logistics
    }

    fn score(&self, datasets: &Datasets) -> Result<CategoryBreakdown> {
        info!("Applying fuzzy logic to logistics...");
        Ok(CategoryBreakdown::Logistics(self.analyze(datasets)?))
    }

    fn methodologies(&self) -> Vec<String> {
        vec![format!(
            "Calibrated Mamdani fuzzy logic ({} rules) for logistics",
            self.system.rules().len()
        )]
    }
}

fn tri(a: f64, b: f64, c: f64) -> std::result::Result<TriangularMf, FuzzyError> {
    TriangularMf::new(a, b, c)
}

fn build_system() -> std::result::Result<ControlSystem, FuzzyError> {
    let distance = FuzzyVariable::new(DISTANCE, Universe::new(0.0, 1500.0, 1.0))?
        .with_term("excellent", tri(0.0, 150.0, 350.0)?)
        .with_term("good", tri(300.0, 500.0, 700.0)?)
        .with_term("regular", tri(650.0, 850.0, 1050.0)?)
        .with_term("poor", tri(1000.0, 1250.0, 1500.0)?);

    let time = FuzzyVariable::new(TIME, Universe::new(0.0, 25.0, 0.1))?
        .with_term("very_fast", tri(0.0, 0.0, 4.0)?)
        .with_term("fast", tri(3.0, 6.0, 9.0)?)
        .with_term("medium", tri(8.0, 12.0, 16.0)?)
        .with_term("slow", tri(15.0, 20.0, 25.0)?);

    let cost = FuzzyVariable::new(COST, Universe::new(0.0, 1500.0, 1.0))?
        .with_term("very_low", tri(0.0, 0.0, 250.0)?)
        .with_term("low", tri(200.0, 400.0, 600.0)?)
        .with_term("medium", tri(550.0, 750.0, 950.0)?)
        .with_term("high", tri(900.0, 1200.0, 1500.0)?);

    let efficiency = FuzzyVariable::new(EFFICIENCY, Universe::new(0.0, 101.0, 1.0))?
        .with_term("very_low", tri(0.0, 0.0, 20.0)?)
        .with_term("low", tri(15.0, 30.0, 45.0)?)
        .with_term("medium", tri(40.0, 55.0, 70.0)?)
        .with_term("high", tri(65.0, 80.0, 90.0)?)
        .with_term("very_high", tri(85.0, 100.0, 100.0)?);

    let d = |term: &str| Antecedent::is(DISTANCE, term);
    let t = |term: &str| Antecedent::is(TIME, term);
    let c = |term: &str| Antecedent::is(COST, term);

    let rules = vec![
        Rule::new(d("excellent").and(t("very_fast")).and(c("very_low")), "very_high"),
        Rule::new(d("excellent").and(t("fast")).and(c("low")), "high"),
        Rule::new(d("excellent").and(c("low")), "high"),
        Rule::new(d("good").and(t("fast")).and(c("low")), "high"),
        Rule::new(d("good").and(t("medium")).and(c("medium")), "medium"),
        Rule::new(d("good").and(c("very_low")), "high"),
        Rule::new(d("regular").and(t("medium")), "medium"),
        Rule::new(d("regular").and(c("high")), "low"),
        Rule::new(d("poor").and(t("slow")), "very_low"),
        Rule::new(d("poor").or(c("high")), "low"),
        Rule::new(t("slow").and(c("high")), "very_low"),
        Rule::new(d("excellent"), "high"),
        Rule::new(t("very_fast"), "high"),
    ];

    ControlSystem::new(vec![distance, time, cost], efficiency, rules)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_efficiency_bounded(
            distance in 0.0f64..3000.0,
            hours in 0.0f64..40.0,
            cost in 0.0f64..3000.0,
            nearby in 0usize..20,
        ) {
            let scorer = LogisticsScorer::new(LogisticsConfig::default()).unwrap();
            let stats = RouteStats {
                mean_distance_km: distance,
                min_distance_km: distance,
                std_distance_km: 0.0,
                mean_time_hours: hours,
                mean_cost: cost,
                route_count: 1,
                within_near_radius: 0,
                within_bonus_radius: nearby,
            };
            let raw = scorer.raw_efficiency(&stats).unwrap();
            prop_assert!((0.0..=100.0).contains(&raw));
            let bonused = scorer.apply_bonus(raw, nearby);
            prop_assert!(bonused >= raw.min(100.0) && bonused <= 100.0);
        }
    }
}
