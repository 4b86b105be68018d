//! Decision compilation
//!
//! Turns optimized weights and category scores into a recommendation:
//!
//! ```text
//! gap = |score_a − score_b|
//! gap < tie_threshold  →  TIE, confidence = tie_confidence
//! otherwise            →  leader, confidence = min(base + slope·gap, max)
//! ```
//!
//! Decisive factors are read from the breakdowns of the heaviest categories.

use crate::config::DecisionConfig;
use crate::optimizer::{CategoryWeights, OptimizationResult};
use crate::scoring::{find_cost, find_logistics, find_market, Category, CategoryBreakdown, ScoreTable};
use crate::{City, CityPair, CityProfile};
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of the comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    City(City),
    Tie,
}

impl Recommendation {
    pub fn winner(self) -> Option<City> {
        match self {
            Recommendation::City(city) => Some(city),
            Recommendation::Tie => None,
        }
    }

    pub fn is_tie(self) -> bool {
        self == Recommendation::Tie
    }
}

/// Complete outcome of one analysis run
#[derive(Debug, Clone, Serialize)]
pub struct DecisionResult {
    pub recommendation: Recommendation,
    pub final_scores: CityPair<f64>,
    pub advantage_percent: f64,
    pub confidence: f64,
    pub decisive_factors: Vec<String>,
    pub methodologies: Vec<String>,
    pub weights: CategoryWeights,
    pub category_scores: ScoreTable,
    pub breakdowns: Vec<CategoryBreakdown>,
    pub optimization: OptimizationResult,
}

impl DecisionResult {
    /// Display name of the recommended city, or `TIE`
    pub fn recommended_name<'a>(&self, cities: &'a CityPair<CityProfile>) -> &'a str {
        match self.recommendation {
            Recommendation::City(city) => &cities.get(city).name,
            Recommendation::Tie => "TIE",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecisionCompiler {
    config: DecisionConfig,
}

impl DecisionCompiler {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    /// Confidence for a decisive gap, clipped to `max_confidence`
    pub fn confidence(&self, gap: f64) -> f64 {
        (self.config.base_confidence + self.config.confidence_slope * gap).min(self.config.max_confidence)
    }

    /// Recommendation and confidence for a pair of final scores
    pub fn classify(&self, scores: &CityPair<f64>) -> (Recommendation, f64) {
        let gap = scores.gap();
        match scores.leader() {
            Some(city) if gap >= self.config.tie_threshold => (Recommendation::City(city), self.confidence(gap)),
            _ => (Recommendation::Tie, self.config.tie_confidence),
        }
    }

    /// Human-readable reasons behind the recommendation, at most `max_factors`
    pub fn decisive_factors(
        &self,
        recommendation: Recommendation,
        weights: &CategoryWeights,
        table: &ScoreTable,
        breakdowns: &[CategoryBreakdown],
        cities: &CityPair<CityProfile>,
    ) -> Vec<String> {
        let winner = recommendation.winner();
        let mut factors = Vec::new();

        for (category, weight) in weights.ranked().into_iter().take(self.config.factor_categories) {
            let before = factors.len();
            match category {
                Category::Cost => self.cost_factors(breakdowns, weight, winner, cities, &mut factors),
                Category::Logistics => self.logistics_factors(breakdowns, winner, cities, &mut factors),
                Category::Market => self.market_factors(breakdowns, winner, cities, &mut factors),
                Category::Ensemble => {}
            }
            debug!("   {}: {} factor(s)", category, factors.len() - before);
        }

        if factors.is_empty() {
            match winner {
                Some(city) => factors.extend(
                    Category::ALL
                        .iter()
                        .filter(|c| {
                            let scores = table[c.index()];
                            scores.get(city) > scores.get(city.other())
                        })
                        .map(|c| format!("Higher {} score in {}", c.label(), cities.get(city))),
                ),
                None => factors.push("Marginal difference between the options".to_string()),
            }
        }

        factors.truncate(self.config.max_factors);
        factors
    }

    fn cost_factors(
        &self,
        breakdowns: &[CategoryBreakdown],
        weight: f64,
        winner: Option<City>,
        cities: &CityPair<CityProfile>,
        factors: &mut Vec<String>,
    ) {
        let Some(cost) = find_cost(breakdowns) else {
            return;
        };
        if let Some(cheaper) = cost.cheaper {
            if cost.cost_advantage_percent > self.config.cost_advantage_pct {
                factors.push(format!(
                    "Construction cost {:.1}% lower in {} (weight: {:.1}%)",
                    cost.cost_advantage_percent,
                    cities.get(cheaper),
                    weight * 100.0
                ));
            }
        }
        if let Some(city) = winner {
            let (roi_w, roi_l) = (*cost.roi.get(city), *cost.roi.get(city.other()));
            if roi_l > 0.0 && roi_w > roi_l {
                factors.push(format!(
                    "ROI {:.1}% higher in {}",
                    (roi_w / roi_l - 1.0) * 100.0,
                    cities.get(city)
                ));
            }
        }
    }

    fn logistics_factors(
        &self,
        breakdowns: &[CategoryBreakdown],
        winner: Option<City>,
        cities: &CityPair<CityProfile>,
        factors: &mut Vec<String>,
    ) {
        let Some(logistics) = find_logistics(breakdowns) else {
            return;
        };
        if let Some(city) = winner {
            let lead = logistics.efficiency.get(city) - logistics.efficiency.get(city.other());
            if lead > 0.0 {
                factors.push(format!("Logistics efficiency {:.1} points higher in {}", lead, cities.get(city)));
            }
        }
        let distances = logistics.stats.map(|s| s.mean_distance_km);
        if distances.gap() > self.config.distance_gap_km {
            if let Some(farther) = distances.leader() {
                factors.push(format!(
                    "Mean route distance {:.0} km shorter from {}",
                    distances.gap(),
                    cities.get(farther.other())
                ));
            }
        }
    }

    fn market_factors(
        &self,
        breakdowns: &[CategoryBreakdown],
        winner: Option<City>,
        cities: &CityPair<CityProfile>,
        factors: &mut Vec<String>,
    ) {
        let (Some(market), Some(city)) = (find_market(breakdowns), winner) else {
            return;
        };
        let radius = self.config.population_radius_km;
        let (Some(own), Some(other)) = (market.detail_at(city, radius), market.detail_at(city.other(), radius)) else {
            return;
        };
        if own.population > other.population {
            factors.push(format!(
                "Population {:.1}M within {:.0} km of {} vs {:.1}M from {}",
                own.population / 1e6,
                radius,
                cities.get(city),
                other.population / 1e6,
                cities.get(city.other())
            ));
        }
    }

    /// Assemble the final decision from the optimizer output and the scorer breakdowns
    pub fn compile(
        &self,
        optimization: OptimizationResult,
        table: ScoreTable,
        breakdowns: Vec<CategoryBreakdown>,
        cities: &CityPair<CityProfile>,
        methodologies: Vec<String>,
    ) -> DecisionResult {
        info!("Compiling final decision...");
        let weights = optimization.weights;
        let final_scores = weights.combine(&table);
        let (recommendation, confidence) = self.classify(&final_scores);
        let advantage_percent = final_scores.gap() * 100.0;
        let decisive_factors = self.decisive_factors(recommendation, &weights, &table, &breakdowns, cities);

        match recommendation.winner() {
            Some(city) => info!(
                "   Recommendation: {} ({:.1}% advantage, confidence {:.0}%)",
                cities.get(city),
                advantage_percent,
                confidence * 100.0
            ),
            None => info!("   Technical tie ({:.2}% gap)", advantage_percent),
        }

        DecisionResult {
            recommendation,
            final_scores,
            advantage_percent,
            confidence,
            decisive_factors,
            methodologies,
            weights,
            category_scores: table,
            breakdowns,
            optimization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, LogisticsConfig};
    use crate::loader::fixtures::northeast;
    use crate::scoring::ensemble::EnsembleAnalysis;
    use crate::scoring::{score_table, CostScorer, LogisticsScorer, MarketScorer};

    fn breakdowns() -> Vec<CategoryBreakdown> {
        let datasets = northeast();
        vec![
            CategoryBreakdown::Cost(CostScorer::default().analyze(&datasets.costs)),
            CategoryBreakdown::Logistics(
                LogisticsScorer::new(LogisticsConfig::default())
                    .unwrap()
                    .analyze(&datasets)
                    .unwrap(),
            ),
            CategoryBreakdown::Market(MarketScorer::default().analyze(&datasets)),
            CategoryBreakdown::Ensemble(EnsembleAnalysis::neutral()),
        ]
    }

    fn weights() -> CategoryWeights {
        CategoryWeights::new([0.30, 0.35, 0.20, 0.15])
    }

    fn cities() -> CityPair<CityProfile> {
        AnalysisConfig::default().cities
    }

    #[test]
    fn test_classify_tie_and_winner() {
        let compiler = DecisionCompiler::default();

        let (rec, conf) = compiler.classify(&CityPair::new(0.51, 0.50));
        assert_eq!(rec, Recommendation::Tie);
        assert_eq!(conf, 0.3);

        let (rec, conf) = compiler.classify(&CityPair::new(0.40, 0.60));
        assert_eq!(rec, Recommendation::City(City::B));
        assert!((conf - 0.9).abs() < 1e-12);

        let (_, conf) = compiler.classify(&CityPair::new(0.9, 0.1));
        assert_eq!(conf, 0.95);
    }

    #[test]
    fn test_equal_scores_are_a_tie_even_without_threshold() {
        let compiler = DecisionCompiler::new(DecisionConfig {
            tie_threshold: 0.0,
            ..DecisionConfig::default()
        });
        assert_eq!(compiler.classify(&CityPair::new(0.5, 0.5)).0, Recommendation::Tie);
    }

    #[test]
    fn test_factors_follow_heaviest_categories() {
        let breakdowns = breakdowns();
        let table = score_table(&breakdowns).unwrap();
        let compiler = DecisionCompiler::default();
        let factors = compiler.decisive_factors(Recommendation::City(City::A), &weights(), &table, &breakdowns, &cities());

        assert!(factors.len() <= 5);
        // Logistics carries the largest weight
        assert!(factors[0].starts_with("Logistics efficiency") || factors[0].starts_with("Mean route distance"));
        assert!(factors.contains(&"Mean route distance 277 km shorter from Recife".to_string()));
        assert!(factors.contains(&"ROI 12.9% higher in Recife".to_string()));
        assert!(factors.contains(&"Population 12.6M within 500 km of Recife vs 2.2M from Salvador".to_string()));
        // 4.1% construction advantage is below the 5% reporting threshold
        assert!(!factors.iter().any(|f| f.starts_with("Construction cost")));
    }

    #[test]
    fn test_cost_advantage_reported_above_threshold() {
        let breakdowns = breakdowns();
        let table = score_table(&breakdowns).unwrap();
        let compiler = DecisionCompiler::new(DecisionConfig {
            cost_advantage_pct: 3.0,
            ..DecisionConfig::default()
        });
        let factors = compiler.decisive_factors(Recommendation::City(City::A), &weights(), &table, &breakdowns, &cities());
        assert!(factors.contains(&"Construction cost 4.1% lower in Recife (weight: 30.0%)".to_string()));
    }

    #[test]
    fn test_tie_keeps_only_neutral_facts() {
        let breakdowns = breakdowns();
        let table = score_table(&breakdowns).unwrap();
        let factors =
            DecisionCompiler::default().decisive_factors(Recommendation::Tie, &weights(), &table, &breakdowns, &cities());
        assert_eq!(factors, vec!["Mean route distance 277 km shorter from Recife".to_string()]);
    }

    #[test]
    fn test_generic_fallback() {
        let compiler = DecisionCompiler::default();
        let mut table = [CityPair::new(0.5, 0.5); Category::COUNT];
        table[Category::Cost.index()] = CityPair::new(0.7, 0.4);
        table[Category::Ensemble.index()] = CityPair::new(0.6, 0.5);

        let factors = compiler.decisive_factors(Recommendation::City(City::A), &weights(), &table, &[], &cities());
        assert_eq!(
            factors,
            vec![
                "Higher cost & economics score in Recife".to_string(),
                "Higher ML ensemble score in Recife".to_string(),
            ]
        );

        let tie = compiler.decisive_factors(Recommendation::Tie, &weights(), &table, &[], &cities());
        assert_eq!(tie, vec!["Marginal difference between the options".to_string()]);
    }

    #[test]
    fn test_factor_cap() {
        let breakdowns = breakdowns();
        let table = score_table(&breakdowns).unwrap();
        let compiler = DecisionCompiler::new(DecisionConfig {
            max_factors: 2,
            ..DecisionConfig::default()
        });
        let factors = compiler.decisive_factors(Recommendation::City(City::A), &weights(), &table, &breakdowns, &cities());
        assert_eq!(factors.len(), 2);
    }

    #[test]
    fn test_compile() {
        let breakdowns = breakdowns();
        let table = score_table(&breakdowns).unwrap();
        let weights = weights();
        let optimization = OptimizationResult {
            weights,
            final_scores: weights.combine(&table),
            objective: 0.0,
            generations: 0,
            evaluations: 0,
            converged: true,
        };
        let result = DecisionCompiler::default().compile(optimization, table, breakdowns, &cities(), vec!["m".into()]);

        assert_eq!(result.recommendation, Recommendation::City(City::A));
        assert!((result.advantage_percent - result.final_scores.gap() * 100.0).abs() < 1e-12);
        assert!((0.5..=0.95).contains(&result.confidence));
        assert_eq!(result.recommended_name(&cities()), "Recife");
        assert_eq!(result.breakdowns.len(), 3);
        assert!(!result.decisive_factors.is_empty());
    }

    #[test]
    fn test_recommendation_serialization() {
        assert_eq!(serde_json::to_string(&Recommendation::Tie).unwrap(), "\"tie\"");
        assert_eq!(
            serde_json::to_string(&Recommendation::City(City::B)).unwrap(),
            "{\"city\":\"B\"}"
        );
    }
}
