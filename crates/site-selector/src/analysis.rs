//! End-to-end analysis pipeline

use crate::config::AnalysisConfig;
use crate::decision::{DecisionCompiler, DecisionResult};
use crate::loader::{load_datasets, DatasetPaths, Datasets};
use crate::optimizer::WeightOptimizer;
use crate::scoring::{score_table, CategoryScorer, CostScorer, EnsembleScorer, LogisticsScorer, MarketScorer};
use crate::{City, Result};
use tracing::info;

pub struct SiteAnalyzer {
    config: AnalysisConfig,
}

impl SiteAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// One scorer per category, in [`crate::Category::ALL`] order
    pub fn scorers(&self) -> Result<Vec<Box<dyn CategoryScorer>>> {
        let c = &self.config;
        let scorers: Vec<Box<dyn CategoryScorer>> = vec![
            Box::new(CostScorer::new(c.cost.clone())),
            Box::new(LogisticsScorer::new(c.logistics.clone())?),
            Box::new(MarketScorer::new(c.market.clone())),
            Box::new(EnsembleScorer::new(c.ensemble.clone(), c.market.reference_radius_km)),
        ];
        Ok(scorers)
    }

    /// Techniques applied by a run, scorers first
    pub fn methodologies(&self, scorers: &[Box<dyn CategoryScorer>]) -> Vec<String> {
        let mut methods: Vec<String> = scorers.iter().flat_map(|s| s.methodologies()).collect();
        methods.push(format!(
            "Differential evolution with bounded, balanced weights ({:.0}%-{:.0}% per category)",
            self.config.optimizer.min_weight * 100.0,
            self.config.optimizer.max_weight * 100.0
        ));
        methods
    }

    /// Score both candidates, optimize the weights and compile the decision
    pub fn analyze(&self, datasets: &Datasets) -> Result<DecisionResult> {
        let scorers = self.scorers()?;

        let mut breakdowns = Vec::with_capacity(scorers.len());
        for scorer in &scorers {
            let breakdown = scorer.score(datasets)?;
            let scores = breakdown.scores();
            info!(
                "   {} score: {} {:.3} | {} {:.3}",
                scorer.category(),
                datasets.city(City::A),
                scores.a,
                datasets.city(City::B),
                scores.b
            );
            breakdowns.push(breakdown);
        }

        let table = score_table(&breakdowns)?;
        let optimization = WeightOptimizer::new(self.config.optimizer.clone()).optimize(&table);
        let methodologies = self.methodologies(&scorers);

        Ok(DecisionCompiler::new(self.config.decision.clone()).compile(
            optimization,
            table,
            breakdowns,
            &datasets.cities,
            methodologies,
        ))
    }

    /// Load the datasets from disk, then analyze them
    pub fn run(&self, paths: &DatasetPaths) -> Result<(Datasets, DecisionResult)> {
        info!("Loading datasets...");
        let datasets = load_datasets(paths, &self.config.cities, &self.config.data)?;
        let decision = self.analyze(&datasets)?;
        Ok((datasets, decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Recommendation;
    use crate::loader::fixtures::{cost_row, northeast, region_row, route_row};
    use crate::Category;

    fn analyzer() -> SiteAnalyzer {
        SiteAnalyzer::new(AnalysisConfig::default())
    }

    #[test]
    fn test_scorers_cover_every_category_in_order() {
        let scorers = analyzer().scorers().unwrap();
        let categories: Vec<Category> = scorers.iter().map(|s| s.category()).collect();
        assert_eq!(categories, Category::ALL.to_vec());
    }

    #[test]
    fn test_methodologies() {
        let a = analyzer();
        let methods = a.methodologies(&a.scorers().unwrap());
        assert_eq!(methods.len(), 7);
        assert!(methods.contains(&"Calibrated Mamdani fuzzy logic (13 rules) for logistics".to_string()));
        assert!(methods.contains(&"Controlled data augmentation (±2% gaussian noise)".to_string()));
        assert!(methods.contains(&"Regional demographic analysis by radius (300/500/800/1200 km)".to_string()));
        assert!(methods.last().unwrap().starts_with("Differential evolution"));
    }

    #[test]
    fn test_analysis_on_northeast_snapshot() {
        let datasets = northeast();
        let result = analyzer().analyze(&datasets).unwrap();

        assert_eq!(result.breakdowns.len(), Category::COUNT);
        assert_eq!(result.recommendation, Recommendation::City(City::A));
        let total: f64 = result.weights.as_array().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(result.weights.iter().all(|(_, w)| (0.15 - 1e-9..=0.40 + 1e-9).contains(&w)));
        assert!(!result.decisive_factors.is_empty() && result.decisive_factors.len() <= 5);
        assert!((result.advantage_percent - result.final_scores.gap() * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_analysis_tolerates_secondary_gaps() {
        let config = AnalysisConfig::default();
        let mut recife = cost_row("Recife", 1650.0, 7800.0, 1_488_920.0, 35_900.0, 0.0, 6_803.0);
        recife.market_potential = None;
        let costs = vec![recife, cost_row("Salvador", 1720.0, 7200.0, 2_417_678.0, 24_400.0, 38.1e9, 3_486.0)];
        let mut uncosted = route_row("Recife", "Maceió", 300.0, 4.2, 0.0);
        uncosted.total_cost = None;
        let routes = vec![
            uncosted,
            route_row("Recife", "Natal", 285.0, 4.1, 195.0),
            route_row("Salvador", "Aracaju", 325.0, 4.8, 222.0),
            route_row("Salvador", "Maceió", 580.0, 8.3, 396.0),
        ];
        let regions = vec![
            region_row("Paraíba", 3_974_687.0, 61.0, 120.0, 955.0),
            region_row("Sergipe", 2_210_004.0, 34.7, 500.0, 325.0),
        ];
        let datasets =
            Datasets::from_rows(config.cities.clone(), costs, routes, regions, &config.data.route_costs).unwrap();

        let result = SiteAnalyzer::new(config).analyze(&datasets).unwrap();
        assert!((0.3..=0.95).contains(&result.confidence));
        assert_eq!(result.breakdowns.len(), Category::COUNT);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let datasets = northeast();
        let first = analyzer().analyze(&datasets).unwrap();
        let second = analyzer().analyze(&datasets).unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }
}
