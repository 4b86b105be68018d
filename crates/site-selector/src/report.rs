//! Decision record output and console presentation

use crate::decision::DecisionResult;
use crate::loader::{Datasets, ValidationSummary};
use crate::optimizer::CategoryWeights;
use crate::scoring::{Category, CategoryBreakdown};
use crate::{City, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Search diagnostics carried into the record
#[derive(Debug, Clone, Serialize)]
pub struct OptimizerDiagnostics {
    pub objective: f64,
    pub generations: usize,
    pub evaluations: usize,
    pub converged: bool,
}

/// Serialized outcome of one run, scores keyed by city name
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub timestamp: String,
    pub recommended_city: String,
    pub final_scores: BTreeMap<String, f64>,
    pub advantage_percent: f64,
    pub confidence: f64,
    pub decisive_factors: Vec<String>,
    pub methodologies: Vec<String>,
    pub optimized_weights: CategoryWeights,
    pub category_scores: BTreeMap<String, BTreeMap<String, f64>>,
    pub breakdowns: Vec<CategoryBreakdown>,
    pub validation: ValidationSummary,
    pub optimizer: OptimizerDiagnostics,
}

impl DecisionRecord {
    pub fn new(datasets: &Datasets, decision: &DecisionResult) -> Self {
        let by_name = |pair: &crate::CityPair<f64>| -> BTreeMap<String, f64> {
            City::ALL
                .iter()
                .map(|&city| (datasets.city(city).name.clone(), *pair.get(city)))
                .collect()
        };

        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            recommended_city: decision.recommended_name(&datasets.cities).to_string(),
            final_scores: by_name(&decision.final_scores),
            advantage_percent: decision.advantage_percent,
            confidence: decision.confidence,
            decisive_factors: decision.decisive_factors.clone(),
            methodologies: decision.methodologies.clone(),
            optimized_weights: decision.weights,
            category_scores: Category::ALL
                .iter()
                .map(|c| (c.key().to_string(), by_name(&decision.category_scores[c.index()])))
                .collect(),
            breakdowns: decision.breakdowns.clone(),
            validation: datasets.validation_summary(),
            optimizer: OptimizerDiagnostics {
                objective: decision.optimization.objective,
                generations: decision.optimization.generations,
                evaluations: decision.optimization.evaluations,
                converged: decision.optimization.converged,
            },
        }
    }
}

/// Write the record as pretty JSON, creating missing parent directories
pub fn write_json(path: &Path, record: &DecisionRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    info!("Writing decision record to {:?}", path);
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, record)?;
    Ok(())
}

/// Final summary followed by the answers to the three case questions
pub fn log_summary(datasets: &Datasets, decision: &DecisionResult) {
    let recommended = decision.recommended_name(&datasets.cities);

    info!("{}", "=".repeat(60));
    info!("FINAL DECISION");
    info!("{}", "=".repeat(60));
    info!("Recommended city: {}", recommended);
    for city in City::ALL {
        info!("  {}: {:.3}", datasets.city(city), decision.final_scores.get(city));
    }
    info!("Advantage: {:.1}%", decision.advantage_percent);
    info!("Confidence: {:.0}%", decision.confidence * 100.0);
    info!("Optimized weights:");
    for (category, weight) in decision.weights.ranked() {
        info!("  {:20} {:.1}%", category.label(), weight * 100.0);
    }

    info!("\n{}", "=".repeat(60));
    info!("CASE QUESTIONS");
    info!("{}", "=".repeat(60));
    info!("1. Which city should host the distribution center?");
    if decision.recommendation.is_tie() {
        info!("   Technical tie between {} and {}", datasets.city(City::A), datasets.city(City::B));
    } else {
        info!(
            "   {} (confidence {:.0}%, advantage {:.1}%)",
            recommended,
            decision.confidence * 100.0,
            decision.advantage_percent
        );
    }
    info!("2. Which factors decided it?");
    for (i, factor) in decision.decisive_factors.iter().enumerate() {
        info!("   {}. {}", i + 1, factor);
    }
    info!("3. Which methods were applied?");
    for method in &decision.methodologies {
        info!("   - {}", method);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::decision::{DecisionCompiler, Recommendation};
    use crate::loader::fixtures::northeast;
    use crate::optimizer::OptimizationResult;
    use crate::config::LogisticsConfig;
    use crate::scoring::ensemble::EnsembleAnalysis;
    use crate::scoring::{score_table, CostScorer, LogisticsScorer, MarketScorer};
    use tempfile::TempDir;

    fn decision(datasets: &Datasets) -> DecisionResult {
        let breakdowns = vec![
            CategoryBreakdown::Cost(CostScorer::default().analyze(&datasets.costs)),
            CategoryBreakdown::Logistics(
                LogisticsScorer::new(LogisticsConfig::default())
                    .unwrap()
                    .analyze(datasets)
                    .unwrap(),
            ),
            CategoryBreakdown::Market(MarketScorer::default().analyze(datasets)),
            CategoryBreakdown::Ensemble(EnsembleAnalysis::neutral()),
        ];
        let table = score_table(&breakdowns).unwrap();
        let weights = CategoryWeights::new([0.25, 0.15, 0.40, 0.20]);
        let optimization = OptimizationResult {
            weights,
            final_scores: weights.combine(&table),
            objective: 0.1,
            generations: 12,
            evaluations: 960,
            converged: true,
        };
        DecisionCompiler::default().compile(
            optimization,
            table,
            breakdowns,
            &AnalysisConfig::default().cities,
            vec!["Robust scaling (median/IQR)".to_string()],
        )
    }

    #[test]
    fn test_record_keys_scores_by_city_name() {
        let datasets = northeast();
        let decision = decision(&datasets);
        let record = DecisionRecord::new(&datasets, &decision);

        assert_eq!(decision.recommendation, Recommendation::City(City::A));
        assert_eq!(record.recommended_city, "Recife");
        assert_eq!(record.final_scores["Recife"], decision.final_scores.a);
        assert_eq!(record.category_scores["ml_ensemble"]["Salvador"], 0.5);
        assert_eq!(record.validation.region_count, 10);
        assert_eq!(record.optimizer.evaluations, 960);
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }

    #[test]
    fn test_write_json_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("decision.json");
        let datasets = northeast();
        let record = DecisionRecord::new(&datasets, &decision(&datasets));
        write_json(&path, &record).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["recommended_city"], "Recife");
        assert_eq!(json["optimized_weights"]["regional_market"], 0.40);
        assert_eq!(json["breakdowns"][0]["category"], "cost");
        assert_eq!(json["validation"]["route_count"]["a"], 8);
    }
}
