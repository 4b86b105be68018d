//! Distribution Center Site Selection CLI
//!
//! Compares the two candidate cities and writes a JSON decision record.
//!
//! Usage:
//!   select-site --data-dir datasets_gerados \
//!               --config config/analysis.json \
//!               --output data/site_decision.json

use anyhow::Result;
use clap::Parser;
use site_selector::loader::DatasetPaths;
use site_selector::report::{self, DecisionRecord};
use site_selector::{AnalysisConfig, SiteAnalyzer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    name = "select-site",
    about = "Select the distribution center site between two candidate cities"
)]
struct Args {
    /// Directory holding the three datasets under their default file names
    #[arg(short = 'd', long)]
    data_dir: Option<PathBuf>,

    /// Path to the real-estate cost CSV
    #[arg(long)]
    costs: Option<PathBuf>,

    /// Path to the road routes CSV
    #[arg(long)]
    routes: Option<PathBuf>,

    /// Path to the neighboring-region demographics CSV
    #[arg(long)]
    demographics: Option<PathBuf>,

    /// Analysis configuration JSON (defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON file
    #[arg(short, long, default_value = "data/site_decision.json")]
    output: PathBuf,

    /// Seed for augmentation, model training and weight search
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins unless --verbose forces debug
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Distribution Center Site Selector");
    info!("{}", "=".repeat(60));

    let mut config = AnalysisConfig::load(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let mut paths = match &args.data_dir {
        Some(dir) => DatasetPaths::in_dir(dir, &config.data),
        None => DatasetPaths::default(),
    };
    paths.costs = args.costs.or(paths.costs);
    paths.routes = args.routes.or(paths.routes);
    paths.demographics = args.demographics.or(paths.demographics);

    info!(
        "Comparing {} and {}",
        config.cities.a.name, config.cities.b.name
    );
    let analyzer = SiteAnalyzer::new(config);
    let (datasets, decision) = analyzer.run(&paths)?;

    let record = DecisionRecord::new(&datasets, &decision);
    report::write_json(&args.output, &record)?;

    report::log_summary(&datasets, &decision);
    info!("\nResults saved to {:?}", args.output);

    Ok(())
}
