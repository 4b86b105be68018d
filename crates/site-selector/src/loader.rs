//! Dataset loading and validation from CSV files
//!
//! Three datasets are required: per-city costs, per-region demographics and
//! per-origin routes. Critical gaps abort the run; gaps in secondary columns
//! are logged and filled with neutral values.

use crate::config::{DataConfig, RouteCostModel};
use crate::{
    mean, AnalysisError, City, CityIndicators, CityPair, CityProfile, RegionalIndicator, Result,
    RouteRecord,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Logical name of an input dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Costs,
    Demographics,
    Routes,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [DatasetKind::Costs, DatasetKind::Demographics, DatasetKind::Routes];

    pub fn name(&self) -> &'static str {
        match self {
            DatasetKind::Costs => "costs",
            DatasetKind::Demographics => "demographics",
            DatasetKind::Routes => "routes",
        }
    }

    fn file_name<'a>(&self, data: &'a DataConfig) -> &'a str {
        match self {
            DatasetKind::Costs => &data.costs_file,
            DatasetKind::Demographics => &data.demographics_file,
            DatasetKind::Routes => &data.routes_file,
        }
    }

    pub(crate) fn join(kinds: &[DatasetKind]) -> String {
        kinds.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw cost row (one per city)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CostRow {
    #[serde(rename = "cidade")]
    pub city: Option<String>,
    #[serde(rename = "custo_construcao")]
    pub construction_cost: Option<f64>,
    #[serde(rename = "preco_venda")]
    pub sale_price: Option<f64>,
    #[serde(rename = "populacao")]
    pub population: Option<f64>,
    #[serde(rename = "pib_per_capita")]
    pub gdp_per_capita: Option<f64>,
    #[serde(rename = "mercado_potencial_anual")]
    pub market_potential: Option<f64>,
    #[serde(rename = "densidade_demografica")]
    pub density: Option<f64>,
}

/// Raw route row
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteRow {
    #[serde(rename = "origem")]
    pub origin: Option<String>,
    #[serde(rename = "destino")]
    pub destination: Option<String>,
    #[serde(rename = "distancia_km")]
    pub distance_km: Option<f64>,
    #[serde(rename = "tempo_horas")]
    pub time_hours: Option<f64>,
    #[serde(rename = "custo_total_estimado")]
    pub total_cost: Option<f64>,
}

/// Raw demographic row (one per neighboring region)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionRow {
    #[serde(rename = "Estado")]
    pub region: Option<String>,
    #[serde(rename = "Populacao")]
    pub population: Option<f64>,
    #[serde(rename = "Consumo_Bilhoes")]
    pub consumption_billions: Option<f64>,
    #[serde(rename = "Renda_Mensal")]
    pub monthly_income: Option<f64>,
    #[serde(rename = "PIB_Per_Capita")]
    pub gdp_per_capita: Option<f64>,
    #[serde(rename = "Score_Atratividade")]
    pub attractiveness_score: Option<f64>,
    #[serde(rename = "Distancia_Recife")]
    pub distance_to_city_a: Option<f64>,
    #[serde(rename = "Distancia_Salvador")]
    pub distance_to_city_b: Option<f64>,
}

/// Explicit dataset locations; `None` falls back to the configured search directories
#[derive(Debug, Clone, Default)]
pub struct DatasetPaths {
    pub costs: Option<PathBuf>,
    pub demographics: Option<PathBuf>,
    pub routes: Option<PathBuf>,
}

impl DatasetPaths {
    /// Look every dataset up by name inside a single directory
    pub fn in_dir(dir: impl AsRef<Path>, data: &DataConfig) -> Self {
        let dir = dir.as_ref();
        Self {
            costs: Some(dir.join(&data.costs_file)),
            demographics: Some(dir.join(&data.demographics_file)),
            routes: Some(dir.join(&data.routes_file)),
        }
    }

    fn explicit(&self, kind: DatasetKind) -> Option<&PathBuf> {
        match kind {
            DatasetKind::Costs => self.costs.as_ref(),
            DatasetKind::Demographics => self.demographics.as_ref(),
            DatasetKind::Routes => self.routes.as_ref(),
        }
    }
}

/// Resolved, existing dataset files
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub costs: PathBuf,
    pub demographics: PathBuf,
    pub routes: PathBuf,
}

/// Locate the three datasets, failing with every missing one listed
pub fn resolve_paths(paths: &DatasetPaths, data: &DataConfig) -> Result<ResolvedPaths> {
    let locate = |kind: DatasetKind| -> Option<PathBuf> {
        let found = match paths.explicit(kind) {
            Some(path) => path.is_file().then(|| path.clone()),
            None => data
                .search_dirs
                .iter()
                .map(|dir| dir.join(kind.file_name(data)))
                .find(|path| path.is_file()),
        };
        match &found {
            Some(path) => debug!("Resolved {} dataset at {:?}", kind, path),
            None => warn!("Dataset {} not found", kind),
        }
        found
    };

    match (
        locate(DatasetKind::Costs),
        locate(DatasetKind::Demographics),
        locate(DatasetKind::Routes),
    ) {
        (Some(costs), Some(demographics), Some(routes)) => Ok(ResolvedPaths {
            costs,
            demographics,
            routes,
        }),
        (costs, demographics, routes) => {
            let missing = [
                (DatasetKind::Costs, costs.is_none()),
                (DatasetKind::Demographics, demographics.is_none()),
                (DatasetKind::Routes, routes.is_none()),
            ]
            .into_iter()
            .filter_map(|(kind, missing)| missing.then_some(kind))
            .collect();
            Err(AnalysisError::MissingDataset(missing))
        }
    }
}

fn read_rows<T: for<'de> Deserialize<'de>>(kind: DatasetKind, path: &Path) -> Result<Vec<T>> {
    info!("Loading {} dataset from {:?}", kind, path);
    let reader = BufReader::new(File::open(path)?);
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let rows = csv_reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()?;
    info!("   ✓ {}: {} records", kind, rows.len());
    Ok(rows)
}

pub fn load_costs(path: impl AsRef<Path>) -> Result<Vec<CostRow>> {
    read_rows(DatasetKind::Costs, path.as_ref())
}

pub fn load_routes(path: impl AsRef<Path>) -> Result<Vec<RouteRow>> {
    read_rows(DatasetKind::Routes, path.as_ref())
}

pub fn load_demographics(path: impl AsRef<Path>) -> Result<Vec<RegionRow>> {
    read_rows(DatasetKind::Demographics, path.as_ref())
}

/// Resolve, read and validate all three datasets
pub fn load_datasets(
    paths: &DatasetPaths,
    cities: &CityPair<CityProfile>,
    data: &DataConfig,
) -> Result<Datasets> {
    let resolved = resolve_paths(paths, data)?;
    let costs = load_costs(&resolved.costs)?;
    let regions = load_demographics(&resolved.demographics)?;
    let routes = load_routes(&resolved.routes)?;

    Datasets::from_rows(cities.clone(), costs, routes, regions, &data.route_costs)
}

/// Validated inputs of one analysis run
#[derive(Debug, Clone, Serialize)]
pub struct Datasets {
    pub cities: CityPair<CityProfile>,
    pub costs: CityPair<CityIndicators>,
    pub routes: CityPair<Vec<RouteRecord>>,
    pub regions: Vec<RegionalIndicator>,
}

/// Headline figures recorded alongside the decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub construction_cost: CityPair<f64>,
    pub population: CityPair<f64>,
    pub route_count: CityPair<usize>,
    pub mean_route_distance_km: CityPair<f64>,
    pub region_count: usize,
}

impl Datasets {
    /// Validate raw rows into typed records
    pub fn from_rows(
        cities: CityPair<CityProfile>,
        costs: Vec<CostRow>,
        routes: Vec<RouteRow>,
        regions: Vec<RegionRow>,
        route_costs: &RouteCostModel,
    ) -> Result<Self> {
        info!("Running sanity checks...");

        let costs = CityPair::try_from_fn(|city| city_indicators(cities.get(city), &costs))?;
        let routes = validate_routes(&cities, routes, route_costs)?;
        let regions = validate_regions(regions);

        for city in City::ALL {
            let ind = costs.get(city);
            info!(
                "   {}: construction {:.0}/m², population {:.0}, {} routes",
                ind.city,
                ind.construction_cost_per_area,
                ind.population,
                routes.get(city).len()
            );
        }

        Ok(Self {
            cities,
            costs,
            routes,
            regions,
        })
    }

    /// Profile of one candidate
    pub fn city(&self, city: City) -> &CityProfile {
        self.cities.get(city)
    }

    pub fn validation_summary(&self) -> ValidationSummary {
        ValidationSummary {
            construction_cost: self.costs.map(|c| c.construction_cost_per_area),
            population: self.costs.map(|c| c.population),
            route_count: self.routes.map(|r| r.len()),
            mean_route_distance_km: self
                .routes
                .map(|r| mean(&r.iter().map(|route| route.distance_km).collect::<Vec<_>>())),
            region_count: self.regions.len(),
        }
    }
}

fn city_indicators(profile: &CityProfile, rows: &[CostRow]) -> Result<CityIndicators> {
    let mut matching = rows
        .iter()
        .filter(|row| row.city.as_deref().map(str::trim) == Some(profile.name.as_str()));

    let row = matching.next().ok_or_else(|| AnalysisError::MissingCity {
        dataset: DatasetKind::Costs,
        city: profile.name.clone(),
    })?;
    let duplicates = matching.count();
    if duplicates > 0 {
        warn!("{} extra cost rows for {}, using the first", duplicates, profile.name);
    }

    let critical = |value: Option<f64>, column: &'static str| -> Result<f64> {
        match value {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(AnalysisError::NullCritical {
                column,
                city: profile.name.clone(),
            }),
        }
    };
    let secondary = |value: Option<f64>, column: &str| -> f64 {
        match value {
            Some(v) if v.is_finite() => v,
            _ => {
                warn!("Null value in {} for {}, treating as 0", column, profile.name);
                0.0
            }
        }
    };

    Ok(CityIndicators {
        city: profile.name.clone(),
        construction_cost_per_area: critical(row.construction_cost, "custo_construcao")?,
        sale_price_per_area: critical(row.sale_price, "preco_venda")?,
        population: critical(row.population, "populacao")?,
        gdp_per_capita: critical(row.gdp_per_capita, "pib_per_capita")?,
        annual_market_potential: secondary(row.market_potential, "mercado_potencial_anual"),
        population_density: secondary(row.density, "densidade_demografica"),
    })
}

fn validate_routes(
    cities: &CityPair<CityProfile>,
    rows: Vec<RouteRow>,
    route_costs: &RouteCostModel,
) -> Result<CityPair<Vec<RouteRecord>>> {
    let mut routes: CityPair<Vec<RouteRecord>> = CityPair::default();
    let mut skipped = 0;
    let mut ignored = 0;

    for row in rows {
        let origin = match row.origin.as_deref().map(str::trim) {
            Some(origin) => origin.to_string(),
            None => {
                skipped += 1;
                continue;
            }
        };
        let city = match City::ALL.into_iter().find(|c| cities.get(*c).name == origin) {
            Some(city) => city,
            None => {
                ignored += 1;
                continue;
            }
        };
        let destination = row.destination.unwrap_or_else(|| "Unknown".to_string());

        let (distance_km, travel_time_hours) = match (row.distance_km, row.time_hours) {
            (Some(d), Some(t)) if d.is_finite() && t.is_finite() && d >= 0.0 && t >= 0.0 => (d, t),
            _ => {
                warn!("Skipping route {} → {}: missing distance or time", origin, destination);
                skipped += 1;
                continue;
            }
        };

        let estimated_total_cost = match row.total_cost {
            Some(c) if c.is_finite() => c,
            _ => {
                let estimate = route_costs.estimate(distance_km);
                warn!(
                    "Route {} → {} has no cost, estimated {:.2} from distance",
                    origin, destination, estimate
                );
                estimate
            }
        };

        let record = RouteRecord {
            origin_city: origin,
            destination_region: destination,
            distance_km,
            travel_time_hours,
            estimated_total_cost,
        };
        match city {
            City::A => routes.a.push(record),
            City::B => routes.b.push(record),
        }
    }

    if ignored > 0 {
        debug!("Ignored {} routes from other origins", ignored);
    }
    if skipped > 0 {
        warn!("Skipped {} malformed routes", skipped);
    }

    for city in City::ALL {
        if routes.get(city).is_empty() {
            return Err(AnalysisError::NoRoutes(cities.get(city).name.clone()));
        }
    }

    Ok(routes)
}

fn validate_regions(rows: Vec<RegionRow>) -> Vec<RegionalIndicator> {
    let mut regions = Vec::with_capacity(rows.len());

    for row in rows {
        let name = match row.region {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => {
                warn!("Skipping demographic row without region name");
                continue;
            }
        };
        let (distance_to_city_a, distance_to_city_b) = match (row.distance_to_city_a, row.distance_to_city_b) {
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() => (a, b),
            _ => {
                warn!("Skipping region {}: missing distances", name);
                continue;
            }
        };
        let or_zero = |value: Option<f64>, column: &str| match value {
            Some(v) if v.is_finite() => v,
            _ => {
                warn!("Null value in {} for {}, treating as 0", column, name);
                0.0
            }
        };
        let population = or_zero(row.population, "Populacao");
        let consumption_billions = or_zero(row.consumption_billions, "Consumo_Bilhoes");

        regions.push(RegionalIndicator {
            region_name: name,
            population,
            monthly_income: row.monthly_income.filter(|v| v.is_finite()),
            gdp_per_capita: row.gdp_per_capita.filter(|v| v.is_finite()),
            consumption_billions,
            attractiveness_score: row.attractiveness_score.filter(|v| v.is_finite()),
            distance_to_city_a,
            distance_to_city_b,
        });
    }

    if regions.is_empty() {
        warn!("Demographic dataset has no usable regions");
    }

    regions
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! In-memory datasets shared by the scorer tests

    use super::*;
    use crate::config::AnalysisConfig;

    pub fn cost_row(city: &str, construction: f64, sale: f64, population: f64, gdp: f64, market: f64, density: f64) -> CostRow {
        CostRow {
            city: Some(city.to_string()),
            construction_cost: Some(construction),
            sale_price: Some(sale),
            population: Some(population),
            gdp_per_capita: Some(gdp),
            market_potential: Some(market),
            density: Some(density),
        }
    }

    pub fn route_row(origin: &str, destination: &str, distance: f64, hours: f64, cost: f64) -> RouteRow {
        RouteRow {
            origin: Some(origin.to_string()),
            destination: Some(destination.to_string()),
            distance_km: Some(distance),
            time_hours: Some(hours),
            total_cost: Some(cost),
        }
    }

    pub fn region_row(name: &str, population: f64, consumption: f64, dist_a: f64, dist_b: f64) -> RegionRow {
        RegionRow {
            region: Some(name.to_string()),
            population: Some(population),
            consumption_billions: Some(consumption),
            monthly_income: Some(2500.0),
            gdp_per_capita: Some(22000.0),
            attractiveness_score: Some(60.0),
            distance_to_city_a: Some(dist_a),
            distance_to_city_b: Some(dist_b),
        }
    }

    /// Northeast snapshot: Recife (A) is cheaper and more central than Salvador (B)
    pub fn northeast() -> Datasets {
        let config = AnalysisConfig::default();
        let costs = vec![
            cost_row("Recife", 1650.0, 7800.0, 1_488_920.0, 35_900.0, 27.5e9, 6_803.0),
            cost_row("Salvador", 1720.0, 7200.0, 2_417_678.0, 24_400.0, 38.1e9, 3_486.0),
        ];
        let routes = vec![
            route_row("Recife", "João Pessoa", 120.0, 1.8, 82.0),
            route_row("Recife", "Maceió", 255.0, 3.7, 174.0),
            route_row("Recife", "Natal", 285.0, 4.1, 195.0),
            route_row("Recife", "Aracaju", 500.0, 7.2, 341.0),
            route_row("Recife", "Fortaleza", 800.0, 11.0, 546.0),
            route_row("Recife", "Salvador", 840.0, 12.0, 574.0),
            route_row("Recife", "Teresina", 1140.0, 16.2, 778.0),
            route_row("Recife", "São Luís", 1575.0, 22.0, 1075.0),
            route_row("Salvador", "Aracaju", 325.0, 4.8, 222.0),
            route_row("Salvador", "Maceió", 580.0, 8.3, 396.0),
            route_row("Salvador", "Recife", 840.0, 12.0, 574.0),
            route_row("Salvador", "João Pessoa", 955.0, 13.5, 652.0),
            route_row("Salvador", "Natal", 1080.0, 15.1, 737.0),
            route_row("Salvador", "Teresina", 1160.0, 16.7, 792.0),
            route_row("Salvador", "Fortaleza", 1190.0, 16.9, 812.0),
            route_row("Salvador", "São Luís", 1600.0, 23.0, 1092.0),
        ];
        let regions = vec![
            region_row("Pernambuco", 9_058_931.0, 148.2, 0.0, 840.0),
            region_row("Bahia", 14_141_626.0, 214.9, 840.0, 0.0),
            region_row("Paraíba", 3_974_687.0, 61.0, 120.0, 955.0),
            region_row("Alagoas", 3_127_683.0, 49.5, 255.0, 580.0),
            region_row("Rio Grande do Norte", 3_302_729.0, 54.3, 285.0, 1080.0),
            region_row("Sergipe", 2_210_004.0, 34.7, 500.0, 325.0),
            region_row("Ceará", 8_794_957.0, 140.1, 800.0, 1190.0),
            region_row("Piauí", 3_271_199.0, 47.8, 1140.0, 1160.0),
            region_row("Maranhão", 6_776_699.0, 88.6, 1575.0, 1600.0),
            region_row("Minas Gerais", 20_539_989.0, 412.0, 2050.0, 1370.0),
        ];
        Datasets::from_rows(config.cities, costs, routes, regions, &config.data.route_costs).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::config::AnalysisConfig;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    const COSTS_CSV: &str = "\u{feff}cidade,uf,custo_construcao,preco_venda,populacao,pib_per_capita,mercado_potencial_anual,densidade_demografica\n\
Salvador,BA,1720.5,7200,2417678,24400,38100000000,3486.2\n\
Recife,PE,1650.1,7800,1488920,35900,27500000000,\n";

    const ROUTES_CSV: &str = "origem,destino,distancia_km,tempo_horas,custo_total_estimado\n\
Recife,João Pessoa,120,1.8,82\n\
Recife,Maceió,255,3.7,\n\
Recife,Natal,,4.1,195\n\
Salvador,Aracaju,325,4.8,222\n\
Fortaleza,Natal,520,7.5,355\n";

    const DEMO_CSV: &str = "Estado,Codigo_IBGE,Populacao,PIB_Per_Capita,Renda_Mensal,Consumo_Bilhoes,Score_Atratividade,Distancia_Recife,Distancia_Salvador\n\
Paraíba,25,3974687,19000,2100,61.0,55.2,120,955\n\
Sergipe,28,2210004,,1900,34.7,48.0,500,325\n";

    #[test]
    fn test_load_datasets_from_directory() {
        let dir = TempDir::new().unwrap();
        let config = AnalysisConfig::default();
        write(&dir, &config.data.costs_file, COSTS_CSV);
        write(&dir, &config.data.routes_file, ROUTES_CSV);
        write(&dir, &config.data.demographics_file, DEMO_CSV);

        let paths = DatasetPaths::in_dir(dir.path(), &config.data);
        let datasets = load_datasets(&paths, &config.cities, &config.data).unwrap();

        assert_eq!(datasets.costs.a.city, "Recife");
        assert!((datasets.costs.a.construction_cost_per_area - 1650.1).abs() < 1e-9);
        // Null density is non-critical
        assert_eq!(datasets.costs.a.population_density, 0.0);

        // Natal has no distance and is dropped, Fortaleza is not a candidate origin
        assert_eq!(datasets.routes.a.len(), 2);
        assert_eq!(datasets.routes.b.len(), 1);
        // Maceió cost is completed from the fuel/toll model
        let maceio = &datasets.routes.a[1];
        assert!((maceio.estimated_total_cost - config.data.route_costs.estimate(255.0)).abs() < 1e-9);

        assert_eq!(datasets.regions.len(), 2);
        assert_eq!(datasets.regions[1].gdp_per_capita, None);
    }

    #[test]
    fn test_missing_datasets_listed() {
        let dir = TempDir::new().unwrap();
        let config = AnalysisConfig::default();
        write(&dir, &config.data.costs_file, COSTS_CSV);

        let paths = DatasetPaths::in_dir(dir.path(), &config.data);
        match resolve_paths(&paths, &config.data) {
            Err(AnalysisError::MissingDataset(kinds)) => {
                assert_eq!(kinds, vec![DatasetKind::Demographics, DatasetKind::Routes]);
            }
            other => panic!("expected MissingDataset, got {:?}", other),
        }
    }

    #[test]
    fn test_null_critical_column_is_fatal() {
        let config = AnalysisConfig::default();
        let mut recife = cost_row("Recife", 1650.0, 7800.0, 1.0, 1.0, 1.0, 1.0);
        recife.sale_price = None;
        let costs = vec![recife, cost_row("Salvador", 1720.0, 7200.0, 1.0, 1.0, 1.0, 1.0)];
        let routes = vec![route_row("Recife", "X", 1.0, 1.0, 1.0), route_row("Salvador", "Y", 1.0, 1.0, 1.0)];

        let err = Datasets::from_rows(config.cities, costs, routes, vec![], &config.data.route_costs).unwrap_err();
        assert!(matches!(err, AnalysisError::NullCritical { column: "preco_venda", .. }));
    }

    #[test]
    fn test_missing_city_row() {
        let config = AnalysisConfig::default();
        let costs = vec![cost_row("Recife", 1650.0, 7800.0, 1.0, 1.0, 1.0, 1.0)];
        let err = Datasets::from_rows(config.cities, costs, vec![], vec![], &config.data.route_costs).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingCity { ref city, .. } if city == "Salvador"));
    }

    #[test]
    fn test_city_without_routes() {
        let config = AnalysisConfig::default();
        let costs = vec![
            cost_row("Recife", 1650.0, 7800.0, 1.0, 1.0, 1.0, 1.0),
            cost_row("Salvador", 1720.0, 7200.0, 1.0, 1.0, 1.0, 1.0),
        ];
        let routes = vec![route_row("Recife", "Natal", 285.0, 4.1, 195.0)];
        let err = Datasets::from_rows(config.cities, costs, routes, vec![], &config.data.route_costs).unwrap_err();
        assert!(matches!(err, AnalysisError::NoRoutes(ref city) if city == "Salvador"));
    }

    fn candidate_costs() -> Vec<CostRow> {
        vec![
            cost_row("Recife", 1650.0, 7800.0, 1_488_920.0, 35_900.0, 27.5e9, 6_803.0),
            cost_row("Salvador", 1720.0, 7200.0, 2_417_678.0, 24_400.0, 38.1e9, 3_486.0),
        ]
    }

    #[test]
    fn test_null_secondary_columns_become_zero() {
        let config = AnalysisConfig::default();
        let mut costs = candidate_costs();
        costs[0].market_potential = None;
        costs[1].density = Some(f64::NAN);
        let routes = vec![route_row("Recife", "Natal", 285.0, 4.1, 195.0), route_row("Salvador", "Aracaju", 325.0, 4.8, 222.0)];

        let datasets = Datasets::from_rows(config.cities, costs, routes, vec![], &config.data.route_costs).unwrap();
        assert_eq!(datasets.costs.a.annual_market_potential, 0.0);
        assert_eq!(datasets.costs.a.population_density, 6_803.0);
        assert_eq!(datasets.costs.b.population_density, 0.0);
        assert_eq!(datasets.costs.b.annual_market_potential, 38.1e9);
    }

    #[test]
    fn test_route_without_cost_is_estimated_from_distance() {
        let config = AnalysisConfig::default();
        let mut uncosted = route_row("Recife", "Maceió", 300.0, 4.2, 0.0);
        uncosted.total_cost = None;
        let routes = vec![uncosted, route_row("Salvador", "Aracaju", 325.0, 4.8, 222.0)];

        let datasets = Datasets::from_rows(config.cities, candidate_costs(), routes, vec![], &config.data.route_costs).unwrap();
        // 300 km: 25 l at 5.50 plus 45 in tolls
        assert!((datasets.routes.a[0].estimated_total_cost - 182.5).abs() < 1e-9);
        assert_eq!(datasets.routes.b[0].estimated_total_cost, 222.0);
    }

    #[test]
    fn test_routes_missing_distance_or_time_are_skipped() {
        let config = AnalysisConfig::default();
        let mut no_distance = route_row("Recife", "Natal", 0.0, 4.1, 195.0);
        no_distance.distance_km = None;
        let mut no_time = route_row("Salvador", "Maceió", 580.0, 0.0, 396.0);
        no_time.time_hours = None;
        let routes = vec![
            route_row("Recife", "João Pessoa", 120.0, 1.8, 82.0),
            no_distance,
            route_row("Recife", "Maceió", 255.0, 3.7, 174.0),
            no_time,
            route_row("Salvador", "Aracaju", 325.0, 4.8, 222.0),
        ];

        let datasets = Datasets::from_rows(config.cities, candidate_costs(), routes, vec![], &config.data.route_costs).unwrap();
        assert_eq!(datasets.validation_summary().route_count, CityPair::new(2, 1));
        assert!(datasets.routes.a.iter().all(|r| r.destination_region != "Natal"));
        assert_eq!(datasets.routes.b[0].destination_region, "Aracaju");
    }

    #[test]
    fn test_regions_missing_distances_are_skipped() {
        let config = AnalysisConfig::default();
        let mut no_a = region_row("Ceará", 8_794_957.0, 140.1, 800.0, 1190.0);
        no_a.distance_to_city_a = None;
        let mut no_b = region_row("Piauí", 3_271_199.0, 47.8, 1140.0, 1160.0);
        no_b.distance_to_city_b = None;
        let mut no_population = region_row("Sergipe", 0.0, 34.7, 500.0, 325.0);
        no_population.population = None;
        let regions = vec![region_row("Paraíba", 3_974_687.0, 61.0, 120.0, 955.0), no_a, no_b, no_population];
        let routes = vec![route_row("Recife", "Natal", 285.0, 4.1, 195.0), route_row("Salvador", "Aracaju", 325.0, 4.8, 222.0)];

        let datasets = Datasets::from_rows(config.cities, candidate_costs(), routes, regions, &config.data.route_costs).unwrap();
        let names: Vec<&str> = datasets.regions.iter().map(|r| r.region_name.as_str()).collect();
        assert_eq!(names, vec!["Paraíba", "Sergipe"]);
        assert_eq!(datasets.regions[1].population, 0.0);
        assert_eq!(datasets.validation_summary().region_count, 2);
    }

    #[test]
    fn test_validation_summary() {
        let datasets = northeast();
        let summary = datasets.validation_summary();
        assert_eq!(summary.route_count, CityPair::new(8, 8));
        assert!(summary.mean_route_distance_km.a < summary.mean_route_distance_km.b);
        assert_eq!(summary.region_count, 10);
    }
}
