//! Stage drivers: per-season loops, artifact writing and the full run.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::artifacts::{read_clusters, read_scores, read_season_table, write_scores, write_season_table};
use crate::dataset_builder::{MlDataset, build_dataset, write_dataset};
use crate::error::{PipelineError, Result};
use crate::feature_extractor::extract_features;
use crate::layout::{DEFAULT_DATA_DIR, DataLayout};
use crate::parquet_io::file_digest;
use crate::rating_engine::{RatingEngine, apply_scores};
use crate::rating_weights::{RatingWeights, load_rating_weights};
use crate::raw_input::{load_gamelog, load_season_raw};
use crate::schema::RatingRecord;
use crate::season::{Season, SeasonRange};
use crate::season_aggregator::aggregate_season;

pub const STAGE_AGGREGATE: &str = "aggregate";
pub const STAGE_FEATURES: &str = "features";
pub const STAGE_RATINGS: &str = "ratings";
pub const STAGE_DATASET: &str = "dataset";

const DEFAULT_THREADS: usize = 4;
const MAX_THREADS: usize = 32;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub layout: DataLayout,
    pub seasons: SeasonRange,
    pub threads: usize,
    pub weights: RatingWeights,
}

impl PipelineConfig {
    pub fn new(layout: DataLayout, seasons: SeasonRange, weights: RatingWeights) -> Self {
        Self {
            layout,
            seasons,
            threads: 1,
            weights,
        }
    }

    /// Reads `NBA_DATA_DIR`, `NBA_SEASONS`, `PIPELINE_THREADS` and the weight
    /// table; `seasons_override` takes precedence over `NBA_SEASONS`.
    pub fn from_env(seasons_override: Option<SeasonRange>) -> Result<Self> {
        let root = env::var("NBA_DATA_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let seasons = match seasons_override {
            Some(range) => range,
            None => match env::var("NBA_SEASONS") {
                Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
                _ => SeasonRange::default(),
            },
        };
        let threads = env::var("PIPELINE_THREADS")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_THREADS)
            .clamp(1, MAX_THREADS);

        Ok(Self {
            layout: DataLayout::new(PathBuf::from(root)),
            seasons,
            threads,
            weights: load_rating_weights()?,
        })
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.clamp(1, MAX_THREADS);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageSummary {
    pub stage: String,
    pub seasons_total: usize,
    pub seasons_succeeded: usize,
    pub rows_written: usize,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl StageSummary {
    fn new(stage: &str, seasons_total: usize) -> Self {
        Self {
            stage: stage.to_string(),
            seasons_total,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub path: PathBuf,
    pub seasons_loaded: usize,
    pub joined_rows: usize,
    pub rows: usize,
    pub columns: usize,
    pub clusters_joined: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub data_dir: PathBuf,
    pub seasons: String,
    pub weights: String,
    pub stages: Vec<StageSummary>,
    pub dataset: DatasetSummary,
    /// Artifact file name to hex SHA-256.
    pub digests: BTreeMap<String, String>,
}

fn build_pool(threads: usize) -> Option<rayon::ThreadPool> {
    if threads <= 1 {
        return None;
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .ok()
}

fn with_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}

/// Runs `job` once per season in `seasons`. Season-local failures are logged
/// and recorded; any other failure aborts the stage. Results come back ordered
/// by season regardless of scheduling.
fn for_each_season<T, F>(
    config: &PipelineConfig,
    seasons: &[Season],
    stage: &str,
    job: F,
) -> Result<(BTreeMap<Season, T>, StageSummary)>
where
    T: Send,
    F: Fn(Season) -> Result<T> + Sync + Send,
{
    let mut summary = StageSummary::new(stage, seasons.len());
    let pool = build_pool(config.threads);

    let outcomes: Vec<(Season, Result<T>)> = with_pool(&pool, || {
        seasons
            .par_iter()
            .map(|season| (*season, job(*season)))
            .collect()
    });

    let mut done = BTreeMap::new();
    for (season, outcome) in outcomes {
        match outcome {
            Ok(value) => {
                done.insert(season, value);
            }
            Err(err) if err.is_recoverable() => {
                warn!(stage, season = %season, error = %err, "season skipped");
                summary.errors.push(format!("{season}: {err}"));
            }
            Err(err) => return Err(err),
        }
    }
    summary.seasons_succeeded = done.len();
    if done.is_empty() {
        return Err(PipelineError::NoSeasons {
            stage: stage.to_string(),
        });
    }
    info!(
        stage,
        succeeded = summary.seasons_succeeded,
        total = summary.seasons_total,
        "stage finished"
    );
    Ok((done, summary))
}

/// Removes a curated season file left over from an earlier run.
fn discard_stale(layout: &DataLayout, season: Season) {
    let path = layout.player_season(season);
    if !path.exists() {
        return;
    }
    match fs::remove_file(&path) {
        Ok(()) => warn!(season = %season, path = %path.display(), "removed stale season file"),
        Err(err) => warn!(season = %season, error = %err, "stale season file not removed"),
    }
}

/// Raw game logs to `player_season_{season}.parquet`.
pub fn run_aggregation(config: &PipelineConfig) -> Result<StageSummary> {
    aggregate_seasons(config, &config.seasons.seasons()).map(|(_, summary)| summary)
}

fn aggregate_seasons(
    config: &PipelineConfig,
    seasons: &[Season],
) -> Result<(Vec<Season>, StageSummary)> {
    let layout = &config.layout;
    let (done, mut summary) = for_each_season(config, seasons, STAGE_AGGREGATE, |season| {
        let table = match load_season_raw(layout, season).and_then(|raw| aggregate_season(&raw)) {
            Ok(table) => table,
            Err(err) => {
                discard_stale(layout, season);
                return Err(err);
            }
        };
        let rows = write_season_table(&layout.player_season(season), &table)?;
        info!(season = %season, rows, "aggregated season");
        Ok(rows)
    })?;
    summary.rows_written = done.values().sum();
    Ok((done.into_keys().collect(), summary))
}

/// Adds the derived columns to each aggregated season file in place.
pub fn run_feature_extraction(config: &PipelineConfig) -> Result<StageSummary> {
    extract_seasons(config, &config.seasons.seasons()).map(|(_, summary)| summary)
}

fn extract_seasons(
    config: &PipelineConfig,
    seasons: &[Season],
) -> Result<(Vec<Season>, StageSummary)> {
    let layout = &config.layout;
    let (done, mut summary) = for_each_season(config, seasons, STAGE_FEATURES, |season| {
        let path = layout.player_season(season);
        let table = read_season_table(&path, season)?;
        let log = load_gamelog(&layout.raw_gamelog(season), season)?;
        let featured = extract_features(&table, &log);
        let rows = write_season_table(&path, &featured)?;
        info!(season = %season, rows, columns = featured.features.len(), "features extracted");
        Ok(rows)
    })?;
    summary.rows_written = done.values().sum();
    Ok((done.into_keys().collect(), summary))
}

/// Rates every season, writes `score_100` back into the season files and
/// writes the concatenated `all_seasons_scores.parquet`.
pub fn run_ratings(config: &PipelineConfig) -> Result<StageSummary> {
    rate_seasons(config, &config.seasons.seasons()).map(|(_, summary)| summary)
}

fn rate_seasons(
    config: &PipelineConfig,
    seasons: &[Season],
) -> Result<(Vec<Season>, StageSummary)> {
    let layout = &config.layout;
    let engine = RatingEngine::new(&config.weights);
    let (done, mut summary) = for_each_season(config, seasons, STAGE_RATINGS, |season| {
        let path = layout.player_season(season);
        let table = read_season_table(&path, season)?;
        let rating = engine.rate_season(&table)?;
        write_season_table(&path, &apply_scores(&table, &rating))?;
        info!(
            season = %season,
            players = rating.records.len(),
            used = rating.used.len(),
            "season rated"
        );
        Ok(rating)
    })?;

    let mut records: Vec<RatingRecord> = Vec::new();
    for (season, rating) in &done {
        if rating.degenerate {
            summary
                .notes
                .push(format!("{season}: no spread, all players scored 50"));
        }
        records.extend(rating.records.iter().copied());
    }
    summary.rows_written = write_scores(&layout.all_scores(), &records)?;
    Ok((done.into_keys().collect(), summary))
}

/// Joins every available season with the scores and writes `dataset_ml.parquet`.
pub fn run_dataset(config: &PipelineConfig) -> Result<DatasetSummary> {
    dataset_from_seasons(config, &config.seasons.seasons())
}

fn dataset_from_seasons(config: &PipelineConfig, seasons: &[Season]) -> Result<DatasetSummary> {
    let layout = &config.layout;
    let scores = read_scores(&layout.all_scores())?;

    let mut tables = Vec::new();
    for season in seasons.iter().copied() {
        match read_season_table(&layout.player_season(season), season) {
            Ok(table) => tables.push(table),
            Err(err) if err.is_recoverable() => {
                warn!(season = %season, error = %err, "season absent from dataset");
            }
            Err(err) => return Err(err),
        }
    }
    if tables.is_empty() {
        return Err(PipelineError::NoSeasons {
            stage: STAGE_DATASET.to_string(),
        });
    }

    let scores: Vec<RatingRecord> = scores
        .into_iter()
        .filter(|r| seasons.contains(&r.season))
        .collect();
    let clusters = read_clusters(&layout.clusters())?;
    let dataset = build_dataset(&scores, &tables, clusters.as_deref())?;

    let path = layout.dataset();
    let rows = write_dataset(&path, &dataset)?;
    info!(rows, path = %path.display(), "dataset written");

    Ok(DatasetSummary {
        path,
        seasons_loaded: tables.len(),
        joined_rows: dataset.joined_rows,
        rows,
        columns: MlDataset::column_names().len(),
        clusters_joined: clusters.is_some(),
    })
}

/// Every stage in order, followed by `run_summary.json` with artifact digests.
/// A season only reaches a stage if it succeeded in the one before.
pub fn run_all(config: &PipelineConfig) -> Result<RunSummary> {
    let started_at = Utc::now();
    let (aggregated, aggregate) = aggregate_seasons(config, &config.seasons.seasons())?;
    let (extracted, features) = extract_seasons(config, &aggregated)?;
    let (rated, ratings) = rate_seasons(config, &extracted)?;
    let dataset = dataset_from_seasons(config, &rated)?;
    let stages = vec![aggregate, features, ratings];

    let layout = &config.layout;
    let mut artifacts = vec![layout.all_scores(), layout.dataset()];
    artifacts.extend(rated.iter().map(|s| layout.player_season(*s)));
    let mut digests = BTreeMap::new();
    for path in artifacts {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        digests.insert(name, file_digest(&path)?);
    }

    let summary = RunSummary {
        started_at,
        finished_at: Utc::now(),
        data_dir: layout.root().to_path_buf(),
        seasons: config.seasons.to_string(),
        weights: format!("{} v{}", config.weights.name, config.weights.version),
        stages,
        dataset,
        digests,
    };
    let summary_path = layout.run_summary();
    if let Some(parent) = summary_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating_weights::default_weights;

    #[test]
    fn missing_raw_data_fails_with_no_seasons() {
        let root = std::env::temp_dir().join(format!("nba_rating_empty_{}", std::process::id()));
        let config = PipelineConfig::new(
            DataLayout::new(root),
            "2001..2002".parse().unwrap(),
            default_weights().unwrap().clone(),
        );
        match run_aggregation(&config) {
            Err(PipelineError::NoSeasons { stage }) => assert_eq!(stage, STAGE_AGGREGATE),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn thread_count_is_clamped() {
        let config = PipelineConfig::new(
            DataLayout::default(),
            SeasonRange::default(),
            default_weights().unwrap().clone(),
        );
        assert_eq!(config.clone().with_threads(0).threads, 1);
        assert_eq!(config.with_threads(500).threads, MAX_THREADS);
    }
}
