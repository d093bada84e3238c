//! Supervised table: one row per player-season with a known next rating.
//!
//! Rows are partitioned by player and ordered by season before any shift, so
//! `target_note_n1` always comes from the same player's next recorded season
//! and `delta_score` from the previous one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::parquet_io::{ColumnData, TableBuilder, write_table};
use crate::schema::{
    COL_CLUSTER_ID, COL_CLUSTER_LABEL, COL_PLAYER_ID, COL_PLAYER_NAME, COL_SCORE_100, COL_SEASON,
    ClusterRecord, Feature, PlayerSeasonRecord, RatingRecord, SeasonTable,
};
use crate::season::Season;

pub const DATASET_ARTIFACT: &str = "dataset_ml";
pub const COL_NOTE_N: &str = "note_n";
pub const COL_TARGET: &str = "target_note_n1";
pub const COL_DELTA_SCORE: &str = "delta_score";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFeature {
    Score100,
    Base(Feature),
    DeltaScore,
}

impl DatasetFeature {
    pub fn column(self) -> &'static str {
        match self {
            DatasetFeature::Score100 => COL_SCORE_100,
            DatasetFeature::Base(f) => f.column(),
            DatasetFeature::DeltaScore => COL_DELTA_SCORE,
        }
    }
}

pub const DATASET_FEATURES: [DatasetFeature; 26] = [
    DatasetFeature::Score100,
    DatasetFeature::Base(Feature::PtsMean),
    DatasetFeature::Base(Feature::RebMean),
    DatasetFeature::Base(Feature::AstMean),
    DatasetFeature::Base(Feature::PlusMinusMean),
    DatasetFeature::Base(Feature::EfgPct),
    DatasetFeature::Base(Feature::TsPct),
    DatasetFeature::Base(Feature::StlMean),
    DatasetFeature::Base(Feature::BlkMean),
    DatasetFeature::Base(Feature::TovMean),
    DatasetFeature::Base(Feature::Pts36),
    DatasetFeature::Base(Feature::Reb36),
    DatasetFeature::Base(Feature::Ast36),
    DatasetFeature::Base(Feature::Stl36),
    DatasetFeature::Base(Feature::Blk36),
    DatasetFeature::Base(Feature::Tov36),
    DatasetFeature::Base(Feature::Pm36),
    DatasetFeature::Base(Feature::MinPerGame),
    DatasetFeature::Base(Feature::Avail),
    DatasetFeature::Base(Feature::EsvMean),
    DatasetFeature::Base(Feature::Pace),
    DatasetFeature::Base(Feature::HeightCm),
    DatasetFeature::Base(Feature::Bmi),
    DatasetFeature::Base(Feature::Age),
    DatasetFeature::Base(Feature::Exp),
    DatasetFeature::DeltaScore,
];

#[derive(Debug, Clone, PartialEq)]
pub struct MlDatasetRow {
    pub player_id: i64,
    pub season: Season,
    pub player_name: Option<String>,
    /// Values aligned with `DATASET_FEATURES`.
    pub features: [Option<f64>; DATASET_FEATURES.len()],
    pub note_n: Option<f64>,
    pub cluster_id: Option<i64>,
    pub cluster_label: Option<String>,
    pub target_note_n1: f64,
}

impl MlDatasetRow {
    pub fn feature(&self, feature: DatasetFeature) -> Option<f64> {
        DATASET_FEATURES
            .iter()
            .position(|f| *f == feature)
            .and_then(|idx| self.features[idx])
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MlDataset {
    pub rows: Vec<MlDatasetRow>,
    /// Joined player-seasons before dropping rows without a target.
    pub joined_rows: usize,
}

impl MlDataset {
    pub fn column_names() -> Vec<&'static str> {
        let mut names = vec![COL_PLAYER_ID, COL_SEASON, COL_PLAYER_NAME];
        names.extend(DATASET_FEATURES.iter().map(|f| f.column()));
        names.extend([COL_NOTE_N, COL_CLUSTER_ID, COL_CLUSTER_LABEL, COL_TARGET]);
        names
    }
}

#[derive(Debug, Default)]
struct Joined<'a> {
    record: Option<&'a PlayerSeasonRecord>,
    score: Option<f64>,
}

/// Joins ratings with per-season features and cluster metadata, shifts the
/// rating per player and keeps the rows with a defined target.
///
/// Fails with `SchemaDrift` when a dataset feature column is carried by no
/// season table; the feature list is never reduced silently.
pub fn build_dataset(
    scores: &[RatingRecord],
    seasons: &[SeasonTable],
    clusters: Option<&[ClusterRecord]>,
) -> Result<MlDataset> {
    check_feature_columns(scores, seasons)?;

    let mut joined: BTreeMap<(i64, Season), Joined> = BTreeMap::new();
    for table in seasons {
        for row in &table.rows {
            let entry = joined.entry((row.player_id, row.season)).or_default();
            entry.record = Some(row);
            if table.has_score && entry.score.is_none() {
                entry.score = row.score_100;
            }
        }
    }
    // Ratings table takes precedence over any score carried by the feature rows.
    for rating in scores {
        let entry = joined
            .entry((rating.player_id, rating.season))
            .or_default();
        entry.score = Some(rating.score_100);
    }

    let cluster_map: HashMap<(i64, Season), &ClusterRecord> = match clusters {
        Some(list) => {
            let mut map = HashMap::with_capacity(list.len());
            for c in list {
                map.entry((c.player_id, c.season)).or_insert(c);
            }
            map
        }
        None => {
            warn!("no cluster metadata, cluster columns left empty");
            HashMap::new()
        }
    };

    let names = latest_names(&joined);
    let exp_present = seasons.iter().any(|t| t.has(Feature::Exp));

    let mut partitions: BTreeMap<i64, Vec<(Season, &Joined)>> = BTreeMap::new();
    for ((player_id, season), row) in &joined {
        partitions
            .entry(*player_id)
            .or_default()
            .push((*season, row));
    }

    let mut rows = Vec::new();
    for (player_id, history) in &partitions {
        for (idx, (season, current)) in history.iter().enumerate() {
            let Some(target) = history.get(idx + 1).and_then(|(_, next)| next.score) else {
                continue;
            };
            let previous = idx
                .checked_sub(1)
                .and_then(|p| history.get(p))
                .and_then(|(_, prev)| prev.score);
            let delta = match (current.score, previous) {
                (Some(now), Some(before)) => Some(now - before),
                _ => None,
            };

            let mut features = [None; DATASET_FEATURES.len()];
            for (slot, feature) in features.iter_mut().zip(DATASET_FEATURES) {
                *slot = match feature {
                    DatasetFeature::Score100 => current.score,
                    DatasetFeature::DeltaScore => delta,
                    DatasetFeature::Base(Feature::Exp) if exp_present => current
                        .record
                        .map(|r| r.get(Feature::Exp).unwrap_or(0.0)),
                    DatasetFeature::Base(f) => current.record.and_then(|r| r.get(f)),
                };
            }

            let cluster = cluster_map.get(&(*player_id, *season));
            rows.push(MlDatasetRow {
                player_id: *player_id,
                season: *season,
                player_name: names.get(player_id).cloned(),
                features,
                note_n: current.score,
                cluster_id: cluster.and_then(|c| c.cluster_id),
                cluster_label: cluster.and_then(|c| c.cluster_label.clone()),
                target_note_n1: target,
            });
        }
    }

    info!(
        joined = joined.len(),
        rows = rows.len(),
        players = partitions.len(),
        "dataset assembled"
    );
    Ok(MlDataset {
        rows,
        joined_rows: joined.len(),
    })
}

fn check_feature_columns(scores: &[RatingRecord], seasons: &[SeasonTable]) -> Result<()> {
    let available: BTreeSet<Feature> = seasons
        .iter()
        .flat_map(|t| t.features.iter().copied())
        .collect();
    let has_score = !scores.is_empty() || seasons.iter().any(|t| t.has_score);

    let missing: Vec<String> = DATASET_FEATURES
        .iter()
        .filter(|f| match f {
            DatasetFeature::Score100 | DatasetFeature::DeltaScore => !has_score,
            DatasetFeature::Base(feature) => !available.contains(feature),
        })
        .map(|f| f.column().to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::schema_drift(DATASET_ARTIFACT, missing))
    }
}

/// Name from each player's most recent season with a non-empty name.
fn latest_names(joined: &BTreeMap<(i64, Season), Joined>) -> HashMap<i64, String> {
    let mut names = HashMap::new();
    for ((player_id, _), row) in joined {
        if let Some(name) = row.record.and_then(|r| r.player_name.as_ref()) {
            names.insert(*player_id, name.clone());
        }
    }
    names
}

pub fn write_dataset(path: &Path, dataset: &MlDataset) -> Result<usize> {
    let rows = &dataset.rows;
    let mut builder = TableBuilder::new()
        .required(
            COL_PLAYER_ID,
            ColumnData::Int64(rows.iter().map(|r| Some(r.player_id)).collect()),
        )
        .required(
            COL_SEASON,
            ColumnData::Utf8(rows.iter().map(|r| Some(r.season.label())).collect()),
        )
        .nullable(
            COL_PLAYER_NAME,
            ColumnData::Utf8(rows.iter().map(|r| r.player_name.clone()).collect()),
        );
    for (idx, feature) in DATASET_FEATURES.iter().enumerate() {
        let data = match feature {
            DatasetFeature::Base(f) if f.is_integer() => ColumnData::Int64(
                rows.iter()
                    .map(|r| r.features[idx].map(|v| v.round() as i64))
                    .collect(),
            ),
            _ => ColumnData::Float64(rows.iter().map(|r| r.features[idx]).collect()),
        };
        builder.push_nullable(feature.column(), data);
    }
    builder.push_nullable(
        COL_NOTE_N,
        ColumnData::Float64(rows.iter().map(|r| r.note_n).collect()),
    );
    builder.push_nullable(
        COL_CLUSTER_ID,
        ColumnData::Int64(rows.iter().map(|r| r.cluster_id).collect()),
    );
    builder.push_nullable(
        COL_CLUSTER_LABEL,
        ColumnData::Utf8(rows.iter().map(|r| r.cluster_label.clone()).collect()),
    );
    let builder = builder.required(
        COL_TARGET,
        ColumnData::Float64(rows.iter().map(|r| Some(r.target_note_n1)).collect()),
    );
    write_table(path, builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season_table(year: i32, players: &[(i64, &str)]) -> SeasonTable {
        let season = Season::new(year);
        let rows = players
            .iter()
            .map(|(id, name)| {
                let mut r = PlayerSeasonRecord::new(*id, season);
                r.player_name = (!name.is_empty()).then(|| name.to_string());
                for feature in Feature::ALL {
                    r.values.set(feature, Some(1.0));
                }
                r.values.set(Feature::Exp, None);
                r
            })
            .collect();
        SeasonTable::new(season, rows, Feature::ALL.into_iter().collect())
    }

    fn score(pid: i64, year: i32, value: f64) -> RatingRecord {
        RatingRecord {
            player_id: pid,
            season: Season::new(year),
            score_100: value,
        }
    }

    #[test]
    fn shift_and_backward_delta_stay_within_player() {
        let seasons = vec![
            season_table(2010, &[(1, "A"), (2, "B")]),
            season_table(2011, &[(1, "A"), (2, "B")]),
            season_table(2012, &[(1, "A2")]),
        ];
        let scores = vec![
            score(1, 2010, 40.0),
            score(1, 2011, 60.0),
            score(1, 2012, 90.0),
            score(2, 2010, 100.0),
            score(2, 2011, 0.0),
        ];
        let ds = build_dataset(&scores, &seasons, None).unwrap();
        let keys: Vec<_> = ds
            .rows
            .iter()
            .map(|r| (r.player_id, r.season.start_year(), r.target_note_n1))
            .collect();
        assert_eq!(keys, vec![(1, 2010, 60.0), (1, 2011, 90.0), (2, 2010, 0.0)]);
        assert_eq!(ds.joined_rows, 5);

        assert_eq!(ds.rows[0].feature(DatasetFeature::DeltaScore), None);
        assert_eq!(ds.rows[1].feature(DatasetFeature::DeltaScore), Some(20.0));
        assert_eq!(ds.rows[1].note_n, Some(60.0));
        assert_eq!(ds.rows[0].player_name.as_deref(), Some("A2"));
        assert_eq!(ds.rows[2].feature(DatasetFeature::Base(Feature::Exp)), Some(0.0));
    }

    #[test]
    fn scores_table_wins_over_carried_score() {
        let mut first = season_table(2010, &[(1, "A")]);
        first.has_score = true;
        first.rows[0].score_100 = Some(12.0);
        let mut second = season_table(2011, &[(1, "A")]);
        second.has_score = true;
        second.rows[0].score_100 = Some(13.0);
        let ds = build_dataset(&[score(1, 2011, 77.0)], &[first, second], None).unwrap();
        assert_eq!(ds.rows.len(), 1);
        assert_eq!(ds.rows[0].note_n, Some(12.0));
        assert_eq!(ds.rows[0].target_note_n1, 77.0);
    }

    #[test]
    fn scores_only_row_keeps_experience_missing() {
        // Player 2 has a 2010 score but no 2010 feature row.
        let seasons = vec![
            season_table(2010, &[(1, "A")]),
            season_table(2011, &[(1, "A"), (2, "B")]),
            season_table(2012, &[(2, "B")]),
        ];
        let scores = vec![
            score(1, 2010, 30.0),
            score(1, 2011, 40.0),
            score(2, 2010, 55.0),
            score(2, 2011, 65.0),
            score(2, 2012, 75.0),
        ];
        let ds = build_dataset(&scores, &seasons, None).unwrap();
        let exp = |pid: i64, year: i32| {
            ds.rows
                .iter()
                .find(|r| r.player_id == pid && r.season == Season::new(year))
                .map(|r| r.feature(DatasetFeature::Base(Feature::Exp)))
        };
        assert_eq!(exp(2, 2010), Some(None));
        assert_eq!(exp(2, 2011), Some(Some(0.0)));
        assert_eq!(exp(1, 2010), Some(Some(0.0)));
    }

    #[test]
    fn missing_feature_column_is_schema_drift() {
        let seasons = vec![season_table(2010, &[(1, "A")]).without(Feature::Bmi)];
        let err = build_dataset(&[score(1, 2010, 50.0)], &seasons, None).unwrap_err();
        match err {
            PipelineError::SchemaDrift { artifact, missing } => {
                assert_eq!(artifact, DATASET_ARTIFACT);
                assert_eq!(missing, vec!["bmi".to_string()]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn clusters_join_on_player_and_season() {
        let seasons = vec![season_table(2010, &[(1, "A")]), season_table(2011, &[(1, "A")])];
        let scores = vec![score(1, 2010, 10.0), score(1, 2011, 20.0)];
        let clusters = vec![ClusterRecord {
            player_id: 1,
            season: Season::new(2010),
            cluster_id: Some(3),
            cluster_label: Some("Stretch big".into()),
        }];
        let ds = build_dataset(&scores, &seasons, Some(&clusters)).unwrap();
        assert_eq!(ds.rows[0].cluster_id, Some(3));
        assert_eq!(ds.rows[0].cluster_label.as_deref(), Some("Stretch big"));
    }

    #[test]
    fn column_order_is_fixed() {
        let names = MlDataset::column_names();
        assert_eq!(names.len(), 33);
        assert_eq!(&names[..4], &["PLAYER_ID", "season", "player_name", "score_100"]);
        assert_eq!(names[28], "delta_score");
        assert_eq!(names[32], "target_note_n1");
    }
}
