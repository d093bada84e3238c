//! Typed readers and writers for the curated parquet artifacts.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::parquet_io::{ColumnData, TableBuilder, read_int, read_num, read_rows, read_text, write_table};
use crate::schema::{
    COL_CLUSTER_ID, COL_CLUSTER_LABEL, COL_GAMES_PLAYED, COL_PLAYER_ID, COL_PLAYER_NAME,
    COL_POSITION, COL_SCORE_100, COL_SEASON, COL_TEAM_ID, ClusterRecord, Feature,
    PlayerSeasonRecord, RatingRecord, SeasonTable,
};
use crate::season::Season;

/// Writes a player-season table with identity columns first, then the
/// table's feature columns in canonical order, then `score_100` when rated.
pub fn write_season_table(path: &Path, table: &SeasonTable) -> Result<usize> {
    let rows = &table.rows;
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
        )
        .nullable(
            COL_TEAM_ID,
            ColumnData::Int64(rows.iter().map(|r| r.team_id).collect()),
        )
        .nullable(
            COL_POSITION,
            ColumnData::Utf8(rows.iter().map(|r| r.position.clone()).collect()),
        )
        .required(
            COL_GAMES_PLAYED,
            ColumnData::Int64(rows.iter().map(|r| Some(i64::from(r.games_played))).collect()),
        );

    for feature in Feature::ALL.into_iter().filter(|f| table.has(*f)) {
        builder.push_nullable(feature.column(), feature_column(feature, rows));
    }
    if table.has_score {
        builder.push_nullable(
            COL_SCORE_100,
            ColumnData::Float64(rows.iter().map(|r| r.score_100).collect()),
        );
    }
    write_table(path, builder)
}

pub(crate) fn feature_column(feature: Feature, rows: &[PlayerSeasonRecord]) -> ColumnData {
    if feature.is_integer() {
        ColumnData::Int64(
            rows.iter()
                .map(|r| r.get(feature).map(|v| v.round() as i64))
                .collect(),
        )
    } else {
        ColumnData::Float64(rows.iter().map(|r| r.get(feature)).collect())
    }
}

/// Reads a curated player-season table. The file must exist and carry the
/// identity columns plus every always-aggregated feature; anything else
/// found is loaded, anything else absent is recorded as absent.
pub fn read_season_table(path: &Path, season: Season) -> Result<SeasonTable> {
    if !path.exists() {
        return Err(PipelineError::missing_input(
            season,
            format!("{} not found", path.display()),
        ));
    }
    let table = read_rows(path)?;
    let cols = &table.columns;

    let mut required = vec![COL_PLAYER_ID];
    required.extend(Feature::REQUIRED.iter().map(|f| f.column()));
    let missing = cols.missing(&required);
    if !missing.is_empty() {
        return Err(PipelineError::schema_drift(
            path.display().to_string(),
            missing.into_iter().map(str::to_string).collect(),
        ));
    }

    let player_id = cols.position(COL_PLAYER_ID).unwrap_or_default();
    let player_name = cols.position(COL_PLAYER_NAME);
    let team_id = cols.position(COL_TEAM_ID);
    let position = cols.position(COL_POSITION);
    let games_played = cols.position(COL_GAMES_PLAYED);
    let score = cols.position(COL_SCORE_100);
    let features: Vec<(Feature, usize)> = cols
        .names()
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| Feature::from_column(name).map(|f| (f, idx)))
        .collect();

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut skipped = 0usize;
    for row in &table.rows {
        let Some(pid) = read_int(row, player_id) else {
            skipped += 1;
            continue;
        };
        let mut record = PlayerSeasonRecord::new(pid, season);
        record.player_name = player_name.and_then(|i| read_text(row, i));
        record.team_id = team_id.and_then(|i| read_int(row, i));
        record.position = position.and_then(|i| read_text(row, i));
        record.games_played = games_played
            .and_then(|i| read_int(row, i))
            .and_then(|gp| u32::try_from(gp).ok())
            .unwrap_or(0);
        for (feature, idx) in &features {
            record.values.set(*feature, read_num(row, *idx));
        }
        record.score_100 = score.and_then(|i| read_num(row, i));
        rows.push(record);
    }

    if skipped > 0 {
        warn!(season = %season, skipped, "player-season rows without PLAYER_ID ignored");
    }

    let feature_set: BTreeSet<Feature> = features.iter().map(|(f, _)| *f).collect();
    let mut out = SeasonTable::new(season, rows, feature_set);
    out.has_score = score.is_some();
    debug!(season = %season, rows = out.len(), columns = cols.names().len(), "loaded player-season table");
    Ok(out)
}

/// Concatenated ratings, ordered by season then player.
pub fn write_scores(path: &Path, scores: &[RatingRecord]) -> Result<usize> {
    let mut sorted = scores.to_vec();
    sorted.sort_by_key(|r| (r.season, r.player_id));
    let builder = TableBuilder::new()
        .required(
            COL_PLAYER_ID,
            ColumnData::Int64(sorted.iter().map(|r| Some(r.player_id)).collect()),
        )
        .required(
            COL_SEASON,
            ColumnData::Utf8(sorted.iter().map(|r| Some(r.season.label())).collect()),
        )
        .required(
            COL_SCORE_100,
            ColumnData::Float64(sorted.iter().map(|r| Some(r.score_100)).collect()),
        );
    write_table(path, builder)
}

pub fn read_scores(path: &Path) -> Result<Vec<RatingRecord>> {
    if !path.exists() {
        return Err(PipelineError::MissingInput {
            season: None,
            detail: format!("{} not found", path.display()),
        });
    }
    let table = read_rows(path)?;
    let missing = table
        .columns
        .missing(&[COL_PLAYER_ID, COL_SEASON, COL_SCORE_100]);
    if !missing.is_empty() {
        return Err(PipelineError::schema_drift(
            path.display().to_string(),
            missing.into_iter().map(str::to_string).collect(),
        ));
    }
    let pid = table.columns.position(COL_PLAYER_ID).unwrap_or_default();
    let season = table.columns.position(COL_SEASON).unwrap_or_default();
    let score = table.columns.position(COL_SCORE_100).unwrap_or_default();

    let mut out = Vec::with_capacity(table.rows.len());
    let mut skipped = 0usize;
    for row in &table.rows {
        let parsed = (
            read_int(row, pid),
            read_text(row, season).and_then(|s| s.parse::<Season>().ok()),
            read_num(row, score),
        );
        match parsed {
            (Some(player_id), Some(season), Some(score_100)) => out.push(RatingRecord {
                player_id,
                season,
                score_100,
            }),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "score rows with missing key or value ignored");
    }
    Ok(out)
}

/// Cluster metadata, or `None` when the optional file is absent. Duplicate
/// (player, season) keys keep the first row.
pub fn read_clusters(path: &Path) -> Result<Option<Vec<ClusterRecord>>> {
    if !path.exists() {
        return Ok(None);
    }
    let table = read_rows(path)?;
    let missing = table
        .columns
        .missing(&[COL_PLAYER_ID, COL_SEASON, COL_CLUSTER_ID]);
    if !missing.is_empty() {
        return Err(PipelineError::schema_drift(
            path.display().to_string(),
            missing.into_iter().map(str::to_string).collect(),
        ));
    }
    let pid = table.columns.position(COL_PLAYER_ID).unwrap_or_default();
    let season = table.columns.position(COL_SEASON).unwrap_or_default();
    let cluster_id = table.columns.position(COL_CLUSTER_ID).unwrap_or_default();
    let label = table.columns.position(COL_CLUSTER_LABEL);

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for row in &table.rows {
        let key = (
            read_int(row, pid),
            read_text(row, season).and_then(|s| s.parse::<Season>().ok()),
        );
        let (Some(player_id), Some(season)) = key else {
            continue;
        };
        if !seen.insert((player_id, season)) {
            continue;
        }
        out.push(ClusterRecord {
            player_id,
            season,
            cluster_id: read_int(row, cluster_id),
            cluster_label: label.and_then(|i| read_text(row, i)),
        });
    }
    Ok(Some(out))
}

pub fn write_clusters(path: &Path, clusters: &[ClusterRecord]) -> Result<usize> {
    let builder = TableBuilder::new()
        .required(
            COL_PLAYER_ID,
            ColumnData::Int64(clusters.iter().map(|c| Some(c.player_id)).collect()),
        )
        .required(
            COL_SEASON,
            ColumnData::Utf8(clusters.iter().map(|c| Some(c.season.label())).collect()),
        )
        .nullable(
            COL_CLUSTER_ID,
            ColumnData::Int64(clusters.iter().map(|c| c.cluster_id).collect()),
        )
        .nullable(
            COL_CLUSTER_LABEL,
            ColumnData::Utf8(clusters.iter().map(|c| c.cluster_label.clone()).collect()),
        );
    write_table(path, builder)
}
