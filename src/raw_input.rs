//! Loaders for the raw per-season files written by the external collector.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::layout::DataLayout;
use crate::parquet_io::{ColumnMap, read_int, read_num, read_rows, read_text};
use crate::schema::Feature;
use crate::season::Season;

pub const GAMELOG_REQUIRED: [&str; 14] = [
    "PLAYER_ID",
    "GAME_ID",
    "MIN",
    "PTS",
    "REB",
    "AST",
    "STL",
    "BLK",
    "TOV",
    "FGM",
    "FGA",
    "FG3M",
    "FTA",
    "PLUS_MINUS",
];

const LBS_PER_KG: f64 = 2.205;
const CM_PER_FOOT: f64 = 30.48;
const CM_PER_INCH: f64 = 2.54;

/// One player's box score in one game.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameLogRow {
    pub player_id: i64,
    pub player_name: Option<String>,
    pub team_id: Option<i64>,
    pub game_id: String,
    pub min: Option<f64>,
    pub pts: Option<f64>,
    pub reb: Option<f64>,
    pub ast: Option<f64>,
    pub stl: Option<f64>,
    pub blk: Option<f64>,
    pub tov: Option<f64>,
    pub fgm: Option<f64>,
    pub fga: Option<f64>,
    pub fg3m: Option<f64>,
    pub fg3a: Option<f64>,
    pub ftm: Option<f64>,
    pub fta: Option<f64>,
    pub plus_minus: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonGameLog {
    pub season: Season,
    pub rows: Vec<GameLogRow>,
    pub has_fg3a: bool,
    pub has_ftm: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysRow {
    pub position: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub age: Option<f64>,
    pub exp: Option<f64>,
}

/// Roster attributes keyed by player, with the physical columns the file carried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysTable {
    pub rows: HashMap<i64, PhysRow>,
    pub features: BTreeSet<Feature>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonRawInputs {
    pub gamelog: SeasonGameLog,
    pub phys: Option<PhysTable>,
    pub esv: Option<HashMap<i64, f64>>,
    pub pace: Option<HashMap<i64, f64>>,
}

pub fn load_season_raw(layout: &DataLayout, season: Season) -> Result<SeasonRawInputs> {
    let gamelog = load_gamelog(&layout.raw_gamelog(season), season)?;

    let phys_path = layout.raw_phys(season);
    let phys = if phys_path.exists() {
        Some(load_phys(&phys_path, season)?)
    } else {
        warn!(season = %season, "no roster file, physical attributes unavailable");
        None
    };

    let esv = load_optional_keyed(&layout.raw_esv(season), season, "PLAYER_ID", "esv_mean")?;
    let pace = load_optional_keyed(&layout.raw_pace(season), season, "TEAM_ID", "pace")?;

    Ok(SeasonRawInputs {
        gamelog,
        phys,
        esv,
        pace,
    })
}

pub fn load_gamelog(path: &Path, season: Season) -> Result<SeasonGameLog> {
    if !path.exists() {
        return Err(PipelineError::missing_input(
            season,
            format!("gamelog file {} not found", path.display()),
        ));
    }
    let table = read_rows(path)?;
    require_columns(&table.columns, &GAMELOG_REQUIRED, season, path)?;

    let col = |name: &str| table.columns.position(name);
    let idx = |name: &str| col(name).unwrap_or_default();
    let (player_id, game_id) = (idx("PLAYER_ID"), idx("GAME_ID"));
    let (player_name, team_id) = (col("PLAYER_NAME"), col("TEAM_ID"));
    let (fg3a, ftm) = (col("FG3A"), col("FTM"));

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut skipped = 0usize;
    for row in &table.rows {
        let (Some(pid), Some(gid)) = (read_int(row, player_id), read_text(row, game_id)) else {
            skipped += 1;
            continue;
        };
        let num = |name: &str| read_num(row, idx(name));
        rows.push(GameLogRow {
            player_id: pid,
            player_name: player_name.and_then(|i| read_text(row, i)),
            team_id: team_id.and_then(|i| read_int(row, i)),
            game_id: gid,
            min: num("MIN"),
            pts: num("PTS"),
            reb: num("REB"),
            ast: num("AST"),
            stl: num("STL"),
            blk: num("BLK"),
            tov: num("TOV"),
            fgm: num("FGM"),
            fga: num("FGA"),
            fg3m: num("FG3M"),
            fg3a: fg3a.and_then(|i| read_num(row, i)),
            ftm: ftm.and_then(|i| read_num(row, i)),
            fta: num("FTA"),
            plus_minus: num("PLUS_MINUS"),
        });
    }
    if skipped > 0 {
        debug!(season = %season, skipped, "gamelog rows without player or game id");
    }

    Ok(SeasonGameLog {
        season,
        rows,
        has_fg3a: fg3a.is_some(),
        has_ftm: ftm.is_some(),
    })
}

pub fn load_phys(path: &Path, season: Season) -> Result<PhysTable> {
    let table = read_rows(path)?;
    require_columns(&table.columns, &["PLAYER_ID"], season, path)?;
    let cols = &table.columns;

    let player_id = cols.position("PLAYER_ID").unwrap_or_default();
    let position = cols.position("POSITION");
    let height_cm = cols.position("height_cm");
    let height_raw = cols.position("HEIGHT");
    let weight_kg = cols.position("weight_kg");
    let weight_raw = cols.position("WEIGHT");
    let bmi = cols.position("bmi");
    let age = cols.position_any(&["age", "AGE"]);
    let exp = cols.position_any(&["exp", "EXP"]);

    let mut features = BTreeSet::new();
    let has_height = height_cm.is_some() || height_raw.is_some();
    let has_weight = weight_kg.is_some() || weight_raw.is_some();
    if has_height {
        features.insert(Feature::HeightCm);
    }
    if has_weight {
        features.insert(Feature::WeightKg);
    }
    if bmi.is_some() || (has_height && has_weight) {
        features.insert(Feature::Bmi);
    }
    if age.is_some() {
        features.insert(Feature::Age);
    }
    if exp.is_some() {
        features.insert(Feature::Exp);
    }

    let mut rows = HashMap::with_capacity(table.rows.len());
    for row in &table.rows {
        let Some(pid) = read_int(row, player_id) else {
            continue;
        };
        let height = height_cm
            .and_then(|i| read_num(row, i))
            .or_else(|| height_raw.and_then(|i| read_text(row, i)).and_then(|h| parse_height_cm(&h)));
        let weight = weight_kg
            .and_then(|i| read_num(row, i))
            .or_else(|| weight_raw.and_then(|i| read_num(row, i)).map(|lbs| lbs / LBS_PER_KG));
        let body_mass = bmi
            .and_then(|i| read_num(row, i))
            .or_else(|| body_mass_index(height, weight));
        let experience = exp.map(|i| parse_experience(row, i));

        rows.entry(pid).or_insert(PhysRow {
            position: position.and_then(|i| read_text(row, i)),
            height_cm: height,
            weight_kg: weight,
            bmi: body_mass,
            age: age.and_then(|i| read_num(row, i)),
            exp: experience,
        });
    }

    Ok(PhysTable { rows, features })
}

/// `"6-8"` (feet-inches) to centimetres.
pub fn parse_height_cm(raw: &str) -> Option<f64> {
    let (feet, inches) = raw.trim().split_once('-')?;
    let feet = feet.trim().parse::<u32>().ok()?;
    let inches = inches.trim().parse::<u32>().ok()?;
    Some(f64::from(feet) * CM_PER_FOOT + f64::from(inches) * CM_PER_INCH)
}

pub fn body_mass_index(height_cm: Option<f64>, weight_kg: Option<f64>) -> Option<f64> {
    let metres = height_cm? / 100.0;
    if metres <= 0.0 {
        return None;
    }
    Some(weight_kg? / (metres * metres))
}

/// Years in the league; rookies (`"R"`) and unknowns count as 0.
fn parse_experience(row: &parquet::record::Row, idx: usize) -> f64 {
    read_num(row, idx)
        .filter(|v| *v >= 0.0)
        .map(f64::trunc)
        .unwrap_or(0.0)
}

fn load_optional_keyed(
    path: &Path,
    season: Season,
    key: &str,
    value: &str,
) -> Result<Option<HashMap<i64, f64>>> {
    if !path.exists() {
        debug!(season = %season, file = %path.display(), "optional context file absent");
        return Ok(None);
    }
    let table = read_rows(path)?;
    require_columns(&table.columns, &[key, value], season, path)?;
    let key_idx = table.columns.position(key).unwrap_or_default();
    let value_idx = table.columns.position(value).unwrap_or_default();

    let mut out = HashMap::with_capacity(table.rows.len());
    for row in &table.rows {
        if let (Some(k), Some(v)) = (read_int(row, key_idx), read_num(row, value_idx)) {
            out.entry(k).or_insert(v);
        }
    }
    Ok(Some(out))
}

fn require_columns(columns: &ColumnMap, required: &[&str], season: Season, path: &Path) -> Result<()> {
    let missing = columns.missing(required);
    if missing.is_empty() {
        return Ok(());
    }
    Err(PipelineError::missing_input(
        season,
        format!("{} lacks columns {:?}", path.display(), missing),
    ))
}
