use std::collections::BTreeSet;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::season::Season;

pub const COL_PLAYER_ID: &str = "PLAYER_ID";
pub const COL_SEASON: &str = "season";
pub const COL_PLAYER_NAME: &str = "player_name";
pub const COL_TEAM_ID: &str = "TEAM_ID";
pub const COL_POSITION: &str = "POSITION";
pub const COL_GAMES_PLAYED: &str = "gp";
pub const COL_SCORE_100: &str = "score_100";
pub const COL_CLUSTER_ID: &str = "cluster_id";
pub const COL_CLUSTER_LABEL: &str = "cluster_label";

/// Regular season length used for `avail`.
pub const SEASON_GAMES: f64 = 82.0;

/// Numeric per-season columns of a `PlayerSeasonRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    PtsMean,
    RebMean,
    AstMean,
    PlusMinusMean,
    MinPerGame,
    MinTotal,
    Avail,
    HeightCm,
    WeightKg,
    Bmi,
    Age,
    Exp,
    EsvMean,
    Pace,
    EfgPct,
    TsPct,
    Fg2Pct,
    Fg3Pct,
    FtPct,
    StlMean,
    BlkMean,
    TovMean,
    Pts36,
    Reb36,
    Ast36,
    Stl36,
    Blk36,
    Tov36,
    Pm36,
    UsageRate,
    AstTovRatio,
}

impl Feature {
    pub const COUNT: usize = 31;

    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::PtsMean,
        Feature::RebMean,
        Feature::AstMean,
        Feature::PlusMinusMean,
        Feature::MinPerGame,
        Feature::MinTotal,
        Feature::Avail,
        Feature::HeightCm,
        Feature::WeightKg,
        Feature::Bmi,
        Feature::Age,
        Feature::Exp,
        Feature::EsvMean,
        Feature::Pace,
        Feature::EfgPct,
        Feature::TsPct,
        Feature::Fg2Pct,
        Feature::Fg3Pct,
        Feature::FtPct,
        Feature::StlMean,
        Feature::BlkMean,
        Feature::TovMean,
        Feature::Pts36,
        Feature::Reb36,
        Feature::Ast36,
        Feature::Stl36,
        Feature::Blk36,
        Feature::Tov36,
        Feature::Pm36,
        Feature::UsageRate,
        Feature::AstTovRatio,
    ];

    /// Always produced by the season aggregator, whatever the optional inputs.
    pub const BOX_SCORE: [Feature; 7] = [
        Feature::PtsMean,
        Feature::RebMean,
        Feature::AstMean,
        Feature::PlusMinusMean,
        Feature::MinPerGame,
        Feature::MinTotal,
        Feature::Avail,
    ];

    /// Columns that must exist in any persisted player-season table.
    pub const REQUIRED: [Feature; 4] = [
        Feature::PtsMean,
        Feature::RebMean,
        Feature::AstMean,
        Feature::PlusMinusMean,
    ];

    /// Produced by the feature extractor.
    pub const DERIVED: [Feature; 17] = [
        Feature::EfgPct,
        Feature::TsPct,
        Feature::Fg2Pct,
        Feature::Fg3Pct,
        Feature::FtPct,
        Feature::StlMean,
        Feature::BlkMean,
        Feature::TovMean,
        Feature::Pts36,
        Feature::Reb36,
        Feature::Ast36,
        Feature::Stl36,
        Feature::Blk36,
        Feature::Tov36,
        Feature::Pm36,
        Feature::UsageRate,
        Feature::AstTovRatio,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Feature::PtsMean => "pts_mean",
            Feature::RebMean => "reb_mean",
            Feature::AstMean => "ast_mean",
            Feature::PlusMinusMean => "plus_minus_mean",
            Feature::MinPerGame => "min_per_game",
            Feature::MinTotal => "min_total",
            Feature::Avail => "avail",
            Feature::HeightCm => "height_cm",
            Feature::WeightKg => "weight_kg",
            Feature::Bmi => "bmi",
            Feature::Age => "age",
            Feature::Exp => "exp",
            Feature::EsvMean => "esv_mean",
            Feature::Pace => "pace",
            Feature::EfgPct => "efg_pct",
            Feature::TsPct => "ts_pct",
            Feature::Fg2Pct => "fg2_pct",
            Feature::Fg3Pct => "fg3_pct",
            Feature::FtPct => "ft_pct",
            Feature::StlMean => "stl_mean",
            Feature::BlkMean => "blk_mean",
            Feature::TovMean => "tov_mean",
            Feature::Pts36 => "pts36",
            Feature::Reb36 => "reb36",
            Feature::Ast36 => "ast36",
            Feature::Stl36 => "stl36",
            Feature::Blk36 => "blk36",
            Feature::Tov36 => "tov36",
            Feature::Pm36 => "pm36",
            Feature::UsageRate => "usage_rate",
            Feature::AstTovRatio => "ast_tov_ratio",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.column() == name)
    }

    /// Persisted as an integer column.
    pub fn is_integer(self) -> bool {
        matches!(self, Feature::Exp)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// One optional value per `Feature`, indexed by the enum.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureValues([Option<f64>; Feature::COUNT]);

impl FeatureValues {
    pub fn empty() -> Self {
        Self([None; Feature::COUNT])
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.0[feature.slot()]
    }

    /// Stores the value, mapping NaN and infinities to missing.
    pub fn set(&mut self, feature: Feature, value: Option<f64>) {
        self.0[feature.slot()] = value.filter(|v| v.is_finite());
    }
}

impl Default for FeatureValues {
    fn default() -> Self {
        Self::empty()
    }
}

impl Index<Feature> for FeatureValues {
    type Output = Option<f64>;

    fn index(&self, feature: Feature) -> &Self::Output {
        &self.0[feature.slot()]
    }
}

impl IndexMut<Feature> for FeatureValues {
    fn index_mut(&mut self, feature: Feature) -> &mut Self::Output {
        &mut self.0[feature.slot()]
    }
}

/// One row per (player_id, season).
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSeasonRecord {
    pub player_id: i64,
    pub season: Season,
    pub player_name: Option<String>,
    pub team_id: Option<i64>,
    pub position: Option<String>,
    pub games_played: u32,
    pub values: FeatureValues,
    pub score_100: Option<f64>,
}

impl PlayerSeasonRecord {
    pub fn new(player_id: i64, season: Season) -> Self {
        Self {
            player_id,
            season,
            player_name: None,
            team_id: None,
            position: None,
            games_played: 0,
            values: FeatureValues::empty(),
            score_100: None,
        }
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values.get(feature)
    }
}

/// All player rows of one season cohort plus the set of feature columns the
/// table actually carries. A feature outside `features` reads as missing for
/// every row and is not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonTable {
    pub season: Season,
    pub rows: Vec<PlayerSeasonRecord>,
    pub features: BTreeSet<Feature>,
    pub has_score: bool,
}

impl SeasonTable {
    pub fn new(season: Season, mut rows: Vec<PlayerSeasonRecord>, features: BTreeSet<Feature>) -> Self {
        rows.sort_by_key(|r| r.player_id);
        Self {
            season,
            rows,
            features,
            has_score: false,
        }
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column in row order; all missing when the column is absent.
    pub fn column(&self, feature: Feature) -> Vec<Option<f64>> {
        if !self.has(feature) {
            return vec![None; self.rows.len()];
        }
        self.rows.iter().map(|r| r.get(feature)).collect()
    }

    /// Copy of the table without one feature column.
    pub fn without(&self, feature: Feature) -> Self {
        let mut out = self.clone();
        out.features.remove(&feature);
        for row in &mut out.rows {
            row.values.set(feature, None);
        }
        out
    }
}

/// Season-relative rating of one player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub player_id: i64,
    pub season: Season,
    pub score_100: f64,
}

/// Row of the externally produced `player_clusters.parquet`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRecord {
    pub player_id: i64,
    pub season: Season,
    pub cluster_id: Option<i64>,
    pub cluster_label: Option<String>,
}
