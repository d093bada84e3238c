use std::path::{Path, PathBuf};

use crate::season::Season;

pub const DEFAULT_DATA_DIR: &str = "nba_rating/data";

/// File locations of every pipeline artifact under one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn curated_dir(&self) -> PathBuf {
        self.root.join("curated")
    }

    pub fn raw_gamelog(&self, season: Season) -> PathBuf {
        self.raw_dir().join(format!("player_gamelog_{season}.parquet"))
    }

    pub fn raw_phys(&self, season: Season) -> PathBuf {
        self.raw_dir().join(format!("player_phys_{season}.parquet"))
    }

    pub fn raw_esv(&self, season: Season) -> PathBuf {
        self.raw_dir().join(format!("player_esv_{season}.parquet"))
    }

    pub fn raw_pace(&self, season: Season) -> PathBuf {
        self.raw_dir().join(format!("team_pace_{season}.parquet"))
    }

    pub fn player_season(&self, season: Season) -> PathBuf {
        self.curated_dir()
            .join(format!("player_season_{season}.parquet"))
    }

    pub fn all_scores(&self) -> PathBuf {
        self.curated_dir().join("all_seasons_scores.parquet")
    }

    pub fn clusters(&self) -> PathBuf {
        self.curated_dir().join("player_clusters.parquet")
    }

    pub fn dataset(&self) -> PathBuf {
        self.curated_dir().join("dataset_ml.parquet")
    }

    pub fn run_summary(&self) -> PathBuf {
        self.curated_dir().join("run_summary.json")
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}
