use thiserror::Error;

use crate::season::Season;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the rating and dataset stages.
///
/// Season-local failures (`MissingInput`, `EmptySeason`) are recovered by the
/// stage loops: the season is logged and skipped. Everything else aborts the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("missing input{}: {detail}", season_suffix(.season))]
    MissingInput {
        season: Option<Season>,
        detail: String,
    },

    #[error("season {season} has no player rows")]
    EmptySeason { season: Season },

    #[error("schema drift in {artifact}: missing columns {missing:?}")]
    SchemaDrift {
        artifact: String,
        missing: Vec<String>,
    },

    #[error("no season succeeded in stage {stage}")]
    NoSeasons { stage: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn missing_input(season: Season, detail: impl Into<String>) -> Self {
        Self::MissingInput {
            season: Some(season),
            detail: detail.into(),
        }
    }

    pub fn schema_drift(artifact: impl Into<String>, missing: Vec<String>) -> Self {
        Self::SchemaDrift {
            artifact: artifact.into(),
            missing,
        }
    }

    /// True when the error only invalidates the season being processed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MissingInput { .. } | Self::EmptySeason { .. })
    }
}

fn season_suffix(season: &Option<Season>) -> String {
    season
        .map(|s| format!(" for season {s}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_errors_are_recoverable() {
        let season = Season::new(2015);
        assert!(PipelineError::missing_input(season, "no file").is_recoverable());
        assert!(PipelineError::EmptySeason { season }.is_recoverable());
        assert!(!PipelineError::schema_drift("dataset_ml", vec!["bmi".into()]).is_recoverable());
        assert!(
            !PipelineError::NoSeasons {
                stage: "ratings".into()
            }
            .is_recoverable()
        );
    }

    #[test]
    fn missing_input_message_names_season() {
        let err = PipelineError::missing_input(Season::new(1999), "column FGA");
        assert_eq!(
            err.to_string(),
            "missing input for season 1999-00: column FGA"
        );
    }
}
