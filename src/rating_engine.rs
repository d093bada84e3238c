//! Season-relative composite rating.
//!
//! Each weighted feature is mean-imputed and z-scored inside the season, the
//! signed weighted sum is re-standardized into `note` (z * 10), and `note` is
//! min-max rescaled to `score_100`. Nothing crosses a season boundary.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::rating_weights::RatingWeights;
use crate::schema::{Feature, RatingRecord, SeasonTable};
use crate::season::Season;

/// Score given to every player of a season whose composite has no spread.
pub const DEGENERATE_SCORE: f64 = 50.0;
pub const NOTE_SCALE: f64 = 10.0;
const VARIANCE_EPS: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonRating {
    pub season: Season,
    pub records: Vec<RatingRecord>,
    /// Features that contributed to the composite.
    pub used: Vec<Feature>,
    /// Weighted features absent or entirely missing this season.
    pub skipped: Vec<Feature>,
    /// Weighted features with zero spread, contributing z = 0.
    pub flat: Vec<Feature>,
    /// True when the composite had no spread and every score is `DEGENERATE_SCORE`.
    pub degenerate: bool,
}

impl SeasonRating {
    pub fn score_of(&self, player_id: i64) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.player_id == player_id)
            .map(|r| r.score_100)
    }
}

#[derive(Debug, Clone)]
pub struct RatingEngine<'a> {
    weights: &'a RatingWeights,
}

impl<'a> RatingEngine<'a> {
    pub fn new(weights: &'a RatingWeights) -> Self {
        Self { weights }
    }

    pub fn rate_season(&self, table: &SeasonTable) -> Result<SeasonRating> {
        let season = table.season;
        if table.is_empty() {
            return Err(PipelineError::EmptySeason { season });
        }
        let missing_required: Vec<&str> = self
            .weights
            .required
            .iter()
            .filter(|f| !table.has(**f) || table.column(**f).iter().all(Option::is_none))
            .map(|f| f.column())
            .collect();
        if !missing_required.is_empty() {
            return Err(PipelineError::missing_input(
                season,
                format!("rating prerequisites absent: {}", missing_required.join(", ")),
            ));
        }

        let n = table.len();
        let mut note_raw = vec![0.0; n];
        let mut used = Vec::new();
        let mut skipped = Vec::new();
        let mut flat = Vec::new();

        for w in &self.weights.weights {
            let Some(filled) = impute_mean(&table.column(w.feature)) else {
                skipped.push(w.feature);
                continue;
            };
            match zscores(&filled) {
                Some(z) => {
                    let signed = w.signed();
                    for (acc, zi) in note_raw.iter_mut().zip(z) {
                        *acc += signed * zi;
                    }
                    used.push(w.feature);
                }
                None => flat.push(w.feature),
            }
        }
        if !skipped.is_empty() {
            debug!(
                season = %season,
                skipped = ?skipped.iter().map(|f| f.column()).collect::<Vec<_>>(),
                "weighted features unavailable this season"
            );
        }

        let scores = zscores(&note_raw)
            .map(|z| z.into_iter().map(|v| v * NOTE_SCALE).collect::<Vec<_>>())
            .and_then(|note| min_max_100(&note));
        let degenerate = scores.is_none();
        if degenerate {
            warn!(season = %season, players = n, "composite has no spread, assigning neutral score");
        }
        let scores = scores.unwrap_or_else(|| vec![DEGENERATE_SCORE; n]);

        let records = table
            .rows
            .iter()
            .zip(scores)
            .map(|(row, score_100)| RatingRecord {
                player_id: row.player_id,
                season,
                score_100,
            })
            .collect();

        Ok(SeasonRating {
            season,
            records,
            used,
            skipped,
            flat,
            degenerate,
        })
    }
}

/// Replaces missing entries with the mean of the observed ones; `None` when
/// nothing was observed.
pub fn impute_mean(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.is_empty() {
        return None;
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    Some(values.iter().map(|v| v.unwrap_or(mean)).collect())
}

/// Population z-scores; `None` when the values have no spread.
pub fn zscores(values: &[f64]) -> Option<Vec<f64>> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let std = var.sqrt();
    if !std.is_finite() || std <= VARIANCE_EPS {
        return None;
    }
    Some(values.iter().map(|v| (v - mean) / std).collect())
}

/// `100 * (v - min) / (max - min)`; `None` when max == min.
pub fn min_max_100(values: &[f64]) -> Option<Vec<f64>> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if !span.is_finite() || span <= VARIANCE_EPS {
        return None;
    }
    Some(values.iter().map(|v| 100.0 * (v - min) / span).collect())
}

/// Copy of `table` carrying the season's scores in `score_100`.
pub fn apply_scores(table: &SeasonTable, rating: &SeasonRating) -> SeasonTable {
    let by_player: HashMap<i64, f64> = rating
        .records
        .iter()
        .map(|r| (r.player_id, r.score_100))
        .collect();
    let mut out = table.clone();
    for row in &mut out.rows {
        row.score_100 = by_player.get(&row.player_id).copied();
    }
    out.has_score = true;
    out
}
