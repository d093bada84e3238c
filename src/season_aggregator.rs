//! Per-game logs to one row per player per season.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{PipelineError, Result};
use crate::raw_input::{GameLogRow, SeasonRawInputs};
use crate::schema::{Feature, PlayerSeasonRecord, SEASON_GAMES, SeasonTable};

/// Running mean over the non-missing values of a column.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MeanAcc {
    sum: f64,
    n: u32,
}

impl MeanAcc {
    pub(crate) fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v;
            self.n += 1;
        }
    }

    pub(crate) fn mean(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / f64::from(self.n))
    }

    /// Sum of the observed values, missing when nothing was observed.
    pub(crate) fn total(&self) -> Option<f64> {
        (self.n > 0).then_some(self.sum)
    }
}

#[derive(Debug, Default)]
struct PlayerAcc<'a> {
    name: Option<&'a str>,
    games: BTreeSet<&'a str>,
    teams: BTreeMap<i64, u32>,
    pts: MeanAcc,
    reb: MeanAcc,
    ast: MeanAcc,
    plus_minus: MeanAcc,
    minutes: MeanAcc,
}

impl<'a> PlayerAcc<'a> {
    fn push(&mut self, row: &'a GameLogRow) {
        if let Some(name) = row.player_name.as_deref() {
            self.name = Some(name);
        }
        self.games.insert(row.game_id.as_str());
        if let Some(team) = row.team_id {
            *self.teams.entry(team).or_insert(0) += 1;
        }
        self.pts.push(row.pts);
        self.reb.push(row.reb);
        self.ast.push(row.ast);
        self.plus_minus.push(row.plus_minus);
        self.minutes.push(row.min);
    }

    /// Team with the most game rows; ties go to the lowest team id.
    fn main_team(&self) -> Option<i64> {
        let mut best: Option<(i64, u32)> = None;
        for (team, count) in &self.teams {
            if best.is_none_or(|(_, c)| *count > c) {
                best = Some((*team, *count));
            }
        }
        best.map(|(team, _)| team)
    }
}

/// Availability share of the regular season, clamped into [0, 1].
pub fn availability(games_played: u32) -> f64 {
    (f64::from(games_played) / SEASON_GAMES).clamp(0.0, 1.0)
}

/// Collapses one season's game rows into player rows and joins the roster,
/// shot-value and team-pace context. Players without game rows do not appear.
pub fn aggregate_season(raw: &SeasonRawInputs) -> Result<SeasonTable> {
    let season = raw.gamelog.season;
    if raw.gamelog.rows.is_empty() {
        return Err(PipelineError::EmptySeason { season });
    }

    let mut players: BTreeMap<i64, PlayerAcc> = BTreeMap::new();
    for row in &raw.gamelog.rows {
        players.entry(row.player_id).or_default().push(row);
    }

    let mut features: BTreeSet<Feature> = Feature::BOX_SCORE.into_iter().collect();
    if let Some(phys) = &raw.phys {
        features.extend(phys.features.iter().copied());
    }
    if raw.esv.is_some() {
        features.insert(Feature::EsvMean);
    }
    if raw.pace.is_some() {
        features.insert(Feature::Pace);
    }

    let mut rows = Vec::with_capacity(players.len());
    for (player_id, acc) in &players {
        let mut record = PlayerSeasonRecord::new(*player_id, season);
        record.player_name = acc.name.map(str::to_string);
        record.team_id = acc.main_team();
        record.games_played = u32::try_from(acc.games.len()).unwrap_or(u32::MAX);

        let values = &mut record.values;
        values.set(Feature::PtsMean, acc.pts.mean());
        values.set(Feature::RebMean, acc.reb.mean());
        values.set(Feature::AstMean, acc.ast.mean());
        values.set(Feature::PlusMinusMean, acc.plus_minus.mean());
        values.set(Feature::MinPerGame, acc.minutes.mean());
        values.set(Feature::MinTotal, acc.minutes.total());
        values.set(Feature::Avail, Some(availability(record.games_played)));

        if let Some(phys) = &raw.phys {
            match phys.rows.get(player_id) {
                Some(attrs) => {
                    record.position = attrs.position.clone();
                    let values = &mut record.values;
                    values.set(Feature::HeightCm, attrs.height_cm);
                    values.set(Feature::WeightKg, attrs.weight_kg);
                    values.set(Feature::Bmi, attrs.bmi);
                    values.set(Feature::Age, attrs.age);
                    values.set(Feature::Exp, attrs.exp);
                }
                None => {
                    if phys.features.contains(&Feature::Exp) {
                        record.values.set(Feature::Exp, Some(0.0));
                    }
                }
            }
        }
        if let Some(esv) = &raw.esv {
            record.values.set(Feature::EsvMean, esv.get(player_id).copied());
        }
        if let (Some(pace), Some(team)) = (&raw.pace, record.team_id) {
            record.values.set(Feature::Pace, pace.get(&team).copied());
        }
        rows.push(record);
    }

    Ok(SeasonTable::new(season, rows, features))
}
