//! Efficiency ratios, per-36 rates and usage on top of the aggregated table.
//!
//! Shooting ratios are computed per game and then averaged over the games
//! where the denominator is positive. Rates and ratios built from season
//! totals map a zero denominator to missing.

use std::collections::BTreeMap;

use tracing::debug;

use crate::raw_input::{GameLogRow, SeasonGameLog};
use crate::schema::{Feature, SeasonTable};
use crate::season_aggregator::MeanAcc;

const PER36_MINUTES: f64 = 36.0;
const USAGE_MINUTES: f64 = 48.0;
const FTA_POSSESSION_WEIGHT: f64 = 0.44;

/// Counting stats rescaled to 36 minutes, paired with their source column.
const PER36: [(Feature, Stat); 7] = [
    (Feature::Pts36, Stat::Pts),
    (Feature::Reb36, Stat::Reb),
    (Feature::Ast36, Stat::Ast),
    (Feature::Stl36, Stat::Stl),
    (Feature::Blk36, Stat::Blk),
    (Feature::Tov36, Stat::Tov),
    (Feature::Pm36, Stat::PlusMinus),
];

#[derive(Debug, Clone, Copy)]
enum Stat {
    Pts,
    Reb,
    Ast,
    Stl,
    Blk,
    Tov,
    PlusMinus,
}

impl Stat {
    fn of(self, row: &GameLogRow) -> Option<f64> {
        match self {
            Stat::Pts => row.pts,
            Stat::Reb => row.reb,
            Stat::Ast => row.ast,
            Stat::Stl => row.stl,
            Stat::Blk => row.blk,
            Stat::Tov => row.tov,
            Stat::PlusMinus => row.plus_minus,
        }
    }
}

/// `(FGM + 0.5 * FG3M) / FGA`
pub fn effective_fg(fgm: f64, fg3m: f64, fga: f64) -> Option<f64> {
    ratio(fgm + 0.5 * fg3m, fga)
}

/// `PTS / (2 * (FGA + 0.44 * FTA))`
pub fn true_shooting(pts: f64, fga: f64, fta: f64) -> Option<f64> {
    ratio(pts, 2.0 * (fga + FTA_POSSESSION_WEIGHT * fta))
}

/// `total * 36 / minutes`, missing when no minutes were played.
pub fn per36(total: Option<f64>, minutes_total: Option<f64>) -> Option<f64> {
    ratio(total? * PER36_MINUTES, minutes_total?)
}

pub fn usage_rate(possessions_total: Option<f64>, minutes_total: Option<f64>) -> Option<f64> {
    ratio(possessions_total?, minutes_total? / USAGE_MINUTES)
}

fn ratio(num: f64, den: f64) -> Option<f64> {
    if den > 0.0 && num.is_finite() && den.is_finite() {
        Some(num / den)
    } else {
        None
    }
}

#[derive(Debug, Default)]
struct ShotAcc {
    efg: MeanAcc,
    ts: MeanAcc,
    fg2: MeanAcc,
    fg3: MeanAcc,
    ft: MeanAcc,
    stl: MeanAcc,
    blk: MeanAcc,
    tov: MeanAcc,
    minutes: MeanAcc,
    possessions: MeanAcc,
    totals: [MeanAcc; PER36.len()],
}

impl ShotAcc {
    fn push(&mut self, row: &GameLogRow, log: &SeasonGameLog) {
        if let (Some(fgm), Some(fg3m), Some(fga)) = (row.fgm, row.fg3m, row.fga) {
            self.efg.push(effective_fg(fgm, fg3m, fga));
            if let Some(fg3a) = row.fg3a.filter(|_| log.has_fg3a) {
                self.fg2.push(ratio(fgm - fg3m, fga - fg3a));
                self.fg3.push(ratio(fg3m, fg3a));
            }
        }
        if let (Some(pts), Some(fga), Some(fta)) = (row.pts, row.fga, row.fta) {
            self.ts.push(true_shooting(pts, fga, fta));
        }
        if let (Some(ftm), Some(fta)) = (row.ftm.filter(|_| log.has_ftm), row.fta) {
            self.ft.push(ratio(ftm, fta));
        }
        if let (Some(fga), Some(fta), Some(tov)) = (row.fga, row.fta, row.tov) {
            self.possessions.push(Some(fga + FTA_POSSESSION_WEIGHT * fta + tov));
        }
        self.stl.push(row.stl);
        self.blk.push(row.blk);
        self.tov.push(row.tov);
        self.minutes.push(row.min);
        for (acc, (_, stat)) in self.totals.iter_mut().zip(PER36) {
            acc.push(stat.of(row));
        }
    }
}

/// Returns a copy of `table` with every derived column filled from the
/// season's game rows. All derived columns are present afterwards, possibly
/// all-missing; shooting splits stay missing when the log lacks FG3A or FTM.
pub fn extract_features(table: &SeasonTable, log: &SeasonGameLog) -> SeasonTable {
    let mut per_player: BTreeMap<i64, ShotAcc> = BTreeMap::new();
    for row in &log.rows {
        per_player.entry(row.player_id).or_default().push(row, log);
    }
    if !log.has_fg3a || !log.has_ftm {
        debug!(
            season = %table.season,
            fg3a = log.has_fg3a,
            ftm = log.has_ftm,
            "game log lacks split columns, shooting splits stay missing"
        );
    }

    let mut out = table.clone();
    out.features.extend(Feature::DERIVED);
    let mut unmatched = 0usize;

    for record in &mut out.rows {
        let Some(acc) = per_player.get(&record.player_id) else {
            unmatched += 1;
            continue;
        };
        let minutes_total = acc.minutes.total();
        let values = &mut record.values;

        values.set(Feature::EfgPct, acc.efg.mean());
        values.set(Feature::TsPct, acc.ts.mean());
        values.set(Feature::Fg2Pct, acc.fg2.mean());
        values.set(Feature::Fg3Pct, acc.fg3.mean());
        values.set(Feature::FtPct, acc.ft.mean());
        values.set(Feature::StlMean, acc.stl.mean());
        values.set(Feature::BlkMean, acc.blk.mean());
        values.set(Feature::TovMean, acc.tov.mean());

        for (total, (feature, _)) in acc.totals.iter().zip(PER36) {
            values.set(feature, per36(total.total(), minutes_total));
        }
        values.set(
            Feature::UsageRate,
            usage_rate(acc.possessions.total(), minutes_total),
        );

        let ast_total = acc.totals[2].total();
        let tov_total = acc.tov.total();
        let ast_tov = match (ast_total, tov_total) {
            (Some(ast), Some(tov)) => ratio(ast, tov),
            _ => None,
        };
        values.set(Feature::AstTovRatio, ast_tov);
    }

    if unmatched > 0 {
        debug!(season = %out.season, unmatched, "players without game rows keep missing derived features");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::schema::PlayerSeasonRecord;
    use crate::season::Season;

    fn game(player_id: i64, game_id: &str, min: f64) -> GameLogRow {
        GameLogRow {
            player_id,
            game_id: game_id.to_string(),
            min: Some(min),
            pts: Some(20.0),
            reb: Some(6.0),
            ast: Some(4.0),
            stl: Some(1.0),
            blk: Some(0.0),
            tov: Some(2.0),
            fgm: Some(8.0),
            fga: Some(16.0),
            fg3m: Some(2.0),
            fg3a: Some(5.0),
            ftm: Some(2.0),
            fta: Some(4.0),
            plus_minus: Some(3.0),
            ..GameLogRow::default()
        }
    }

    fn setup(rows: Vec<GameLogRow>) -> (SeasonTable, SeasonGameLog) {
        let season = Season::new(2010);
        let ids: BTreeSet<i64> = rows.iter().map(|r| r.player_id).collect();
        let records = ids
            .into_iter()
            .map(|id| PlayerSeasonRecord::new(id, season))
            .collect();
        let table = SeasonTable::new(season, records, Feature::BOX_SCORE.into_iter().collect());
        let log = SeasonGameLog {
            season,
            rows,
            has_fg3a: true,
            has_ftm: true,
        };
        (table, log)
    }

    #[test]
    fn shooting_formulas() {
        assert_eq!(effective_fg(8.0, 2.0, 16.0), Some(0.5625));
        assert_eq!(effective_fg(0.0, 0.0, 0.0), None);
        let ts = true_shooting(20.0, 16.0, 4.0).unwrap();
        assert!((ts - 20.0 / (2.0 * 17.76)).abs() < 1e-12);
    }

    #[test]
    fn ratios_are_averaged_per_game() {
        let mut hot = game(1, "g1", 30.0);
        hot.fgm = Some(10.0);
        hot.fga = Some(10.0);
        hot.fg3m = Some(0.0);
        let mut cold = game(1, "g2", 30.0);
        cold.fgm = Some(0.0);
        cold.fga = Some(30.0);
        cold.fg3m = Some(0.0);
        let (table, log) = setup(vec![hot, cold]);
        let out = extract_features(&table, &log);
        // Per-game mean of 1.0 and 0.0, not the pooled 10/40.
        assert_eq!(out.rows[0].get(Feature::EfgPct), Some(0.5));
    }

    #[test]
    fn per36_and_usage_from_season_totals() {
        let (table, log) = setup(vec![game(1, "g1", 24.0), game(1, "g2", 48.0)]);
        let out = extract_features(&table, &log);
        let row = &out.rows[0];
        assert_eq!(row.get(Feature::Pts36), Some(40.0 * 36.0 / 72.0));
        assert_eq!(row.get(Feature::Pm36), Some(6.0 * 36.0 / 72.0));
        let possessions = 2.0 * (16.0 + 0.44 * 4.0 + 2.0);
        let usage = row.get(Feature::UsageRate).unwrap();
        assert!((usage - possessions / 1.5).abs() < 1e-12);
        assert_eq!(row.get(Feature::AstTovRatio), Some(2.0));
        assert_eq!(row.get(Feature::Fg3Pct), Some(0.4));
    }

    #[test]
    fn zero_minutes_leave_rates_missing() {
        let mut idle = game(1, "g1", 0.0);
        idle.tov = Some(0.0);
        let (table, log) = setup(vec![idle]);
        let out = extract_features(&table, &log);
        let row = &out.rows[0];
        for (feature, _) in PER36 {
            assert_eq!(row.get(feature), None, "{}", feature.column());
        }
        assert_eq!(row.get(Feature::UsageRate), None);
        assert_eq!(row.get(Feature::AstTovRatio), None);
        assert!(row.get(Feature::TsPct).is_some());
    }

    #[test]
    fn every_derived_column_is_declared() {
        let mut no_splits = game(1, "g1", 30.0);
        no_splits.fg3a = None;
        no_splits.ftm = None;
        let (table, log) = setup(vec![no_splits]);
        let out = extract_features(&table, &log);
        for feature in Feature::DERIVED {
            assert!(out.has(feature));
        }
        assert_eq!(out.rows[0].get(Feature::Fg2Pct), None);
        assert_eq!(out.rows[0].get(Feature::FtPct), None);
        assert!(out.rows[0].get(Feature::EfgPct).is_some());
    }

    #[test]
    fn log_without_split_columns_leaves_splits_missing() {
        let (table, mut log) = setup(vec![game(1, "g1", 30.0)]);
        log.has_fg3a = false;
        log.has_ftm = false;
        let out = extract_features(&table, &log);
        let row = &out.rows[0];
        assert_eq!(row.get(Feature::Fg2Pct), None);
        assert_eq!(row.get(Feature::Fg3Pct), None);
        assert_eq!(row.get(Feature::FtPct), None);
        assert!(row.get(Feature::EfgPct).is_some());
        assert!(row.get(Feature::TsPct).is_some());
    }
}
