//! Seeded fake league that writes raw season files in the collector's layout.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::artifacts::write_clusters;
use crate::error::Result;
use crate::layout::DataLayout;
use crate::parquet_io::{ColumnData, TableBuilder, write_table};
use crate::raw_input::GameLogRow;
use crate::schema::ClusterRecord;
use crate::season::{Season, SeasonRange};

const POSITIONS: [&str; 5] = ["G", "G-F", "F", "F-C", "C"];
const CLUSTER_LABELS: [&str; 3] = ["Creator", "Wing", "Big"];

#[derive(Debug, Clone)]
pub struct SyntheticLeague {
    pub seed: u64,
    pub players: usize,
    pub teams: usize,
    pub max_games: u32,
    pub seasons: SeasonRange,
    /// Also write roster, shot-value and pace files.
    pub with_context: bool,
    pub with_clusters: bool,
}

impl Default for SyntheticLeague {
    fn default() -> Self {
        Self {
            seed: 42,
            players: 60,
            teams: 10,
            max_games: 40,
            seasons: SeasonRange {
                first: Season::new(2015),
                last: Season::new(2019),
            },
            with_context: true,
            with_clusters: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticReport {
    pub seasons: usize,
    pub gamelog_rows: usize,
    pub files_written: usize,
}

#[derive(Debug, Clone)]
struct Profile {
    id: i64,
    name: String,
    skill: f64,
    team: i64,
    position: usize,
    height_in: u32,
    weight_lbs: f64,
    debut_age: f64,
    debut: i32,
    seasons: i32,
    /// Season offset the player sits out entirely.
    gap: Option<i32>,
}

impl Profile {
    fn active(&self, season: Season) -> bool {
        let offset = season.start_year() - self.debut;
        offset >= 0 && offset < self.seasons && self.gap != Some(offset)
    }
}

/// Writes every raw file of the league under `layout`. Identical settings
/// always produce identical files.
pub fn write_synthetic_league(layout: &DataLayout, league: &SyntheticLeague) -> Result<SyntheticReport> {
    let mut rng = StdRng::seed_from_u64(league.seed);
    let teams = league.teams.max(1) as i64;
    let first = league.seasons.first.start_year();
    let span = league.seasons.last.start_year() - first + 1;

    let profiles: Vec<Profile> = (0..league.players)
        .map(|idx| {
            let id = 1000 + idx as i64;
            let debut = first + rng.gen_range(0..span.max(1)).min(span / 2);
            Profile {
                id,
                name: format!("Player {id}"),
                skill: rng.gen_range(0.4..1.6),
                team: 1_610_612_700 + rng.gen_range(0..teams),
                position: rng.gen_range(0..POSITIONS.len()),
                height_in: rng.gen_range(72..88),
                weight_lbs: f64::from(rng.gen_range(170u32..280)),
                debut_age: f64::from(rng.gen_range(19u32..24)),
                debut,
                seasons: rng.gen_range(2..=span.max(2)),
                gap: (idx % 7 == 3).then_some(1),
            }
        })
        .collect();

    let mut report = SyntheticReport::default();
    let mut clusters = Vec::new();

    for season in league.seasons.seasons() {
        let active: Vec<&Profile> = profiles.iter().filter(|p| p.active(season)).collect();
        let mut rows = Vec::new();
        for profile in &active {
            let games = rng.gen_range(league.max_games / 2..=league.max_games).max(1);
            for game in 0..games {
                rows.push(fake_game(&mut rng, profile, season, game));
            }
        }
        report.gamelog_rows += rows.len();
        write_table(&layout.raw_gamelog(season), gamelog_table(&rows))?;
        report.files_written += 1;

        if league.with_context {
            write_table(&layout.raw_phys(season), phys_table(&active, season))?;
            write_table(&layout.raw_esv(season), esv_table(&mut rng, &active))?;
            write_table(&layout.raw_pace(season), pace_table(&mut rng, teams))?;
            report.files_written += 3;
        }
        if league.with_clusters {
            clusters.extend(active.iter().map(|p| {
                let bucket = (p.position * CLUSTER_LABELS.len()) / POSITIONS.len();
                ClusterRecord {
                    player_id: p.id,
                    season,
                    cluster_id: Some(bucket as i64),
                    cluster_label: Some(CLUSTER_LABELS[bucket].to_string()),
                }
            }));
        }
        report.seasons += 1;
        info!(season = %season, players = active.len(), "synthetic season written");
    }

    if league.with_clusters {
        write_clusters(&layout.clusters(), &clusters)?;
        report.files_written += 1;
    }
    Ok(report)
}

fn fake_game(rng: &mut StdRng, p: &Profile, season: Season, game: u32) -> GameLogRow {
    let min = (rng.gen_range(8.0..38.0) * p.skill.min(1.0)).round();
    let scale = min / 36.0 * p.skill;
    let fga = (rng.gen_range(4.0..18.0) * scale).round();
    let fg3a = (fga * rng.gen_range(0.1..0.5)).round();
    let fgm = (fga * rng.gen_range(0.35..0.6)).round();
    let fg3m = (fg3a * rng.gen_range(0.2..0.45)).round().min(fgm);
    let fta = (rng.gen_range(0.0..8.0) * scale).round();
    let ftm = (fta * rng.gen_range(0.6..0.9)).round();
    GameLogRow {
        player_id: p.id,
        player_name: Some(p.name.clone()),
        team_id: Some(p.team),
        game_id: format!("{}{:04}{:03}", season.start_year(), p.team % 10_000, game),
        min: Some(min),
        pts: Some(2.0 * (fgm - fg3m) + 3.0 * fg3m + ftm),
        reb: Some((rng.gen_range(1.0..10.0) * scale).round()),
        ast: Some((rng.gen_range(0.0..8.0) * scale).round()),
        stl: Some((rng.gen_range(0.0..2.5) * scale).round()),
        blk: Some((rng.gen_range(0.0..2.0) * scale).round()),
        tov: Some((rng.gen_range(0.0..4.0) * scale).round()),
        fgm: Some(fgm),
        fga: Some(fga),
        fg3m: Some(fg3m),
        fg3a: Some(fg3a),
        ftm: Some(ftm),
        fta: Some(fta),
        plus_minus: Some((rng.gen_range(-12.0..12.0) + 6.0 * (p.skill - 1.0)).round()),
    }
}

fn gamelog_table(rows: &[GameLogRow]) -> TableBuilder {
    let num = |f: fn(&GameLogRow) -> Option<f64>| {
        ColumnData::Int64(rows.iter().map(|r| f(r).map(|v| v as i64)).collect())
    };
    TableBuilder::new()
        .required("PLAYER_ID", ColumnData::Int64(rows.iter().map(|r| Some(r.player_id)).collect()))
        .nullable("PLAYER_NAME", ColumnData::Utf8(rows.iter().map(|r| r.player_name.clone()).collect()))
        .nullable("TEAM_ID", ColumnData::Int64(rows.iter().map(|r| r.team_id).collect()))
        .required("GAME_ID", ColumnData::Utf8(rows.iter().map(|r| Some(r.game_id.clone())).collect()))
        .nullable("MIN", ColumnData::Float64(rows.iter().map(|r| r.min).collect()))
        .nullable("PTS", num(|r| r.pts))
        .nullable("REB", num(|r| r.reb))
        .nullable("AST", num(|r| r.ast))
        .nullable("STL", num(|r| r.stl))
        .nullable("BLK", num(|r| r.blk))
        .nullable("TOV", num(|r| r.tov))
        .nullable("FGM", num(|r| r.fgm))
        .nullable("FGA", num(|r| r.fga))
        .nullable("FG3M", num(|r| r.fg3m))
        .nullable("FG3A", num(|r| r.fg3a))
        .nullable("FTM", num(|r| r.ftm))
        .nullable("FTA", num(|r| r.fta))
        .nullable("PLUS_MINUS", num(|r| r.plus_minus))
}

/// Roster file in the collector's raw units: `HEIGHT` as feet-inches,
/// `WEIGHT` in pounds, `EXP` with `"R"` for rookies.
fn phys_table(active: &[&Profile], season: Season) -> TableBuilder {
    let exp = |p: &Profile| season.start_year() - p.debut;
    TableBuilder::new()
        .required("PLAYER_ID", ColumnData::Int64(active.iter().map(|p| Some(p.id)).collect()))
        .nullable(
            "POSITION",
            ColumnData::Utf8(active.iter().map(|p| Some(POSITIONS[p.position].to_string())).collect()),
        )
        .nullable(
            "HEIGHT",
            ColumnData::Utf8(
                active
                    .iter()
                    .map(|p| Some(format!("{}-{}", p.height_in / 12, p.height_in % 12)))
                    .collect(),
            ),
        )
        .nullable("WEIGHT", ColumnData::Float64(active.iter().map(|p| Some(p.weight_lbs)).collect()))
        .nullable(
            "AGE",
            ColumnData::Float64(
                active
                    .iter()
                    .map(|p| Some(p.debut_age + f64::from(exp(*p))))
                    .collect(),
            ),
        )
        .nullable(
            "EXP",
            ColumnData::Utf8(
                active
                    .iter()
                    .map(|p| match exp(*p) {
                        0 => Some("R".to_string()),
                        years => Some(years.to_string()),
                    })
                    .collect(),
            ),
        )
}

fn esv_table(rng: &mut StdRng, active: &[&Profile]) -> TableBuilder {
    let values = active
        .iter()
        .map(|p| Some(((0.9 + 0.15 * p.skill + rng.gen_range(-0.05..0.05)) * 1000.0).round() / 1000.0))
        .collect();
    TableBuilder::new()
        .required("PLAYER_ID", ColumnData::Int64(active.iter().map(|p| Some(p.id)).collect()))
        .nullable("esv_mean", ColumnData::Float64(values))
}

fn pace_table(rng: &mut StdRng, teams: i64) -> TableBuilder {
    let ids: Vec<Option<i64>> = (0..teams).map(|t| Some(1_610_612_700 + t)).collect();
    let pace = (0..teams)
        .map(|_| Some((rng.gen_range(92.0..104.0_f64) * 10.0).round() / 10.0))
        .collect();
    TableBuilder::new()
        .required("TEAM_ID", ColumnData::Int64(ids))
        .nullable("pace", ColumnData::Float64(pace))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_player_skips_one_season() {
        let profile = Profile {
            id: 1,
            name: "Gap".into(),
            skill: 1.0,
            team: 1,
            position: 0,
            height_in: 80,
            weight_lbs: 220.0,
            debut_age: 21.0,
            debut: 2015,
            seasons: 3,
            gap: Some(1),
        };
        assert!(profile.active(Season::new(2015)));
        assert!(!profile.active(Season::new(2016)));
        assert!(profile.active(Season::new(2017)));
        assert!(!profile.active(Season::new(2018)));
    }

    #[test]
    fn fake_box_scores_are_consistent() {
        let mut rng = StdRng::seed_from_u64(7);
        let profile = Profile {
            id: 5,
            name: "Five".into(),
            skill: 1.2,
            team: 1_610_612_701,
            position: 2,
            height_in: 79,
            weight_lbs: 215.0,
            debut_age: 22.0,
            debut: 2015,
            seasons: 4,
            gap: None,
        };
        for game in 0..50 {
            let row = fake_game(&mut rng, &profile, Season::new(2016), game);
            let (fgm, fga) = (row.fgm.unwrap(), row.fga.unwrap());
            let (fg3m, fg3a) = (row.fg3m.unwrap(), row.fg3a.unwrap());
            assert!(fgm <= fga && fg3m <= fg3a && fg3m <= fgm);
            assert!(row.ftm.unwrap() <= row.fta.unwrap());
            assert!(row.min.unwrap() >= 0.0);
        }
    }
}
