use std::collections::BTreeSet;

use nba_rating::PipelineError;
use nba_rating::dataset_builder::{DatasetFeature, build_dataset};
use nba_rating::feature_extractor::extract_features;
use nba_rating::rating_engine::{DEGENERATE_SCORE, RatingEngine};
use nba_rating::rating_weights::default_weights;
use nba_rating::raw_input::{GameLogRow, SeasonGameLog, SeasonRawInputs};
use nba_rating::schema::{Feature, PlayerSeasonRecord, RatingRecord, SeasonTable};
use nba_rating::season::Season;
use nba_rating::season_aggregator::aggregate_season;

fn player(
    id: i64,
    season: Season,
    pts: f64,
    reb: f64,
    ast: f64,
    plus_minus: f64,
    age: f64,
    shooting: f64,
) -> PlayerSeasonRecord {
    let mut r = PlayerSeasonRecord::new(id, season);
    r.values.set(Feature::PtsMean, Some(pts));
    r.values.set(Feature::RebMean, Some(reb));
    r.values.set(Feature::AstMean, Some(ast));
    r.values.set(Feature::PlusMinusMean, Some(plus_minus));
    r.values.set(Feature::Age, Some(age));
    r.values.set(Feature::EfgPct, Some(shooting));
    r.values.set(Feature::TsPct, Some(shooting + 0.05));
    r
}

fn three_player_season() -> SeasonTable {
    let season = Season::new(2018);
    let rows = vec![
        player(11, season, 14.0, 6.0, 3.0, 1.0, 27.0, 0.50),
        player(12, season, 28.0, 9.0, 7.0, 8.0, 24.0, 0.58),
        player(13, season, 6.0, 2.0, 1.0, -5.0, 33.0, 0.44),
    ];
    let features = BTreeSet::from([
        Feature::PtsMean,
        Feature::RebMean,
        Feature::AstMean,
        Feature::PlusMinusMean,
        Feature::Age,
        Feature::EfgPct,
        Feature::TsPct,
    ]);
    SeasonTable::new(season, rows, features)
}

#[test]
fn best_composite_scores_hundred_and_worst_zero() {
    let weights = default_weights().expect("embedded weights");
    let rating = RatingEngine::new(weights)
        .rate_season(&three_player_season())
        .expect("season rated");
    assert_eq!(rating.score_of(12), Some(100.0));
    assert_eq!(rating.score_of(13), Some(0.0));
    let middle = rating.score_of(11).expect("middle player rated");
    assert!(middle > 0.0 && middle < 100.0);
    assert!(rating.skipped.contains(&Feature::Bmi));
}

#[test]
fn identical_players_get_neutral_score() {
    let season = Season::new(2018);
    let rows = vec![
        player(1, season, 10.0, 5.0, 2.0, 0.0, 25.0, 0.5),
        player(2, season, 10.0, 5.0, 2.0, 0.0, 25.0, 0.5),
    ];
    let table = SeasonTable::new(
        season,
        rows,
        BTreeSet::from([Feature::PtsMean, Feature::EfgPct, Feature::TsPct]),
    );
    let weights = default_weights().expect("embedded weights");
    let rating = RatingEngine::new(weights).rate_season(&table).expect("rated");
    assert!(rating.degenerate);
    assert!(rating.records.iter().all(|r| r.score_100 == DEGENERATE_SCORE));
}

#[test]
fn gap_season_target_is_next_recorded_season() {
    let all = Feature::ALL.into_iter().collect::<BTreeSet<_>>();
    let table = |year: i32, ids: &[i64]| {
        let season = Season::new(year);
        let rows = ids
            .iter()
            .map(|id| {
                let mut r = PlayerSeasonRecord::new(*id, season);
                for f in Feature::ALL {
                    r.values.set(f, Some(1.0));
                }
                r
            })
            .collect();
        SeasonTable::new(season, rows, all.clone())
    };
    let score = |id: i64, year: i32, value: f64| RatingRecord {
        player_id: id,
        season: Season::new(year),
        score_100: value,
    };

    let seasons = vec![table(2015, &[1, 2]), table(2016, &[2]), table(2017, &[1, 2])];
    let scores = vec![
        score(1, 2015, 35.0),
        score(1, 2017, 80.0),
        score(2, 2015, 50.0),
        score(2, 2016, 55.0),
        score(2, 2017, 60.0),
    ];
    let dataset = build_dataset(&scores, &seasons, None).expect("dataset built");

    let gap_row = dataset
        .rows
        .iter()
        .find(|r| r.player_id == 1 && r.season == Season::new(2015))
        .expect("2015-16 row kept");
    assert_eq!(gap_row.target_note_n1, 80.0);
    assert!(
        dataset
            .rows
            .iter()
            .all(|r| !(r.player_id == 1 && r.season == Season::new(2017)))
    );
    let other = dataset
        .rows
        .iter()
        .find(|r| r.player_id == 2 && r.season == Season::new(2016))
        .expect("player 2 middle season");
    assert_eq!(other.target_note_n1, 60.0);
    assert_eq!(other.feature(DatasetFeature::DeltaScore), Some(5.0));
}

#[test]
fn feature_table_without_bmi_is_rejected() {
    let season = Season::new(2015);
    let mut features: BTreeSet<Feature> = Feature::ALL.into_iter().collect();
    features.remove(&Feature::Bmi);
    let mut row = PlayerSeasonRecord::new(1, season);
    row.values.set(Feature::PtsMean, Some(12.0));
    let tables = vec![SeasonTable::new(season, vec![row], features)];
    let scores = vec![RatingRecord {
        player_id: 1,
        season,
        score_100: 50.0,
    }];

    let err = build_dataset(&scores, &tables, None).expect_err("bmi is required");
    assert!(matches!(
        err,
        PipelineError::SchemaDrift { ref missing, .. } if missing == &vec!["bmi".to_string()]
    ));
    assert!(!err.is_recoverable());
}

#[test]
fn zero_minutes_player_has_no_per36_rates() {
    let season = Season::new(2019);
    let game = |player_id: i64, game_id: &str, min: f64| GameLogRow {
        player_id,
        player_name: Some(format!("P{player_id}")),
        team_id: Some(1),
        game_id: game_id.to_string(),
        min: Some(min),
        pts: Some(if min > 0.0 { 12.0 } else { 0.0 }),
        reb: Some(3.0),
        ast: Some(2.0),
        stl: Some(1.0),
        blk: Some(0.0),
        tov: Some(1.0),
        fgm: Some(5.0),
        fga: Some(10.0),
        fg3m: Some(1.0),
        fta: Some(2.0),
        plus_minus: Some(0.0),
        ..GameLogRow::default()
    };
    let raw = SeasonRawInputs {
        gamelog: SeasonGameLog {
            season,
            rows: vec![game(1, "a", 30.0), game(2, "a", 0.0), game(2, "b", 0.0)],
            has_fg3a: false,
            has_ftm: false,
        },
        phys: None,
        esv: None,
        pace: None,
    };
    let aggregated = aggregate_season(&raw).expect("aggregated");
    let featured = extract_features(&aggregated, &raw.gamelog);
    let benchwarmer = &featured.rows[1];
    assert_eq!(benchwarmer.player_id, 2);
    assert_eq!(benchwarmer.games_played, 2);
    for feature in [
        Feature::Pts36,
        Feature::Reb36,
        Feature::Ast36,
        Feature::Stl36,
        Feature::Blk36,
        Feature::Tov36,
        Feature::Pm36,
        Feature::UsageRate,
    ] {
        assert_eq!(benchwarmer.get(feature), None, "{}", feature.column());
    }
    assert_eq!(featured.rows[0].get(Feature::Pts36), Some(12.0 * 36.0 / 30.0));
}
