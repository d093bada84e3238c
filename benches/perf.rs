use std::collections::BTreeSet;

use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

use nba_rating::dataset_builder::build_dataset;
use nba_rating::rating_engine::RatingEngine;
use nba_rating::rating_weights::default_weights;
use nba_rating::schema::{Feature, PlayerSeasonRecord, RatingRecord, SeasonTable};
use nba_rating::season::Season;

fn sample_season(rng: &mut StdRng, season: Season, players: i64) -> SeasonTable {
    let rows = (0..players)
        .map(|id| {
            let mut r = PlayerSeasonRecord::new(id, season);
            for feature in Feature::ALL {
                // Roughly one value in twenty missing, to exercise imputation.
                if rng.gen_range(0..20) > 0 {
                    r.values.set(feature, Some(rng.gen_range(0.0..40.0)));
                }
            }
            r.player_name = Some(format!("Player {id}"));
            r
        })
        .collect();
    SeasonTable::new(season, rows, Feature::ALL.into_iter().collect::<BTreeSet<_>>())
}

fn bench_rating_engine(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let table = sample_season(&mut rng, Season::new(2010), 450);
    let weights = default_weights().expect("embedded weights");
    let engine = RatingEngine::new(weights);

    c.bench_function("rate_season_450_players", |b| {
        b.iter(|| {
            let rating = engine.rate_season(black_box(&table)).expect("rated");
            black_box(rating.records.len());
        })
    });
}

fn bench_dataset_builder(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(12);
    let weights = default_weights().expect("embedded weights");
    let engine = RatingEngine::new(weights);
    let seasons: Vec<SeasonTable> = (2000..2024)
        .map(|year| sample_season(&mut rng, Season::new(year), 450))
        .collect();
    let scores: Vec<RatingRecord> = seasons
        .iter()
        .flat_map(|t| engine.rate_season(t).expect("rated").records)
        .collect();

    c.bench_function("build_dataset_24_seasons", |b| {
        b.iter(|| {
            let dataset = build_dataset(black_box(&scores), black_box(&seasons), None)
                .expect("dataset built");
            black_box(dataset.rows.len());
        })
    });
}

criterion_group!(benches, bench_rating_engine, bench_dataset_builder);
criterion_main!(benches);
