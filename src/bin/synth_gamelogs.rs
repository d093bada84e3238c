use anyhow::{Context, Result};

use nba_rating::cli;
use nba_rating::layout::DataLayout;
use nba_rating::synthetic::{SyntheticLeague, write_synthetic_league};

fn main() -> Result<()> {
    cli::load_dotenv();
    cli::init_tracing();

    let mut league = SyntheticLeague::default();
    if let Some(range) = cli::parse_seasons_arg().context("invalid --seasons argument")? {
        league.seasons = range;
    }
    if let Some(seed) = parse_u64_arg("--seed") {
        league.seed = seed;
    }
    if let Some(players) = parse_u64_arg("--players") {
        league.players = usize::try_from(players).context("--players out of range")?;
    }

    let layout = std::env::var("NBA_DATA_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(DataLayout::new)
        .unwrap_or_default();
    let report = write_synthetic_league(&layout, &league).context("failed to write synthetic league")?;

    println!("Synthetic league written");
    println!("Raw: {}", layout.raw_dir().display());
    println!("Seasons: {} ({})", report.seasons, league.seasons);
    println!("Seed: {} players: {}", league.seed, league.players);
    println!("Gamelog rows: {}", report.gamelog_rows);
    println!("Files: {}", report.files_written);
    Ok(())
}

fn parse_u64_arg(flag: &str) -> Option<u64> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            return raw.trim().parse().ok();
        }
        if arg == flag {
            return args.get(idx + 1).and_then(|next| next.trim().parse().ok());
        }
    }
    None
}
