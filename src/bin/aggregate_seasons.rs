use anyhow::{Context, Result};

use nba_rating::cli;
use nba_rating::pipeline::{self, PipelineConfig};

fn main() -> Result<()> {
    cli::load_dotenv();
    cli::init_tracing();

    let seasons = cli::parse_seasons_arg().context("invalid --seasons argument")?;
    let config = PipelineConfig::from_env(seasons).context("failed to load pipeline config")?;
    let summary = pipeline::run_aggregation(&config).context("season aggregation failed")?;

    println!("Season aggregation complete");
    println!("Raw: {}", config.layout.raw_dir().display());
    println!("Curated: {}", config.layout.curated_dir().display());
    cli::print_stage(&summary);
    Ok(())
}
