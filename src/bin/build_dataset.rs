use anyhow::{Context, Result};

use nba_rating::cli;
use nba_rating::pipeline::{self, PipelineConfig};

fn main() -> Result<()> {
    cli::load_dotenv();
    cli::init_tracing();

    let seasons = cli::parse_seasons_arg().context("invalid --seasons argument")?;
    let config = PipelineConfig::from_env(seasons).context("failed to load pipeline config")?;
    let summary = pipeline::run_dataset(&config).context("dataset build failed")?;

    println!("Dataset build complete");
    cli::print_dataset(&summary);
    Ok(())
}
