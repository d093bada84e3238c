use anyhow::{Context, Result};

use nba_rating::cli;
use nba_rating::pipeline::{self, PipelineConfig};

fn main() -> Result<()> {
    cli::load_dotenv();
    cli::init_tracing();

    let seasons = cli::parse_seasons_arg().context("invalid --seasons argument")?;
    let config = PipelineConfig::from_env(seasons).context("failed to load pipeline config")?;
    let summary = pipeline::run_ratings(&config).context("rating stage failed")?;

    println!("Ratings complete");
    println!(
        "Weights: {} v{} ({} features, total weight {:.2})",
        config.weights.name,
        config.weights.version,
        config.weights.weights.len(),
        config.weights.total_weight()
    );
    println!("Scores: {}", config.layout.all_scores().display());
    cli::print_stage(&summary);
    Ok(())
}
