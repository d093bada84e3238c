use anyhow::{Context, Result};

use nba_rating::cli;
use nba_rating::pipeline::{self, PipelineConfig};

fn main() -> Result<()> {
    cli::load_dotenv();
    cli::init_tracing();

    let seasons = cli::parse_seasons_arg().context("invalid --seasons argument")?;
    let config = PipelineConfig::from_env(seasons).context("failed to load pipeline config")?;
    let summary = pipeline::run_all(&config).context("pipeline run failed")?;

    println!("Pipeline complete");
    println!("Data: {}", summary.data_dir.display());
    println!("Seasons: {}", summary.seasons);
    println!("Weights: {}", summary.weights);
    for stage in &summary.stages {
        cli::print_stage(stage);
    }
    cli::print_dataset(&summary.dataset);
    println!(
        "Elapsed: {:.1}s",
        (summary.finished_at - summary.started_at).num_milliseconds() as f64 / 1000.0
    );
    println!("Summary: {}", config.layout.run_summary().display());
    Ok(())
}
