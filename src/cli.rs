//! Shared plumbing for the `src/bin` drivers.

use tracing_subscriber::EnvFilter;

use crate::error::Result;
use crate::pipeline::{DatasetSummary, StageSummary};
use crate::season::SeasonRange;

const MAX_PRINTED_ERRORS: usize = 8;

/// `.env.local` first so local overrides win over the shared `.env`.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

/// Installs the fmt subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// `--seasons=<range>` or `--seasons <range>` from the process arguments.
pub fn parse_seasons_arg() -> Result<Option<SeasonRange>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    seasons_from_args(&args)
}

pub fn seasons_from_args(args: &[String]) -> Result<Option<SeasonRange>> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix("--seasons=") {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return trimmed.parse().map(Some);
            }
        }
        if arg == "--seasons" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return next.parse().map(Some);
            }
        }
    }
    Ok(None)
}

pub fn print_stage(summary: &StageSummary) {
    println!(
        "{}: seasons {}/{} rows={}",
        summary.stage, summary.seasons_succeeded, summary.seasons_total, summary.rows_written
    );
    for note in &summary.notes {
        println!("  note: {note}");
    }
    if !summary.errors.is_empty() {
        println!("  skipped: {}", summary.errors.len());
        for err in summary.errors.iter().take(MAX_PRINTED_ERRORS) {
            println!("   - {err}");
        }
    }
}

pub fn print_dataset(summary: &DatasetSummary) {
    println!("Dataset: {}", summary.path.display());
    println!(
        "Seasons loaded: {} joined rows: {}",
        summary.seasons_loaded, summary.joined_rows
    );
    println!("Rows: {} Columns: {}", summary.rows, summary.columns);
    if !summary.clusters_joined {
        println!("Clusters: none (cluster columns empty)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::season::Season;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn seasons_flag_in_both_forms() {
        let range = seasons_from_args(&args(&["--seasons=2015-16..2017-18"]))
            .unwrap()
            .unwrap();
        assert_eq!(range.first, Season::new(2015));
        assert_eq!(range.last, Season::new(2017));

        let range = seasons_from_args(&args(&["-v", "--seasons", "2010"]))
            .unwrap()
            .unwrap();
        assert_eq!(range.seasons(), vec![Season::new(2010)]);

        assert!(seasons_from_args(&args(&["--seasons"])).unwrap().is_none());
        assert!(seasons_from_args(&args(&["--seasons=bad"])).is_err());
    }
}
