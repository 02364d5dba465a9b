//! Parser CLI - reshapes one raw IDA spreadsheet and saves a CSV copy
//!
//! Usage:
//!   cargo run --bin parser -- --file data/raw/SMP2015.ods

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "parser", about = "Reshapes IDA spreadsheets into long form")]
struct Args {
    /// Raw spreadsheet to reshape
    #[arg(long)]
    file: PathBuf,

    /// 0-based index of the header row
    #[arg(long, default_value_t = parser::DEFAULT_HEADER_ROW)]
    header_row: usize,

    /// Directory for the transformed CSV copy
    #[arg(long, default_value = "data/transformed")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let observations = parser::wide_to_long(&args.file, args.header_row)?;

    let stem = args
        .file
        .file_stem()
        .and_then(|s| s.to_str())
        .context("Input file has no usable name")?;
    parser::write_snapshot(&observations, &args.out_dir, stem)?;

    for (i, obs) in observations.iter().take(3).enumerate() {
        tracing::info!(
            "[{}] {} | {} | {} | {}",
            i + 1,
            obs.group_name,
            obs.indicator,
            obs.period_label,
            obs.value
        );
    }

    Ok(())
}
