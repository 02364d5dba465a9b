//! Collector CLI - fetches a single IDA spreadsheet into the local cache
//!
//! Usage:
//!   cargo run --bin collector -- --service SMP --year 2015
//!   cargo run --bin collector -- --service SCM --year 2015 --force

use anyhow::Result;
use clap::Parser;
use collector::{FetchOutcome, Fetcher, DEFAULT_BASE_URL};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Downloads IDA spreadsheets from Anatel")]
struct Args {
    /// Service code (SMP, SCM, STFC, ...)
    #[arg(long)]
    service: String,

    /// Reference year
    #[arg(long)]
    year: i32,

    /// Directory holding the cached spreadsheets
    #[arg(long, default_value = "data/raw")]
    out_dir: String,

    /// URL template with {service} and {year} placeholders
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Force re-download even if cached
    #[arg(long, default_value = "false")]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let fetcher = Fetcher::new(&args.base_url, &args.out_dir)?.force(args.force);

    match fetcher.fetch(&args.service, args.year).await {
        FetchOutcome::Cached(path) => tracing::info!(path = %path.display(), "already cached"),
        FetchOutcome::Downloaded(path) => tracing::info!(path = %path.display(), "collected"),
        FetchOutcome::Unavailable => {
            anyhow::bail!("{}{} is unavailable", args.service, args.year)
        }
    }

    Ok(())
}
