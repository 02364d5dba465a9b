//! ETL entry point - runs the full IDA pipeline once and exits
//!
//! Environment:
//!   POSTGRES_DB, POSTGRES_USER, POSTGRES_PASSWORD   (required)
//!   ETL_RAW_DIR, ETL_TRANSFORMED_DIR, ETL_DEBUG_DIR, ETL_VIEW_SCRIPT, ETL_FACT_POLICY
//!   RUST_LOG                                          (default: info)
//!
//! Usage:
//!   cargo run --bin etl

use anyhow::Result;
use loader::warehouse::PgConnector;
use loader::{Pipeline, PipelineConfig, WarehouseConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

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

    let warehouse = WarehouseConfig::from_env()?;
    let config = PipelineConfig::from_env()?;

    info!("=== IDA Datamart ETL ===");
    info!(?warehouse, "warehouse");
    info!(fact_policy = ?config.fact_policy, services = ?config.services, years = ?config.years);

    let pipeline = Pipeline::new(config, PgConnector::new(warehouse.connect_options()))?;
    pipeline.run().await;

    Ok(())
}
