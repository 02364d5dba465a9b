//! Loader - IDA star schema ETL
//!
//! Responsibilities:
//! - Prepare reshaped observations (service tag, period parsing)
//! - Upsert the service, economic group and time dimensions idempotently
//! - Insert facts with resolved surrogate keys, all in one transaction per batch
//! - Apply the reporting view once all batches are loaded
//! - Orchestrate fetch -> reshape -> load over the configured pairs

pub mod config;
pub mod error;
pub mod load;
pub mod model;
pub mod pipeline;
pub mod prepare;
pub mod retry;
pub mod view;
pub mod warehouse;

pub use config::{PipelineConfig, WarehouseConfig};
pub use error::WarehouseError;
pub use load::{FactPolicy, LoadOutcome, WarehouseLoader};
pub use pipeline::{Pipeline, RunSummary};
pub use retry::RetryPolicy;
pub use view::{ViewApplier, ViewOutcome};
