//! Applies the reporting view script once all loads are done.

use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::retry::{connect_with_retry, RetryPolicy};
use crate::warehouse::{Connector, Warehouse, WarehouseTx};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    Applied,
    ScriptMissing,
    Disconnected,
    Failed { error: String },
}

pub struct ViewApplier<C> {
    connector: C,
    script_path: PathBuf,
    retry: RetryPolicy,
}

impl<C: Connector> ViewApplier<C> {
    /// A single connection attempt is made unless [`with_retry`](Self::with_retry) says otherwise.
    pub fn new(connector: C, script_path: impl Into<PathBuf>) -> Self {
        Self {
            connector,
            script_path: script_path.into(),
            retry: RetryPolicy::once(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Execute the script verbatim in one transaction. Failures are logged, never raised.
    pub async fn apply(&self) -> ViewOutcome {
        info!(path = %self.script_path.display(), "reading view script");
        let script = match tokio::fs::read_to_string(&self.script_path).await {
            Ok(s) => s,
            Err(e) => {
                error!(path = %self.script_path.display(), error = %e, "view script not found");
                return ViewOutcome::ScriptMissing;
            }
        };

        let Some(mut warehouse) = connect_with_retry(&self.connector, &self.retry).await else {
            error!("warehouse unreachable, skipping view creation");
            return ViewOutcome::Disconnected;
        };

        let outcome = match warehouse.begin().await {
            Ok(mut tx) => {
                let result = tx.execute_script(&script).await;
                match result {
                    Ok(()) => match tx.commit().await {
                        Ok(()) => ViewOutcome::Applied,
                        Err(e) => ViewOutcome::Failed {
                            error: e.to_string(),
                        },
                    },
                    Err(e) => {
                        if let Err(rb) = tx.rollback().await {
                            warn!(error = %rb, "rollback failed");
                        }
                        ViewOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            }
            Err(e) => ViewOutcome::Failed {
                error: e.to_string(),
            },
        };

        match &outcome {
            ViewOutcome::Applied => info!("view created/updated"),
            ViewOutcome::Failed { error } => error!(%error, "view script failed"),
            _ => {}
        }

        warehouse.close().await;
        outcome
    }
}
