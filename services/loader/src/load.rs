//! Warehouse Loader - populates the IDA star schema from one batch
//!
//! One call to [`WarehouseLoader::load`]:
//! 1. connects (bounded retries); gives up quietly if the database is unreachable
//! 2. prepares the batch; an empty batch ends the call before any transaction
//! 3. inside a single transaction: upserts the service, group and time
//!    dimensions, reads their surrogate ids back, maps every row to its ids
//!    and bulk-inserts the facts
//! 4. commits, or rolls back on any error
//! 5. closes the connection on every path
//!
//! Nothing here returns an error to the caller: the result of the call is
//! reported as a [`LoadOutcome`] so the pipeline can continue with the next
//! batch.

use parser::Observation;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

use crate::error::WarehouseError;
use crate::model::{DimTime, DimensionIds, FactRecord, PreparedRecord};
use crate::prepare::{prepare, write_debug_snapshot};
use crate::retry::{connect_with_retry, RetryPolicy};
use crate::warehouse::{Connector, Warehouse, WarehouseTx};

/// What to do with facts that already exist for the batch's periods.
///
/// Facts carry no natural key, so re-running a load for the same period
/// appends a second copy under `Append`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FactPolicy {
    #[default]
    Append,
    /// Delete existing facts for the batch's services and months first.
    ReplacePeriods,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown fact policy '{0}' (expected 'append' or 'replace')")]
pub struct ParseFactPolicyError(String);

impl FromStr for FactPolicy {
    type Err = ParseFactPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(FactPolicy::Append),
            "replace" => Ok(FactPolicy::ReplacePeriods),
            other => Err(ParseFactPolicyError(other.to_string())),
        }
    }
}

/// How a load call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Committed { facts: u64 },
    /// No row survived preparation; no transaction was opened.
    NothingToLoad,
    /// Connect retries were exhausted; nothing was written.
    Disconnected,
    RolledBack { error: String },
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOutcome::Committed { facts } => write!(f, "committed {} facts", facts),
            LoadOutcome::NothingToLoad => write!(f, "nothing to load"),
            LoadOutcome::Disconnected => write!(f, "warehouse unreachable"),
            LoadOutcome::RolledBack { error } => write!(f, "rolled back: {}", error),
        }
    }
}

fn distinct<T: Ord + Clone>(values: impl Iterator<Item = T>) -> Vec<T> {
    values.collect::<BTreeSet<T>>().into_iter().collect()
}

/// Upsert the three dimensions referenced by `batch` and return their id maps.
pub async fn load_dimensions<T: WarehouseTx>(
    tx: &mut T,
    batch: &[PreparedRecord],
) -> Result<DimensionIds, WarehouseError> {
    let services = distinct(batch.iter().map(|r| r.service.clone()));
    tx.upsert_services(&services).await?;
    let service_ids = tx.service_ids(&services).await?;

    let groups = distinct(batch.iter().map(|r| r.group_name.clone()));
    tx.upsert_groups(&groups).await?;
    let group_ids = tx.group_ids(&groups).await?;

    let times = distinct(batch.iter().map(DimTime::from));
    tx.upsert_periods(&times).await?;
    let periods: Vec<_> = times.iter().map(|t| t.period).collect();
    let period_ids = tx.period_ids(&periods).await?;

    debug!(
        services = service_ids.len(),
        groups = group_ids.len(),
        periods = period_ids.len(),
        "dimensions loaded and mapped"
    );

    Ok(DimensionIds {
        services: service_ids,
        groups: group_ids,
        periods: period_ids,
    })
}

/// Map every prepared row to its surrogate ids.
///
/// A row whose natural key has no id fails the whole batch.
pub fn build_facts(
    batch: &[PreparedRecord],
    ids: &DimensionIds,
) -> Result<Vec<FactRecord>, WarehouseError> {
    batch
        .iter()
        .map(|r| {
            let service_id = *ids.services.get(&r.service).ok_or_else(|| {
                WarehouseError::UnresolvedKey {
                    dimension: "dim_servico",
                    key: r.service.clone(),
                }
            })?;
            let group_id = *ids.groups.get(&r.group_name).ok_or_else(|| {
                WarehouseError::UnresolvedKey {
                    dimension: "dim_grupo_economico",
                    key: r.group_name.clone(),
                }
            })?;
            let time_id = *ids.periods.get(&r.period).ok_or_else(|| {
                WarehouseError::UnresolvedKey {
                    dimension: "dim_tempo",
                    key: r.period.to_string(),
                }
            })?;

            Ok(FactRecord {
                service_id,
                group_id,
                time_id,
                indicator: r.indicator.clone(),
                value: r.value,
            })
        })
        .collect()
}

pub struct WarehouseLoader<C> {
    connector: C,
    retry: RetryPolicy,
    fact_policy: FactPolicy,
    debug_dir: Option<PathBuf>,
}

impl<C: Connector> WarehouseLoader<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            retry: RetryPolicy::default(),
            fact_policy: FactPolicy::default(),
            debug_dir: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fact_policy(mut self, policy: FactPolicy) -> Self {
        self.fact_policy = policy;
        self
    }

    /// Write a CSV snapshot of every prepared batch under `dir`.
    pub fn with_debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    /// Load one batch of observations for `service`.
    pub async fn load(&self, observations: &[Observation], service: &str) -> LoadOutcome {
        let Some(mut warehouse) = connect_with_retry(&self.connector, &self.retry).await else {
            error!(service, "warehouse unreachable, aborting load");
            return LoadOutcome::Disconnected;
        };

        let outcome = self.load_connected(&mut warehouse, observations, service).await;

        warehouse.close().await;
        debug!(service, "warehouse connection closed");
        outcome
    }

    async fn load_connected(
        &self,
        warehouse: &mut C::Warehouse,
        observations: &[Observation],
        service: &str,
    ) -> LoadOutcome {
        let batch = prepare(observations, service);

        if let Some(dir) = &self.debug_dir {
            if let Err(e) = write_debug_snapshot(&batch, dir, service) {
                warn!(service, error = %e, "could not write debug snapshot");
            }
        }

        if batch.is_empty() {
            info!(service, "no valid rows after period parsing, nothing to load");
            return LoadOutcome::NothingToLoad;
        }

        let mut tx = match warehouse.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(service, error = %e, "could not open transaction");
                return LoadOutcome::RolledBack {
                    error: e.to_string(),
                };
            }
        };

        let result = self.write_batch(&mut tx, &batch).await;
        let written = match result {
            Ok(facts) => tx.commit().await.map(|()| facts),
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(service, error = %rb, "rollback failed");
                }
                Err(e)
            }
        };

        match written {
            Ok(facts) => {
                info!(service, facts, "load committed");
                LoadOutcome::Committed { facts }
            }
            Err(e) => {
                error!(service, error = %e, "load failed, transaction rolled back");
                LoadOutcome::RolledBack {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn write_batch<T: WarehouseTx>(
        &self,
        tx: &mut T,
        batch: &[PreparedRecord],
    ) -> Result<u64, WarehouseError> {
        let ids = load_dimensions(tx, batch).await?;
        let facts = build_facts(batch, &ids)?;

        if self.fact_policy == FactPolicy::ReplacePeriods {
            let service_ids = distinct(facts.iter().map(|f| f.service_id));
            let time_ids = distinct(facts.iter().map(|f| f.time_id));
            let removed = tx.delete_facts(&service_ids, &time_ids).await?;
            info!(removed, "replaced existing facts for the batch periods");
        }

        info!(rows = facts.len(), "loading facts");
        tx.insert_facts(&facts).await
    }
}
