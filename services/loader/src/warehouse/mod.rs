//! Warehouse access seam.
//!
//! The load stage only needs a handful of operations against the star schema,
//! all of them scoped to one transaction. [`postgres`] implements them with
//! sqlx; tests substitute an in-memory warehouse.
//!
//! Lifecycle of one session:
//! [`Connector::connect`] -> [`Warehouse::begin`] -> operations on
//! [`WarehouseTx`] -> `commit` or `rollback` -> [`Warehouse::close`].

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::error::WarehouseError;
use crate::model::{DimTime, FactRecord};

pub mod postgres;

pub use postgres::{PgConnector, PgWarehouse, PgWarehouseTx};

/// Opens warehouse sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    type Warehouse: Warehouse;

    async fn connect(&self) -> Result<Self::Warehouse, WarehouseError>;
}

/// A live session. Must be closed explicitly once the caller is done.
#[async_trait]
pub trait Warehouse: Send {
    type Tx: WarehouseTx;

    async fn begin(&mut self) -> Result<Self::Tx, WarehouseError>;

    async fn close(self);
}

/// Operations inside one transaction.
///
/// Upserts are conflict-safe: an existing natural key is left untouched.
/// The `*_ids` lookups return the surrogate ids of the requested keys.
#[async_trait]
pub trait WarehouseTx: Send {
    async fn upsert_services(&mut self, names: &[String]) -> Result<(), WarehouseError>;

    async fn service_ids(&mut self, names: &[String])
        -> Result<HashMap<String, i32>, WarehouseError>;

    async fn upsert_groups(&mut self, names: &[String]) -> Result<(), WarehouseError>;

    async fn group_ids(&mut self, names: &[String]) -> Result<HashMap<String, i32>, WarehouseError>;

    async fn upsert_periods(&mut self, periods: &[DimTime]) -> Result<(), WarehouseError>;

    async fn period_ids(
        &mut self,
        periods: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, i32>, WarehouseError>;

    /// Remove facts matching any of the service ids and any of the time ids.
    async fn delete_facts(
        &mut self,
        service_ids: &[i32],
        time_ids: &[i32],
    ) -> Result<u64, WarehouseError>;

    /// Append fact rows, returning the number inserted.
    async fn insert_facts(&mut self, facts: &[FactRecord]) -> Result<u64, WarehouseError>;

    /// Run a SQL script verbatim.
    async fn execute_script(&mut self, sql: &str) -> Result<(), WarehouseError>;

    async fn commit(self) -> Result<(), WarehouseError>;

    async fn rollback(self) -> Result<(), WarehouseError>;
}
