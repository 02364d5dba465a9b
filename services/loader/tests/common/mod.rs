#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use loader::model::{DimTime, FactRecord};
use loader::warehouse::{Connector, Warehouse, WarehouseTx};
use loader::WarehouseError;
use parser::Observation;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Star schema contents. Ids are assigned in insertion order starting at 1,
/// like a fresh SERIAL column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub services: BTreeMap<String, i32>,
    pub groups: BTreeMap<String, i32>,
    pub periods: BTreeMap<NaiveDate, (i32, i32, i32)>, // id, ano, mes
    pub facts: Vec<FactRecord>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Stats {
    pub connect_attempts: u32,
    pub connections: u32,
    pub closes: u32,
    pub begins: u32,
    pub commits: u32,
    pub rollbacks: u32,
    pub scripts: Vec<String>,
}

#[derive(Debug, Default)]
struct Shared {
    committed: Tables,
    stats: Stats,
    connect_failures: u32,
    fail_fact_insert: bool,
    fail_script: bool,
}

/// In-memory stand-in for the Postgres warehouse.
///
/// A transaction works on a copy of the committed tables and publishes it on
/// commit, so a rollback leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` connection attempts fail.
    pub fn failing_connects(self, n: u32) -> Self {
        self.shared.lock().unwrap().connect_failures = n;
        self
    }

    pub fn failing_fact_insert(self) -> Self {
        self.shared.lock().unwrap().fail_fact_insert = true;
        self
    }

    pub fn failing_script(self) -> Self {
        self.shared.lock().unwrap().fail_script = true;
        self
    }

    pub fn tables(&self) -> Tables {
        self.shared.lock().unwrap().committed.clone()
    }

    pub fn stats(&self) -> Stats {
        self.shared.lock().unwrap().stats.clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Warehouse = MemoryWarehouse;

    async fn connect(&self) -> Result<MemoryWarehouse, WarehouseError> {
        let mut shared = self.shared.lock().unwrap();
        shared.stats.connect_attempts += 1;
        if shared.connect_failures > 0 {
            shared.connect_failures -= 1;
            return Err(WarehouseError::Backend("connection refused".to_string()));
        }
        shared.stats.connections += 1;
        Ok(MemoryWarehouse {
            shared: Arc::clone(&self.shared),
        })
    }
}

pub struct MemoryWarehouse {
    shared: Arc<Mutex<Shared>>,
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    type Tx = MemoryTx;

    async fn begin(&mut self) -> Result<MemoryTx, WarehouseError> {
        let mut shared = self.shared.lock().unwrap();
        shared.stats.begins += 1;
        Ok(MemoryTx {
            shared: Arc::clone(&self.shared),
            staged: shared.committed.clone(),
            fail_fact_insert: shared.fail_fact_insert,
            fail_script: shared.fail_script,
        })
    }

    async fn close(self) {
        self.shared.lock().unwrap().stats.closes += 1;
    }
}

pub struct MemoryTx {
    shared: Arc<Mutex<Shared>>,
    staged: Tables,
    fail_fact_insert: bool,
    fail_script: bool,
}

fn upsert_names(table: &mut BTreeMap<String, i32>, names: &[String]) {
    for name in names {
        let next = table.len() as i32 + 1;
        table.entry(name.clone()).or_insert(next);
    }
}

fn lookup_names(table: &BTreeMap<String, i32>, names: &[String]) -> HashMap<String, i32> {
    names
        .iter()
        .filter_map(|n| table.get(n).map(|id| (n.clone(), *id)))
        .collect()
}

#[async_trait]
impl WarehouseTx for MemoryTx {
    async fn upsert_services(&mut self, names: &[String]) -> Result<(), WarehouseError> {
        upsert_names(&mut self.staged.services, names);
        Ok(())
    }

    async fn service_ids(
        &mut self,
        names: &[String],
    ) -> Result<HashMap<String, i32>, WarehouseError> {
        Ok(lookup_names(&self.staged.services, names))
    }

    async fn upsert_groups(&mut self, names: &[String]) -> Result<(), WarehouseError> {
        upsert_names(&mut self.staged.groups, names);
        Ok(())
    }

    async fn group_ids(&mut self, names: &[String]) -> Result<HashMap<String, i32>, WarehouseError> {
        Ok(lookup_names(&self.staged.groups, names))
    }

    async fn upsert_periods(&mut self, periods: &[DimTime]) -> Result<(), WarehouseError> {
        for t in periods {
            let next = self.staged.periods.len() as i32 + 1;
            self.staged
                .periods
                .entry(t.period)
                .or_insert((next, t.year, t.month));
        }
        Ok(())
    }

    async fn period_ids(
        &mut self,
        periods: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, i32>, WarehouseError> {
        Ok(periods
            .iter()
            .filter_map(|p| self.staged.periods.get(p).map(|(id, _, _)| (*p, *id)))
            .collect())
    }

    async fn delete_facts(
        &mut self,
        service_ids: &[i32],
        time_ids: &[i32],
    ) -> Result<u64, WarehouseError> {
        let before = self.staged.facts.len();
        self.staged
            .facts
            .retain(|f| !(service_ids.contains(&f.service_id) && time_ids.contains(&f.time_id)));
        Ok((before - self.staged.facts.len()) as u64)
    }

    async fn insert_facts(&mut self, facts: &[FactRecord]) -> Result<u64, WarehouseError> {
        if self.fail_fact_insert {
            return Err(WarehouseError::Backend(
                "violates foreign key constraint \"fato_ida_id_tempo_fkey\"".to_string(),
            ));
        }
        self.staged.facts.extend_from_slice(facts);
        Ok(facts.len() as u64)
    }

    async fn execute_script(&mut self, sql: &str) -> Result<(), WarehouseError> {
        if self.fail_script {
            return Err(WarehouseError::Backend("syntax error at or near \"VIEW\"".to_string()));
        }
        self.shared.lock().unwrap().stats.scripts.push(sql.to_string());
        Ok(())
    }

    async fn commit(self) -> Result<(), WarehouseError> {
        let mut shared = self.shared.lock().unwrap();
        shared.committed = self.staged;
        shared.stats.commits += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<(), WarehouseError> {
        self.shared.lock().unwrap().stats.rollbacks += 1;
        Ok(())
    }
}

pub fn observation(group: &str, indicator: &str, period: &str, value: f64) -> Observation {
    Observation {
        group_name: group.to_string(),
        indicator: indicator.to_string(),
        period_label: period.to_string(),
        value,
    }
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Initialize test logging (call at the start of a test).
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
