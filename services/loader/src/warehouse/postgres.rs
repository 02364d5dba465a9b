//! PostgreSQL star schema in `datamart_ida`.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use std::time::Duration;

use super::{Connector, Warehouse, WarehouseTx};
use crate::error::WarehouseError;
use crate::model::{DimTime, FactRecord};

/// Postgres caps a statement at 65535 bind parameters.
const MAX_BINDS: usize = 65_535;

/// Rows per INSERT for a table with `columns` bound columns.
fn rows_per_statement(columns: usize) -> usize {
    MAX_BINDS / columns
}

#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
    acquire_timeout: Duration,
}

impl PgConnector {
    pub fn new(options: PgConnectOptions) -> Self {
        Self {
            options,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Warehouse = PgWarehouse;

    async fn connect(&self) -> Result<PgWarehouse, WarehouseError> {
        // One connection per session: the pool is only a scoped handle.
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(self.options.clone())
            .await?;

        Ok(PgWarehouse { pool })
    }
}

pub struct PgWarehouse {
    pool: PgPool,
}

#[async_trait]
impl Warehouse for PgWarehouse {
    type Tx = PgWarehouseTx;

    async fn begin(&mut self) -> Result<PgWarehouseTx, WarehouseError> {
        Ok(PgWarehouseTx {
            tx: self.pool.begin().await?,
        })
    }

    async fn close(self) {
        self.pool.close().await;
    }
}

/// Dropping without `commit` rolls the transaction back.
pub struct PgWarehouseTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl WarehouseTx for PgWarehouseTx {
    async fn upsert_services(&mut self, names: &[String]) -> Result<(), WarehouseError> {
        for chunk in names.chunks(rows_per_statement(1)) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO datamart_ida.dim_servico (nome_servico) ");
            qb.push_values(chunk, |mut b, name| {
                b.push_bind(name);
            });
            qb.push(" ON CONFLICT (nome_servico) DO NOTHING");
            qb.build().execute(&mut *self.tx).await?;
        }
        Ok(())
    }

    async fn service_ids(
        &mut self,
        names: &[String],
    ) -> Result<HashMap<String, i32>, WarehouseError> {
        let rows: Vec<(i32, String)> = sqlx::query_as(
            "SELECT id_servico, nome_servico FROM datamart_ida.dim_servico WHERE nome_servico = ANY($1)",
        )
        .bind(names)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(|(id, name)| (name, id)).collect())
    }

    async fn upsert_groups(&mut self, names: &[String]) -> Result<(), WarehouseError> {
        for chunk in names.chunks(rows_per_statement(1)) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO datamart_ida.dim_grupo_economico (nome_grupo) ");
            qb.push_values(chunk, |mut b, name| {
                b.push_bind(name);
            });
            qb.push(" ON CONFLICT (nome_grupo) DO NOTHING");
            qb.build().execute(&mut *self.tx).await?;
        }
        Ok(())
    }

    async fn group_ids(&mut self, names: &[String]) -> Result<HashMap<String, i32>, WarehouseError> {
        let rows: Vec<(i32, String)> = sqlx::query_as(
            "SELECT id_grupo, nome_grupo FROM datamart_ida.dim_grupo_economico WHERE nome_grupo = ANY($1)",
        )
        .bind(names)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(|(id, name)| (name, id)).collect())
    }

    async fn upsert_periods(&mut self, periods: &[DimTime]) -> Result<(), WarehouseError> {
        for chunk in periods.chunks(rows_per_statement(3)) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO datamart_ida.dim_tempo (ano, mes, mes_ano) ");
            qb.push_values(chunk, |mut b, t| {
                b.push_bind(t.year).push_bind(t.month).push_bind(t.period);
            });
            qb.push(" ON CONFLICT (mes_ano) DO NOTHING");
            qb.build().execute(&mut *self.tx).await?;
        }
        Ok(())
    }

    async fn period_ids(
        &mut self,
        periods: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, i32>, WarehouseError> {
        let rows: Vec<(i32, NaiveDate)> = sqlx::query_as(
            "SELECT id_tempo, mes_ano FROM datamart_ida.dim_tempo WHERE mes_ano = ANY($1)",
        )
        .bind(periods)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(|(id, period)| (period, id)).collect())
    }

    async fn delete_facts(
        &mut self,
        service_ids: &[i32],
        time_ids: &[i32],
    ) -> Result<u64, WarehouseError> {
        let result = sqlx::query(
            "DELETE FROM datamart_ida.fato_ida WHERE id_servico = ANY($1) AND id_tempo = ANY($2)",
        )
        .bind(service_ids)
        .bind(time_ids)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_facts(&mut self, facts: &[FactRecord]) -> Result<u64, WarehouseError> {
        let mut inserted = 0;
        for chunk in facts.chunks(rows_per_statement(5)) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO datamart_ida.fato_ida (id_servico, id_grupo, id_tempo, indicador, valor) ",
            );
            qb.push_values(chunk, |mut b, f| {
                b.push_bind(f.service_id)
                    .push_bind(f.group_id)
                    .push_bind(f.time_id)
                    .push_bind(&f.indicator)
                    .push_bind(f.value);
            });
            inserted += qb.build().execute(&mut *self.tx).await?.rows_affected();
        }
        Ok(inserted)
    }

    async fn execute_script(&mut self, sql: &str) -> Result<(), WarehouseError> {
        sqlx::Executor::execute(&mut *self.tx, sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), WarehouseError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), WarehouseError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_statement_stays_under_bind_limit() {
        assert_eq!(rows_per_statement(1), 65_535);
        assert_eq!(rows_per_statement(5), 13_107);
        assert!(rows_per_statement(3) * 3 <= MAX_BINDS);
    }
}
