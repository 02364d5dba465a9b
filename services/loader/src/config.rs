//! Process configuration, read once at start-up.
//!
//! Database credentials come from `POSTGRES_DB`, `POSTGRES_USER` and
//! `POSTGRES_PASSWORD`; the database itself always runs next to the job,
//! so host and port are constants. Pipeline paths have defaults that can
//! be overridden through `ETL_*` variables.

use anyhow::{Context, Result};
use sqlx::postgres::PgConnectOptions;
use std::fmt;
use std::path::PathBuf;

use crate::load::FactPolicy;
use crate::retry::RetryPolicy;

pub const DB_HOST: &str = "db";
pub const DB_PORT: u16 = 5432;

/// Services processed on every run.
pub const SERVICES: &[&str] = &["SMP", "SCM", "STFC"];
/// Years processed on every run.
pub const YEARS: &[i32] = &[2015];

pub const RAW_DIR: &str = "data/raw";
pub const TRANSFORMED_DIR: &str = "data/transformed";
pub const DEBUG_DIR: &str = "data/debug";
pub const VIEW_SCRIPT: &str = "view/view_taxa_variacao.sql";

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("{} env var missing", key))
}

#[derive(Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    pub database: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl WarehouseConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            database: required(&lookup, "POSTGRES_DB")?,
            user: required(&lookup, "POSTGRES_USER")?,
            password: required(&lookup, "POSTGRES_PASSWORD")?,
            host: DB_HOST.to_string(),
            port: DB_PORT,
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// URL template with `{service}` and `{year}` placeholders.
    pub base_url: String,
    pub raw_dir: PathBuf,
    /// Where reshaped CSV copies go; `None` disables them.
    pub transformed_dir: Option<PathBuf>,
    /// Where prepared-batch snapshots go; `None` disables them.
    pub debug_dir: Option<PathBuf>,
    pub view_script: PathBuf,
    pub header_row: usize,
    pub services: Vec<String>,
    pub years: Vec<i32>,
    pub retry: RetryPolicy,
    pub fact_policy: FactPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: collector::DEFAULT_BASE_URL.to_string(),
            raw_dir: PathBuf::from(RAW_DIR),
            transformed_dir: Some(PathBuf::from(TRANSFORMED_DIR)),
            debug_dir: Some(PathBuf::from(DEBUG_DIR)),
            view_script: PathBuf::from(VIEW_SCRIPT),
            header_row: parser::DEFAULT_HEADER_ROW,
            services: SERVICES.iter().map(|s| s.to_string()).collect(),
            years: YEARS.to_vec(),
            retry: RetryPolicy::default(),
            fact_policy: FactPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("ETL_RAW_DIR") {
            config.raw_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("ETL_TRANSFORMED_DIR") {
            config.transformed_dir = Some(PathBuf::from(dir)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(dir) = lookup("ETL_DEBUG_DIR") {
            config.debug_dir = Some(PathBuf::from(dir)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(path) = lookup("ETL_VIEW_SCRIPT") {
            config.view_script = PathBuf::from(path);
        }
        if let Some(policy) = lookup("ETL_FACT_POLICY") {
            config.fact_policy = policy
                .parse()
                .with_context(|| format!("Invalid ETL_FACT_POLICY '{}'", policy))?;
        }

        Ok(config)
    }
}
