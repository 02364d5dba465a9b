//! Orchestrator - fetch, reshape and load every configured (service, year) pair
//!
//! Pairs are processed strictly one after the other. A failure in any stage
//! is contained to its pair; the view is applied once at the end.

use collector::{FetchOutcome, Fetcher};
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::load::{LoadOutcome, WarehouseLoader};
use crate::view::{ViewApplier, ViewOutcome};
use crate::warehouse::Connector;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub loaded: usize,
    pub facts: u64,
    pub skipped_unavailable: usize,
    pub skipped_empty: usize,
    pub failed: usize,
    pub view: Option<ViewOutcome>,
}

pub struct Pipeline<C> {
    config: PipelineConfig,
    fetcher: Fetcher,
    loader: WarehouseLoader<C>,
    view: ViewApplier<C>,
}

impl<C: Connector + Clone> Pipeline<C> {
    pub fn new(config: PipelineConfig, connector: C) -> anyhow::Result<Self> {
        let fetcher = Fetcher::new(&config.base_url, &config.raw_dir)?;
        let loader = WarehouseLoader::new(connector.clone())
            .with_retry(config.retry)
            .with_fact_policy(config.fact_policy)
            .with_debug_dir(config.debug_dir.clone());
        let view = ViewApplier::new(connector, &config.view_script);

        Ok(Self {
            config,
            fetcher,
            loader,
            view,
        })
    }

    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        for &year in &self.config.years {
            for service in &self.config.services {
                info!(service = %service, year, "--- processing ---");
                self.run_pair(service, year, &mut summary).await;
            }
        }

        info!("ETL finished, applying view");
        summary.view = Some(self.view.apply().await);

        info!(
            loaded = summary.loaded,
            facts = summary.facts,
            unavailable = summary.skipped_unavailable,
            empty = summary.skipped_empty,
            failed = summary.failed,
            "=== run summary ==="
        );
        summary
    }

    async fn run_pair(&self, service: &str, year: i32, summary: &mut RunSummary) {
        let outcome = self.fetcher.fetch(service, year).await;
        let Some(path) = outcome.path() else {
            warn!(service, year, "download failed, skipping");
            summary.skipped_unavailable += 1;
            return;
        };

        let observations = match self.reshape(path) {
            Ok(obs) => obs,
            Err(e) => {
                error!(service, year, error = %e, "transformation failed, skipping");
                summary.failed += 1;
                return;
            }
        };

        if observations.is_empty() {
            info!(service, year, "no data to load");
            summary.skipped_empty += 1;
            return;
        }

        match self.loader.load(&observations, service).await {
            LoadOutcome::Committed { facts } => {
                summary.loaded += 1;
                summary.facts += facts;
            }
            LoadOutcome::NothingToLoad => summary.skipped_empty += 1,
            LoadOutcome::Disconnected | LoadOutcome::RolledBack { .. } => summary.failed += 1,
        }
    }

    fn reshape(&self, path: &Path) -> anyhow::Result<Vec<parser::Observation>> {
        let observations = parser::wide_to_long(path, self.config.header_row)?;

        if let (Some(dir), Some(stem)) = (
            &self.config.transformed_dir,
            path.file_stem().and_then(|s| s.to_str()),
        ) {
            if let Err(e) = parser::write_snapshot(&observations, dir, stem) {
                warn!(error = %e, "could not save transformed copy");
            }
        }

        Ok(observations)
    }
}
