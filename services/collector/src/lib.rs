//! Collector - Downloads raw IDA spreadsheets from the Anatel open data portal
//!
//! Responsibilities:
//! - Resolve a (service, year) pair to a download URL
//! - Skip the network entirely when the file is already cached locally
//! - Store the raw spreadsheet under `{service}{year}.ods`
//! - Report unavailable resources instead of failing the whole run

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

/// Default location of the IDA spreadsheets.
pub const DEFAULT_BASE_URL: &str =
    "https://www.anatel.gov.br/dadosabertos/PDA/IDA/{service}{year}.ods";

const USER_AGENT: &str = "IdaDatamart/1.0 (carga batch de indicadores de atendimento)";

/// Result of a fetch for one (service, year) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A local copy already existed; no request was made.
    Cached(PathBuf),
    /// The file was downloaded and written to the cache.
    Downloaded(PathBuf),
    /// The remote resource could not be retrieved.
    Unavailable,
}

impl FetchOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            FetchOutcome::Cached(p) | FetchOutcome::Downloaded(p) => Some(p.as_path()),
            FetchOutcome::Unavailable => None,
        }
    }
}

/// Cache file name for a dataset key.
pub fn cache_file_name(service: &str, year: i32) -> String {
    format!("{}{}.ods", service, year)
}

/// Expand the `{service}` / `{year}` placeholders of a URL template.
pub fn resolve_url(template: &str, service: &str, year: i32) -> String {
    template
        .replace("{service}", service)
        .replace("{year}", &year.to_string())
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    base_url: String,
    output_dir: PathBuf,
    force: bool,
}

impl Fetcher {
    pub fn new(base_url: impl Into<String>, output_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            output_dir: output_dir.into(),
            force: false,
        })
    }

    /// Re-download even when a cached copy exists.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Fetch the spreadsheet for `service` and `year`.
    ///
    /// Never returns an error: HTTP failures, transport failures and local
    /// write failures are logged and surface as [`FetchOutcome::Unavailable`],
    /// so the caller can move on to the next pair.
    pub async fn fetch(&self, service: &str, year: i32) -> FetchOutcome {
        let file_name = cache_file_name(service, year);
        let path = self.output_dir.join(&file_name);

        if !self.force && fs::try_exists(&path).await.unwrap_or(false) {
            info!(file = %file_name, path = %path.display(), "using cached copy");
            return FetchOutcome::Cached(path);
        }

        let url = resolve_url(&self.base_url, service, year);
        match self.download(&url, &path).await {
            Ok(()) => FetchOutcome::Downloaded(path),
            Err(e) => {
                warn!(%url, error = %e, "download failed");
                FetchOutcome::Unavailable
            }
        }
    }

    async fn download(&self, url: &str, path: &Path) -> anyhow::Result<()> {
        info!(%url, "downloading");
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let content_hash = format!("sha256:{:x}", hasher.finalize());
        info!(size_bytes = bytes.len(), hash = %content_hash, "downloaded");

        fs::create_dir_all(&self.output_dir).await?;

        // Partial downloads must never be mistaken for a cached copy.
        let part = path.with_extension("ods.part");
        fs::write(&part, &bytes).await?;
        fs::rename(&part, path).await?;

        info!(path = %path.display(), "saved");
        Ok(())
    }
}
