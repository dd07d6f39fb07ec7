use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::config_store::ConfigStore;
use crate::license::LicenseProvisioner;
use crate::metrics::MetricsCollector;
use crate::process::{CrawlLauncher, ProcessLauncher};
use crate::registry::JobRegistry;
use crate::runner::CrawlRunner;

/// Shared state handed to every handler via `State<AppState>`.
///
/// Cheap to clone; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<CrawlRunner>,
    pub registry: Arc<JobRegistry>,
    pub configs: Arc<ConfigStore>,
    pub license: Arc<LicenseProvisioner>,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    /// Wire the service together around an arbitrary launcher.
    pub fn with_launcher(
        config: &Config,
        license: LicenseProvisioner,
        launcher: Arc<dyn CrawlLauncher>,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let configs = Arc::new(ConfigStore::new(&config.server.config_dir));
        let license = Arc::new(license);
        let metrics = Arc::new(MetricsCollector::new());
        let runner = Arc::new(CrawlRunner::new(
            registry.clone(),
            configs.clone(),
            license.clone(),
            launcher,
            metrics.clone(),
            config.server.crawler_binary.clone(),
            config.server.crawl_data_dir.clone(),
        ));
        Self { runner, registry, configs, license, metrics }
    }

    /// Production wiring: real crawler process, license from the environment.
    pub fn from_config(config: &Config) -> Result<Self> {
        let launcher = ProcessLauncher::new(config.server.crawl_timeout()?);
        Ok(Self::with_launcher(
            config,
            LicenseProvisioner::from_config(&config.license),
            Arc::new(launcher),
        ))
    }

    /// Create the crawl output root and the configuration store.
    pub async fn init_dirs(&self) -> Result<()> {
        let root = self.runner.crawl_root();
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("Failed to create crawl data directory {:?}", root))?;
        self.configs.init().await
    }
}
