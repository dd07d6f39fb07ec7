use common::{CrawlRequest, ExportFormat, Job, JobId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::config_store::ConfigStore;
use crate::license::LicenseProvisioner;
use crate::metrics::MetricsCollector;
use crate::process::{CrawlInvocation, CrawlLauncher, ProcessOutput};
use crate::registry::JobRegistry;

/// How a crawl ended. Every background run produces exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    Completed,
    Failed {
        /// Short failure class used for metrics.
        reason: &'static str,
        message: String,
    },
}

impl CrawlOutcome {
    fn failed(reason: &'static str, message: impl Into<String>) -> Self {
        CrawlOutcome::Failed { reason, message: message.into() }
    }
}

/// Turns crawl requests into background crawler runs and records the result.
pub struct CrawlRunner {
    registry: Arc<JobRegistry>,
    configs: Arc<ConfigStore>,
    license: Arc<LicenseProvisioner>,
    launcher: Arc<dyn CrawlLauncher>,
    metrics: Arc<MetricsCollector>,
    crawler_binary: String,
    crawl_root: PathBuf,
}

impl CrawlRunner {
    pub fn new(
        registry: Arc<JobRegistry>,
        configs: Arc<ConfigStore>,
        license: Arc<LicenseProvisioner>,
        launcher: Arc<dyn CrawlLauncher>,
        metrics: Arc<MetricsCollector>,
        crawler_binary: impl Into<String>,
        crawl_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            configs,
            license,
            launcher,
            metrics,
            crawler_binary: crawler_binary.into(),
            crawl_root: crawl_root.into(),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn crawl_root(&self) -> &Path {
        &self.crawl_root
    }

    /// Register a `running` job and start its crawl in the background.
    ///
    /// Returns immediately. The handle resolves once the job has reached a
    /// terminal status; callers that only need the id may drop it.
    pub fn submit(self: &Arc<Self>, request: CrawlRequest) -> (Job, JoinHandle<()>) {
        let job = self.registry.create(&request, &self.crawl_root);
        self.metrics.record_submitted();
        log::info!("Crawl {} submitted for {}", job.crawl_id, job.url);

        let runner = Arc::clone(self);
        let id = job.crawl_id.clone();
        let output_dir = PathBuf::from(&job.output_path);
        let handle = tokio::spawn(async move {
            runner.supervise(id, request, output_dir).await;
        });
        (job, handle)
    }

    /// Runs the crawl in its own task so that even a panic inside it ends
    /// with a terminal status.
    async fn supervise(self: Arc<Self>, id: JobId, request: CrawlRequest, output_dir: PathBuf) {
        let started = Instant::now();
        let runner = Arc::clone(&self);
        let inner_id = id.clone();
        let inner = tokio::spawn(async move { runner.run(&inner_id, &request, &output_dir).await });

        let outcome = match inner.await {
            Ok(outcome) => outcome,
            Err(e) => CrawlOutcome::failed("panic", format!("Crawl task panicked: {}", e)),
        };
        self.finish(&id, outcome, started);
    }

    async fn run(&self, id: &JobId, request: &CrawlRequest, output_dir: &Path) -> CrawlOutcome {
        if let Err(e) = self.license.ensure().await {
            log::error!("Crawl {}: license provisioning failed: {:#}", id, e);
            return CrawlOutcome::failed("license", format!("License write failed: {:#}", e));
        }

        let config_path = self.configs.resolve(&request.config_file).await;
        if config_path.is_none() && !request.uses_default_config() {
            return CrawlOutcome::failed(
                "config",
                format!("Config file '{}' not found.", request.config_file),
            );
        }

        let format: ExportFormat = match request.export_format.parse() {
            Ok(format) => format,
            Err(e) => return CrawlOutcome::failed("validation", e.to_string()),
        };

        if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
            return CrawlOutcome::failed(
                "launch",
                format!("Failed to create output directory {}: {}", output_dir.display(), e),
            );
        }

        let invocation = self.build_invocation(
            &request.url,
            output_dir,
            config_path.as_deref(),
            format,
            &request.export_type,
        );
        log::debug!("Crawl {}: {} {:?}", id, invocation.program, invocation.args);

        match self.launcher.launch(&invocation).await {
            Ok(output) => {
                log_crawl_output(id, &output);
                if output.success() {
                    CrawlOutcome::Completed
                } else {
                    CrawlOutcome::failed("exit", exit_failure_message(&output))
                }
            }
            Err(e) => CrawlOutcome::failed("launch", format!("{:#}", e)),
        }
    }

    /// Crawler command line: headless crawl into `output_dir` with timestamped
    /// output, EULA accepted, optional config, one export flag pair.
    pub fn build_invocation(
        &self,
        url: &str,
        output_dir: &Path,
        config: Option<&Path>,
        format: ExportFormat,
        export_type: &str,
    ) -> CrawlInvocation {
        let mut invocation = CrawlInvocation::new(&self.crawler_binary);
        invocation
            .args(["--crawl", url, "--headless"])
            .arg("--output-folder")
            .arg(output_dir.to_string_lossy())
            .args(["--timestamped-output", "--accepteula"]);
        if let Some(config) = config {
            invocation.arg("--config").arg(config.to_string_lossy());
        }
        invocation.args([format.cli_flag(), export_type]);
        invocation
    }

    fn finish(&self, id: &JobId, outcome: CrawlOutcome, started: Instant) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let recorded = match &outcome {
            CrawlOutcome::Completed => {
                self.metrics.record_completed(elapsed_ms);
                log::info!("Crawl {} completed in {}ms", id, elapsed_ms);
                self.registry.mark_completed(id)
            }
            CrawlOutcome::Failed { reason, message } => {
                self.metrics.record_failed(*reason);
                log::warn!("Crawl {} failed ({}): {}", id, reason, message);
                self.registry.mark_failed(id, message.clone())
            }
        };
        if let Err(e) = recorded {
            log::error!("Crawl {}: could not record outcome: {}", id, e);
        }
    }
}

fn exit_failure_message(output: &ProcessOutput) -> String {
    let stderr = output.stderr_lossy();
    if !stderr.trim().is_empty() {
        return stderr;
    }
    match output.exit_code {
        Some(code) => format!("Crawler exited with code {}", code),
        None => "Crawler was terminated by a signal".to_string(),
    }
}

fn log_crawl_output(id: &JobId, output: &ProcessOutput) {
    log::info!(
        target: "crawl_output",
        "Crawl: {} exit={:?}\nStdout:\n{}\nStderr:\n{}",
        id,
        output.exit_code,
        output.stdout_lossy(),
        output.stderr_lossy()
    );
}
