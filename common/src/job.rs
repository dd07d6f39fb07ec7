use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DEFAULT_CONFIG_FILE;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Fresh random id. Ids are never reused within a process.
    pub fn generate() -> Self {
        JobId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    /// Status only moves forward: `running -> completed` or `running -> failed`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        self == next || (self == JobStatus::Running && next.is_terminal())
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Export formats the crawler can write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    /// Crawler flag selecting this export format.
    pub fn cli_flag(self) -> &'static str {
        match self {
            ExportFormat::Csv => "--export-csv",
            ExportFormat::Json => "--export-json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid export_format. Must be 'csv' or 'json'.")),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Body of `POST /crawl/`.
///
/// `export_format` stays a plain string here: an unknown value is accepted at
/// submission and turns into a failed job once the runner validates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    #[serde(default = "default_config_file")]
    pub config_file: String,
    #[serde(default = "default_export_format")]
    pub export_format: String,
    #[serde(default = "default_export_type")]
    pub export_type: String,
}

fn default_config_file() -> String { DEFAULT_CONFIG_FILE.to_string() }
fn default_export_format() -> String { "csv".to_string() }
fn default_export_type() -> String { "all_links".to_string() }

impl CrawlRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config_file: default_config_file(),
            export_format: default_export_format(),
            export_type: default_export_type(),
        }
    }

    pub fn uses_default_config(&self) -> bool {
        self.config_file == DEFAULT_CONFIG_FILE
    }
}

/// One submitted crawl and everything known about it so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub crawl_id: JobId,
    pub status: JobStatus,
    pub url: String,
    pub output_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub results_ready: bool,
    pub config_file: String,
    pub export_format: String,
    pub export_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: JobId, request: &CrawlRequest, output_path: impl Into<String>) -> Self {
        Self {
            crawl_id: id,
            status: JobStatus::Running,
            url: request.url.clone(),
            output_path: output_path.into(),
            error_message: None,
            results_ready: false,
            config_file: request.config_file.clone(),
            export_format: request.export_format.clone(),
            export_type: request.export_type.clone(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.results_ready = true;
        self.error_message = None;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.results_ready = false;
        self.error_message = Some(message.into());
        self.finished_at = Some(Utc::now());
    }
}
