//! Finds the export file a completed crawl produced.
//!
//! The crawler timestamp-prefixes its exports and its naming varies between
//! versions, so lookup is two-tier: first `*_<export_type>.<format>`, then any
//! `*.<format>`. Among matches the most recently modified file wins.

use common::{ExportFormat, Job, JobStatus};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("Crawl not yet completed or failed (status: {0}).")]
    NotReady(JobStatus),

    #[error("Invalid export_format '{0}'. Must be 'csv' or 'json'.")]
    InvalidFormat(String),

    #[error("Output directory not found for completed crawl: {}", .0.display())]
    OutputDirMissing(PathBuf),

    #[error("No {format} results found in {}. Make sure export_type '{export_type}' is correct.", .dir.display())]
    NoResults {
        dir: PathBuf,
        format: ExportFormat,
        export_type: String,
    },

    #[error("Failed to read output directory {}: {source}", .dir.display())]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The resolved export and how to serve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedExport {
    pub path: PathBuf,
    pub file_name: String,
    pub format: ExportFormat,
}

impl LocatedExport {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

pub async fn locate(job: &Job) -> Result<LocatedExport, LocateError> {
    if job.status != JobStatus::Completed || !job.results_ready {
        return Err(LocateError::NotReady(job.status));
    }
    let format: ExportFormat = job
        .export_format
        .parse()
        .map_err(|_| LocateError::InvalidFormat(job.export_format.clone()))?;

    let dir = Path::new(&job.output_path);
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return Err(LocateError::OutputDirMissing(dir.to_path_buf())),
    }

    let candidates = list_files(dir).await?;
    let exact_suffix = format!("_{}.{}", job.export_type, format.extension());
    let format_suffix = format!(".{}", format.extension());

    let chosen = freshest(&candidates, &exact_suffix)
        .or_else(|| freshest(&candidates, &format_suffix))
        .ok_or_else(|| LocateError::NoResults {
            dir: dir.to_path_buf(),
            format,
            export_type: job.export_type.clone(),
        })?;

    log::debug!("Crawl {} resolved export {:?}", job.crawl_id, chosen.path);
    Ok(LocatedExport {
        path: chosen.path.clone(),
        file_name: chosen.name.clone(),
        format,
    })
}

#[derive(Debug)]
struct Candidate {
    name: String,
    path: PathBuf,
    modified: SystemTime,
}

/// Regular files directly inside `dir`, in enumeration order.
async fn list_files(dir: &Path) -> Result<Vec<Candidate>, LocateError> {
    let io_err = |source| LocateError::Io { dir: dir.to_path_buf(), source };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        files.push(Candidate {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    Ok(files)
}

/// Newest file whose name ends with `suffix`. Ties keep the first one seen.
fn freshest<'a>(candidates: &'a [Candidate], suffix: &str) -> Option<&'a Candidate> {
    candidates
        .iter()
        .filter(|c| c.name.ends_with(suffix))
        .fold(None, |best: Option<&Candidate>, c| match best {
            Some(b) if b.modified >= c.modified => Some(b),
            _ => Some(c),
        })
}
