use anyhow::{Context, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use common::CONFIG_EXTENSION;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid file type. Only {} files are allowed.", CONFIG_EXTENSION)]
    InvalidExtension,

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("Could not upload file: {0:#}")]
    Write(#[from] anyhow::Error),
}

/// Flat directory of uploaded `.seospider` crawl configurations.
///
/// Uploads of the same name are serialized. Each upload lands in a hidden
/// temporary file that is renamed into place, so readers see either the old
/// or the new content.
pub struct ConfigStore {
    dir: PathBuf,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_locks: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create config directory {:?}", self.dir))
    }

    /// Path of a stored configuration, or `None` if it does not exist.
    pub async fn resolve(&self, name: &str) -> Option<PathBuf> {
        if !common::is_plain_file_name(name) {
            return None;
        }
        let path = self.dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    pub async fn save(&self, name: &str, content: &[u8]) -> Result<PathBuf, UploadError> {
        if !name.ends_with(CONFIG_EXTENSION) {
            return Err(UploadError::InvalidExtension);
        }
        if !common::is_plain_file_name(name) || name.starts_with('.') {
            return Err(UploadError::InvalidName(name.to_string()));
        }

        let lock = self
            .write_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let target = self.dir.join(name);
        let staging = self
            .dir
            .join(format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple()));

        let written = write_then_rename(&staging, &target, content).await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(UploadError::Write(e));
        }

        log::info!("Config file '{}' stored ({} bytes)", name, content.len());
        Ok(target)
    }

    /// Names of all stored configurations, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Error listing config files in {:?}", self.dir))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !name.ends_with(CONFIG_EXTENSION) {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

async fn write_then_rename(staging: &Path, target: &Path, content: &[u8]) -> Result<()> {
    tokio::fs::write(staging, content)
        .await
        .with_context(|| format!("Failed to write {:?}", staging))?;
    tokio::fs::rename(staging, target)
        .await
        .with_context(|| format!("Failed to move upload into {:?}", target))
}
