use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

use crate::config::LicenseConfig;

/// Name and key the crawler reads from its `licence.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseCredentials {
    pub name: String,
    pub key: String,
}

impl LicenseCredentials {
    /// Read both values from the environment. Returns `None` when either is
    /// missing or blank.
    pub fn from_env(name_env: &str, key_env: &str) -> Option<Self> {
        let name = std::env::var(name_env).ok().filter(|v| !v.trim().is_empty())?;
        let key = std::env::var(key_env).ok().filter(|v| !v.trim().is_empty())?;
        Some(Self { name, key })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseState {
    Written,
    Unlicensed,
}

/// Writes the crawler license file once per process.
///
/// Every job awaits [`LicenseProvisioner::ensure`] before spawning. The first
/// caller performs the write, concurrent callers wait for it, and later callers
/// see the cached outcome. A failed write is not cached, so the next job retries.
pub struct LicenseProvisioner {
    credentials: Option<LicenseCredentials>,
    directory: PathBuf,
    state: OnceCell<LicenseState>,
}

impl LicenseProvisioner {
    pub fn new(credentials: Option<LicenseCredentials>, directory: impl Into<PathBuf>) -> Self {
        Self {
            credentials,
            directory: directory.into(),
            state: OnceCell::new(),
        }
    }

    pub fn from_config(config: &LicenseConfig) -> Self {
        Self::new(
            LicenseCredentials::from_env(&config.name_env, &config.key_env),
            config.resolved_directory(),
        )
    }

    pub fn license_path(&self) -> PathBuf {
        self.directory.join(common::LICENSE_FILE_NAME)
    }

    pub async fn ensure(&self) -> Result<LicenseState> {
        let state = self.state.get_or_try_init(|| self.provision()).await?;
        Ok(*state)
    }

    async fn provision(&self) -> Result<LicenseState> {
        match &self.credentials {
            Some(credentials) => {
                let path = self.license_path();
                write_license(&path, credentials).await?;
                log::info!("Screaming Frog license (name and key) written to {:?}", path);
                Ok(LicenseState::Written)
            }
            None => {
                log::warn!("License name/key not set in the environment. Crawls are limited to 500 URLs.");
                Ok(LicenseState::Unlicensed)
            }
        }
    }
}

async fn write_license(path: &Path, credentials: &LicenseCredentials) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create license directory {:?}", dir))?;
    }
    let content = format!("{}\n{}\n", credentials.name, credentials.key);
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write license file {:?}", path))?;
    Ok(())
}
