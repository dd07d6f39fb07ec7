use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_crawl_data_dir")]
    pub crawl_data_dir: PathBuf,
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    #[serde(default = "default_crawler_binary")]
    pub crawler_binary: String,
    /// e.g. "90m". No timeout when unset.
    #[serde(default)]
    pub crawl_timeout: Option<String>,
}

fn default_listen_addr() -> String { common::DEFAULT_LISTEN_ADDR.to_string() }
fn default_crawl_data_dir() -> PathBuf { PathBuf::from(common::DEFAULT_CRAWL_DATA_DIR) }
fn default_config_dir() -> PathBuf { PathBuf::from(common::DEFAULT_CONFIG_DIR) }
fn default_crawler_binary() -> String { common::DEFAULT_CRAWLER_BINARY.to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            crawl_data_dir: default_crawl_data_dir(),
            config_dir: default_config_dir(),
            crawler_binary: default_crawler_binary(),
            crawl_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn crawl_timeout(&self) -> Result<Option<Duration>> {
        let timeout = self
            .crawl_timeout
            .as_deref()
            .map(common::parse_duration)
            .transpose()
            .context("Invalid server.crawl_timeout")?;
        if timeout.is_some_and(|t| t.is_zero()) {
            return Err(anyhow::anyhow!("server.crawl_timeout must be greater than zero"));
        }
        Ok(timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseConfig {
    #[serde(default = "default_name_env")]
    pub name_env: String,
    #[serde(default = "default_key_env")]
    pub key_env: String,
    #[serde(default = "default_license_dir")]
    pub directory: String,
}

fn default_name_env() -> String { common::DEFAULT_LICENSE_NAME_ENV.to_string() }
fn default_key_env() -> String { common::DEFAULT_LICENSE_KEY_ENV.to_string() }
fn default_license_dir() -> String { common::DEFAULT_LICENSE_DIR.to_string() }

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            name_env: default_name_env(),
            key_env: default_key_env(),
            directory: default_license_dir(),
        }
    }
}

impl LicenseConfig {
    /// License directory with a leading `~` expanded to the user's home.
    pub fn resolved_directory(&self) -> PathBuf {
        expand_home(&self.directory)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub output: Option<PathBuf>,
    /// Separate file for captured crawler stdout/stderr.
    pub crawl_output: Option<PathBuf>,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: None,
            crawl_output: None,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub license: LicenseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Detect file type by extension and load
    pub fn from_file(path: &Path) -> Result<Self> {
        let ext = path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        let config = match ext {
            "yaml" | "yml" => Self::from_yaml_file(path)?,
            "toml" => Self::from_toml_file(path)?,
            _ => return Err(anyhow::anyhow!("Unsupported config file format. Use .yaml, .yml, or .toml")),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.crawl_timeout()?;
        if self.server.crawler_binary.trim().is_empty() {
            return Err(anyhow::anyhow!("server.crawler_binary must not be empty"));
        }
        Ok(())
    }
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_container_layout() {
        let config = Config::default();
        assert_eq!(config.server.crawl_data_dir, PathBuf::from("/app/data/crawls"));
        assert_eq!(config.server.config_dir, PathBuf::from("/app/config"));
        assert_eq!(config.server.crawler_binary, "screamingfrogseospider");
        assert_eq!(config.license.name_env, "SF_LICENSE_NAME");
        assert_eq!(config.license.key_env, "SF_LICENCE_KEY");
        assert!(config.server.crawl_timeout().unwrap().is_none());
    }

    #[test]
    fn test_zero_or_malformed_timeout_is_rejected() {
        let mut config = Config::default();
        config.server.crawl_timeout = Some("0s".to_string());
        assert!(config.validate().is_err());

        config.server.crawl_timeout = Some("5µ".to_string());
        assert!(config.validate().is_err());

        config.server.crawl_timeout = Some("18446744073709551615h".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_partial_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sfcrawl.yaml");
        fs::write(&path, "server:\n  listen_addr: 127.0.0.1:9000\n  crawl_timeout: 30m\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.server.crawl_timeout().unwrap(), Some(Duration::from_secs(1800)));
        assert_eq!(config.server.config_dir, PathBuf::from("/app/config"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sfcrawl.toml");
        fs::write(&path, "[server]\ncrawler_binary = \"/opt/sf/bin/sf\"\n\n[logging]\nlevel = \"debug\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.crawler_binary, "/opt/sf/bin/sf");
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn test_rejects_bad_timeout_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sfcrawl.yaml");
        fs::write(&path, "server:\n  crawl_timeout: soon\n").unwrap();
        assert!(Config::from_file(&path).is_err());

        let ini = dir.path().join("sfcrawl.ini");
        fs::write(&ini, "").unwrap();
        assert!(Config::from_file(&ini).is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/etc/sf"), PathBuf::from("/etc/sf"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.screamingfrog/seospider"), home.join(".screamingfrog/seospider"));
        }
    }
}
