pub mod api;
pub mod duration;
pub mod job;

pub use api::{ConfigList, ErrorBody, HealthResponse, UploadResponse};
pub use duration::{format_duration, parse_duration};
pub use job::{CrawlRequest, ExportFormat, Job, JobId, JobStatus};

// Container paths
pub const DEFAULT_CRAWL_DATA_DIR: &str = "/app/data/crawls";
pub const DEFAULT_CONFIG_DIR: &str = "/app/config";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

// Crawler contract
pub const DEFAULT_CRAWLER_BINARY: &str = "screamingfrogseospider";
pub const DEFAULT_CONFIG_FILE: &str = "default_config.seospider";
pub const CONFIG_EXTENSION: &str = ".seospider";

// License provisioning
pub const DEFAULT_LICENSE_NAME_ENV: &str = "SF_LICENSE_NAME";
pub const DEFAULT_LICENSE_KEY_ENV: &str = "SF_LICENCE_KEY";
pub const DEFAULT_LICENSE_DIR: &str = "~/.screamingfrog/seospider";
pub const LICENSE_FILE_NAME: &str = "licence.txt";

/// True when `name` is a bare file name that is safe to join onto a directory.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
