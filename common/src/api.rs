use serde::{Deserialize, Serialize};

/// Body returned by `POST /config/upload/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
}

/// Body returned by `GET /config/list/`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigList {
    pub config_files: Vec<String>,
}

/// Error body produced by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Crawls registered since the service started.
    #[serde(default)]
    pub crawls_total: usize,
    #[serde(default)]
    pub crawls_running: usize,
}
