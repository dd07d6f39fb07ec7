use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::ErrorBody;

use crate::config_store::UploadError;
use crate::locator::LocateError;
use crate::registry::RegistryError;

/// Error type for HTTP handlers.
///
/// Every variant renders as `{"error": <detail>, "code": <CODE>}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Results were requested for a crawl that is still running or failed.
    #[error("{0}")]
    NotReady(String),

    /// The registry and the filesystem disagree (e.g. a completed crawl's
    /// output directory is gone).
    #[error("{0}")]
    ResourceMissing(String),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotReady(_) => (StatusCode::BAD_REQUEST, "NOT_READY"),
            ApiError::ResourceMissing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RESOURCE_MISSING"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            log::error!("{} {}: {}", status.as_u16(), code, self);
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => ApiError::NotFound("Crawl ID not found.".to_string()),
            other @ RegistryError::IllegalTransition { .. } => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<LocateError> for ApiError {
    fn from(err: LocateError) -> Self {
        let message = err.to_string();
        match err {
            LocateError::NotReady(_) | LocateError::InvalidFormat(_) => ApiError::NotReady(message),
            LocateError::NoResults { .. } => ApiError::NotFound(message),
            LocateError::OutputDirMissing(_) => ApiError::ResourceMissing(message),
            LocateError::Io { .. } => ApiError::Internal(message),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        let message = err.to_string();
        match err {
            UploadError::InvalidExtension | UploadError::InvalidName(_) => ApiError::BadRequest(message),
            UploadError::Write(_) => ApiError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{JobId, JobStatus};
    use http_body_util::BodyExt;
    use std::path::PathBuf;

    async fn render(err: ApiError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unknown_crawl_is_404() {
        let (status, body) = render(RegistryError::NotFound(JobId("x".into())).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "NOT_FOUND");
        assert_eq!(body.error, "Crawl ID not found.");
    }

    #[tokio::test]
    async fn test_locate_errors_map_to_status_classes() {
        let (status, body) = render(LocateError::NotReady(JobStatus::Running).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "NOT_READY");

        let missing = PathBuf::from("/data/crawls/abc");
        let (status, body) = render(LocateError::OutputDirMissing(missing).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.error.contains("/data/crawls/abc"));

        let no_results = LocateError::NoResults {
            dir: PathBuf::from("/data/crawls/abc"),
            format: common::ExportFormat::Csv,
            export_type: "all_links".into(),
        };
        let (status, body) = render(no_results.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.error.contains("all_links"));
    }

    #[tokio::test]
    async fn test_upload_errors() {
        let (status, body) = render(UploadError::InvalidExtension.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Invalid file type. Only .seospider files are allowed.");

        let (status, body) = render(UploadError::Write(anyhow::anyhow!("disk full")).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Could not upload file: disk full");
    }
}
