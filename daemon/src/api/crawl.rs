use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use common::{CrawlRequest, Job, JobId};
use tokio_util::io::ReaderStream;

use super::error::{ApiError, ApiResult};
use crate::locator;
use crate::state::AppState;

/// POST /crawl/
///
/// Registers the crawl and returns its `running` record straight away. The
/// crawler itself runs in the background.
pub async fn start_crawl(
    State(state): State<AppState>,
    Json(request): Json<CrawlRequest>,
) -> ApiResult<Json<Job>> {
    if request.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url must not be empty".to_string()));
    }
    let (job, _handle) = state.runner.submit(request);
    Ok(Json(job))
}

/// GET /crawl/status/{crawl_id}
pub async fn crawl_status(
    State(state): State<AppState>,
    Path(crawl_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.registry.get(&JobId(crawl_id))?;
    Ok(Json(job))
}

/// GET /crawl/results/{crawl_id}
///
/// Streams the export file of a completed crawl.
pub async fn crawl_results(
    State(state): State<AppState>,
    Path(crawl_id): Path<String>,
) -> ApiResult<Response> {
    let job = state.registry.get(&JobId(crawl_id))?;
    let export = locator::locate(&job).await?;

    let file = tokio::fs::File::open(&export.path)
        .await
        .map_err(|_| ApiError::NotFound(format!("Result file not found: {}", export.path.display())))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .len();
    let stream = ReaderStream::new(file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, export.content_type())
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", export.file_name.replace('"', "")),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
