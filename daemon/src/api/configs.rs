use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::{ConfigList, UploadResponse};

use super::error::{ApiError, ApiResult};
use super::MAX_CONFIG_UPLOAD_BYTES;
use crate::state::AppState;

/// POST /config/upload/
///
/// Multipart upload of a single `.seospider` file in the `file` field. The
/// stored name is the uploaded file name, which crawls then reference as
/// `config_file`.
pub async fn upload_config(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("Uploaded file has no file name.".to_string()))?;

        // Reject before reading the body so a bad upload never touches disk.
        if !filename.ends_with(common::CONFIG_EXTENSION) {
            return Err(crate::config_store::UploadError::InvalidExtension.into());
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        state.configs.save(&filename, &data).await?;

        return Ok(Json(UploadResponse {
            message: format!("Config file '{}' uploaded successfully.", filename),
        }));
    }

    Err(ApiError::BadRequest("No file provided in the 'file' field.".to_string()))
}

/// GET /config/list/
pub async fn list_configs(State(state): State<AppState>) -> ApiResult<Json<ConfigList>> {
    let config_files = state
        .configs
        .list()
        .await
        .map_err(|e| ApiError::Internal(format!("Error listing config files: {:#}", e)))?;
    Ok(Json(ConfigList { config_files }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/config/upload/",
            post(upload_config).layer(DefaultBodyLimit::max(MAX_CONFIG_UPLOAD_BYTES)),
        )
        .route(
            "/config/upload",
            post(upload_config).layer(DefaultBodyLimit::max(MAX_CONFIG_UPLOAD_BYTES)),
        )
        .route("/config/list/", get(list_configs))
        .route("/config/list", get(list_configs))
}
