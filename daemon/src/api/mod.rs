pub mod configs;
pub mod crawl;
pub mod error;
pub mod health;

use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use error::{ApiError, ApiResult};

/// Largest accepted `.seospider` upload.
pub const MAX_CONFIG_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/crawl/", post(crawl::start_crawl))
        .route("/crawl", post(crawl::start_crawl))
        .route("/crawl/status/{crawl_id}", get(crawl::crawl_status))
        .route("/crawl/results/{crawl_id}", get(crawl::crawl_results))
        .merge(configs::router())
        .merge(health::router())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
