use axum::{Router, routing::get};
use domain_catalog::StorageConfig;
use tower_http::services::ServeDir;

pub mod catalog;
pub mod health;

use crate::state::AppState;

/// Creates the API routes without the `/api` prefix.
/// The `/api` prefix will be added by the `create_router` helper.
pub fn routes(state: &AppState) -> Router {
    catalog::router(state)
}

/// `/ready` with real dependency checks; merged next to `/health`.
pub fn ready_router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}

/// Prometheus scrape endpoint
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(observability::metrics_handler))
}

/// Serves stored images at the URLs returned by the upload endpoint
pub fn uploads_router(storage: &StorageConfig) -> Router {
    Router::new().nest_service(
        &format!("/{}", storage.folder()),
        ServeDir::new(storage.upload_dir()),
    )
}
