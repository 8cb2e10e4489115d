//! Prometheus metrics for the catalog service.
//!
//! - recorder installation and the `/metrics` handler
//! - [`CatalogMetrics`] counters for catalog use cases
//! - axum middleware for per-route request metrics
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler, CatalogMetrics};
//!
//! init_metrics();
//! CatalogMetrics::record_operation("category", "insert", "success");
//!
//! let app = Router::new().route("/metrics", get(metrics_handler));
//! ```

pub mod catalog;
pub mod middleware;

pub use catalog::{CatalogMetrics, CatalogTimer};
pub use middleware::metrics_middleware;

pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder once per process.
///
/// Returns `None` when another global recorder is already installed; metrics
/// calls then go to that recorder and `/metrics` reports it is not
/// initialized.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Some(handle);
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_metric_descriptions();
            info!("Prometheus metrics recorder initialized");
            Some(METRICS_HANDLE.get_or_init(|| handle))
        }
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for `/metrics`
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // HTTP
    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );

    // Catalog
    describe_counter!(
        "catalog_operations_total",
        "Catalog use cases by entity, operation and outcome"
    );
    describe_histogram!(
        "catalog_operation_duration_seconds",
        "Catalog use case duration in seconds"
    );
    describe_counter!(
        "catalog_validation_failures_total",
        "Requests rejected by validation, by entity and operation"
    );
    describe_gauge!(
        "catalog_entities_total",
        "Stored entities by type, as of the last count"
    );
    describe_counter!("catalog_image_uploads_total", "Image uploads by outcome");
    describe_histogram!(
        "catalog_image_upload_bytes",
        "Size of accepted image uploads in bytes"
    );
}
