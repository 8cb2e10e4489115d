//! Catalog-specific metrics.

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Catalog metrics recorder
pub struct CatalogMetrics;

impl CatalogMetrics {
    /// Record a finished use case.
    ///
    /// `outcome` is `success`, `failure` (unsuccessful envelope),
    /// `invalid` (validation) or `error`.
    pub fn record_operation(entity: &'static str, operation: &'static str, outcome: &'static str) {
        counter!(
            "catalog_operations_total",
            "entity" => entity,
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
    }

    pub fn record_validation_failed(entity: &'static str, operation: &'static str, failures: usize) {
        counter!(
            "catalog_validation_failures_total",
            "entity" => entity,
            "operation" => operation
        )
        .increment(1);

        tracing::debug!(entity, operation, failures, "Validation rejected request");
    }

    /// Set the stored count for an entity type
    pub fn set_entity_count(entity: &'static str, count: u64) {
        gauge!("catalog_entities_total", "entity" => entity).set(count as f64);
    }

    pub fn record_image_uploaded(bytes: usize) {
        counter!("catalog_image_uploads_total", "status" => "stored").increment(1);
        histogram!("catalog_image_upload_bytes").record(bytes as f64);
    }

    pub fn record_image_rejected(reason: &'static str) {
        counter!(
            "catalog_image_uploads_total",
            "status" => "rejected",
            "reason" => reason
        )
        .increment(1);
    }
}

/// Records `catalog_operation_duration_seconds` when stopped or dropped.
pub struct CatalogTimer {
    start: Instant,
    entity: &'static str,
    operation: &'static str,
    stopped: bool,
}

impl CatalogTimer {
    pub fn new(entity: &'static str, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            entity,
            operation,
            stopped: false,
        }
    }

    /// Record the duration. Returns milliseconds, or 0 if already stopped.
    pub fn stop(&mut self) -> u64 {
        if self.stopped {
            return 0;
        }
        self.stopped = true;

        let duration = self.start.elapsed();
        histogram!(
            "catalog_operation_duration_seconds",
            "entity" => self.entity,
            "operation" => self.operation
        )
        .record(duration.as_secs_f64());

        duration.as_millis() as u64
    }
}

impl Drop for CatalogTimer {
    fn drop(&mut self) {
        if !self.stopped {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_stops_once() {
        let mut timer = CatalogTimer::new("product", "update");
        timer.stop();
        assert_eq!(timer.stop(), 0);
    }
}
