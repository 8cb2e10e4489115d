//! Use cases for categories and products.
//!
//! Each use case returns the response envelope; validation failures and
//! "not found" outcomes travel inside it. `Err` is reserved for storage
//! errors and cancellation.

mod category;
mod product;

pub use category::CategoryApplication;
pub use product::ProductApplication;

use observability::{CatalogMetrics, CatalogTimer};
use std::future::Future;

use crate::error::{CatalogError, CatalogResult};
use crate::response::{PagedResponse, Response};

/// Metric labels for a finished use case
trait Envelope {
    fn outcome(&self) -> &'static str;

    fn validation_failures(&self) -> usize {
        0
    }
}

impl<T> Envelope for Response<T> {
    fn outcome(&self) -> &'static str {
        if self.has_validation_errors() {
            "invalid"
        } else if self.is_success {
            "success"
        } else {
            "failure"
        }
    }

    fn validation_failures(&self) -> usize {
        self.validation_errors.len()
    }
}

impl<T> Envelope for PagedResponse<T> {
    fn outcome(&self) -> &'static str {
        "success"
    }
}

/// Time `work` and count its outcome under `entity`/`operation`.
async fn observed<E, F>(entity: &'static str, operation: &'static str, work: F) -> CatalogResult<E>
where
    E: Envelope,
    F: Future<Output = CatalogResult<E>>,
{
    let mut timer = CatalogTimer::new(entity, operation);
    let result = work.await;
    timer.stop();

    let outcome = match &result {
        Ok(envelope) => {
            let failures = envelope.validation_failures();
            if failures > 0 {
                CatalogMetrics::record_validation_failed(entity, operation, failures);
            }
            envelope.outcome()
        }
        Err(CatalogError::Cancelled) => "cancelled",
        Err(_) => "error",
    };
    CatalogMetrics::record_operation(entity, operation, outcome);

    result
}
