//! Query-string extractor with `validator` checks.

use crate::errors::AppError;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// Deserializes the query string and runs `Validate` on it.
///
/// Failures render as `400 VALIDATION_ERROR` with the first field message
/// as `message` and every field error under `details`.
///
/// ```ignore
/// #[derive(Deserialize, Validate)]
/// struct Paging {
///     #[validate(range(min = 1, message = "pageNumber must be >= 1."))]
///     page_number: i32,
/// }
///
/// async fn list(ValidatedQuery(paging): ValidatedQuery<Paging>) { /* ... */ }
/// ```
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}
