//! Integer path parameter extractor.

use crate::errors::AppError;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
    response::{IntoResponse, Response},
};

/// Extractor for `i32` identifiers in the path.
///
/// Rejects non-numeric segments with `400 INVALID_ID`. Range checks
/// (e.g. positive ids) are left to the handler so it can word the message.
///
/// ```ignore
/// async fn get_category(IdPath(id): IdPath) -> String {
///     format!("Category {}", id)
/// }
///
/// let app = Router::new().route("/categories/{id}", get(get_category));
/// ```
pub struct IdPath(pub i32);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| e.into_response())?;

        raw.trim()
            .parse::<i32>()
            .map(IdPath)
            .map_err(|_| AppError::InvalidId(raw).into_response())
    }
}
