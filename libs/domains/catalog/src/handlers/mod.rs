//! HTTP handlers for the catalog API

pub mod categories;
pub mod images;
pub mod products;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
};
use axum_helpers::AppError;
use serde::Serialize;

use crate::response::Response;

/// Status for an envelope: 200 on success, 400 with validation failures,
/// `unsuccessful` otherwise.
fn envelope_status<T>(response: &Response<T>, unsuccessful: StatusCode) -> StatusCode {
    if response.is_success {
        StatusCode::OK
    } else if response.has_validation_errors() {
        StatusCode::BAD_REQUEST
    } else {
        unsuccessful
    }
}

/// Render a lookup or delete; an unsuccessful envelope means "not found"
pub(crate) fn lookup_response<T: Serialize>(response: Response<T>) -> HttpResponse {
    let status = envelope_status(&response, StatusCode::NOT_FOUND);
    (status, Json(response)).into_response()
}

/// Render an insert or update
pub(crate) fn write_response<T: Serialize>(response: Response<T>) -> HttpResponse {
    let status = envelope_status(&response, StatusCode::BAD_REQUEST);
    (status, Json(response)).into_response()
}

pub(crate) fn ensure_positive_id(id: i32, entity: &str) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::BadRequest(format!("{} Id is invalid.", entity)));
    }
    Ok(())
}

pub(crate) fn ensure_matching_id(path_id: i32, body_id: i32, entity: &str) -> Result<(), AppError> {
    if path_id != body_id {
        return Err(AppError::BadRequest(format!("{} Id mismatch.", entity)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ValidationFailure;

    #[test]
    fn test_envelope_status() {
        let ok = Response::success(true, "done");
        assert_eq!(envelope_status(&ok, StatusCode::NOT_FOUND), StatusCode::OK);

        let invalid = Response::<bool>::invalid(vec![ValidationFailure::new("Name", "required")]);
        assert_eq!(envelope_status(&invalid, StatusCode::NOT_FOUND), StatusCode::BAD_REQUEST);

        let missing = Response::<bool>::failure(Some(false), "Category not found.");
        assert_eq!(envelope_status(&missing, StatusCode::NOT_FOUND), StatusCode::NOT_FOUND);
        assert_eq!(envelope_status(&missing, StatusCode::BAD_REQUEST), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_id_checks() {
        assert!(ensure_positive_id(1, "Category").is_ok());
        assert!(ensure_positive_id(0, "Category").is_err());
        assert!(ensure_matching_id(3, 3, "Product").is_ok());
        assert!(matches!(
            ensure_matching_id(3, 4, "Product"),
            Err(AppError::BadRequest(msg)) if msg == "Product Id mismatch."
        ));
    }
}
