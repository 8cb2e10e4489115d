//! Response envelopes returned by every catalog use case.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub property_name: String,
    pub error_message: String,
}

impl ValidationFailure {
    pub fn new(property_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            error_message: error_message.into(),
        }
    }
}

pub const VALIDATION_ERRORS_MESSAGE: &str = "Validation errors occurred.";

/// Outcome of a use case: payload, success flag, message and any
/// validation failures.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Response<T> {
    pub data: Option<T>,
    pub is_success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<ValidationFailure>,
}

impl<T> Response<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            data: Some(data),
            is_success: true,
            message: message.into(),
            validation_errors: Vec::new(),
        }
    }

    pub fn failure(data: Option<T>, message: impl Into<String>) -> Self {
        Self {
            data,
            is_success: false,
            message: message.into(),
            validation_errors: Vec::new(),
        }
    }

    pub fn invalid(failures: Vec<ValidationFailure>) -> Self {
        Self {
            data: None,
            is_success: false,
            message: VALIDATION_ERRORS_MESSAGE.to_string(),
            validation_errors: failures,
        }
    }

    pub fn has_validation_errors(&self) -> bool {
        !self.validation_errors.is_empty()
    }
}

/// A page of records plus paging metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PagedResponse<T> {
    pub data: Vec<T>,
    pub is_success: bool,
    pub message: String,
    pub page_number: i32,
    pub total_records: u64,
    pub total_pages: u64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

impl<T> PagedResponse<T> {
    pub fn new(
        data: Vec<T>,
        message: impl Into<String>,
        page_number: i32,
        page_size: i32,
        total_records: u64,
    ) -> Self {
        let total_pages = total_pages(total_records, page_size);
        Self {
            data,
            is_success: true,
            message: message.into(),
            page_number,
            total_records,
            total_pages,
            has_previous_page: page_number > 1,
            has_next_page: i64::from(page_number) < total_pages as i64,
        }
    }
}

/// `ceil(total / page_size)`, or 0 for a non-positive page size
pub fn total_pages(total_records: u64, page_size: i32) -> u64 {
    if page_size < 1 {
        return 0;
    }
    total_records.div_ceil(page_size as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(total_pages(5, 2), 3);
        assert_eq!(total_pages(4, 2), 2);
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_paged_response_flags() {
        let first = PagedResponse::<i32>::new(vec![1, 2], "ok", 1, 2, 5);
        assert!(!first.has_previous_page);
        assert!(first.has_next_page);

        let last = PagedResponse::<i32>::new(vec![5], "ok", 3, 2, 5);
        assert!(last.has_previous_page);
        assert!(!last.has_next_page);
    }

    #[test]
    fn test_invalid_response_serializes_failures() {
        let response = Response::<bool>::invalid(vec![ValidationFailure::new(
            "Name",
            "Category name is required.",
        )]);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["isSuccess"], false);
        assert_eq!(json["message"], VALIDATION_ERRORS_MESSAGE);
        assert_eq!(json["validationErrors"][0]["propertyName"], "Name");
    }

    #[test]
    fn test_success_response_omits_empty_failures() {
        let json = serde_json::to_value(Response::success(true, "done")).unwrap();
        assert!(json.get("validationErrors").is_none());
    }
}
