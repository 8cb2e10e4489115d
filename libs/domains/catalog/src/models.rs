use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

pub const NAME_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 1000;
pub const MAX_PAGE_SIZE: i32 = 1000;

// ============================================================================
// Entities
// ============================================================================

/// A category products can belong to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Category {
    /// Storage-assigned id; `0` until inserted
    pub id: i32,
    pub name: String,
    /// Products referencing this category, filled on reads only.
    /// Writes never look at it.
    pub product_ids: BTreeSet<i32>,
}

impl Category {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            product_ids: BTreeSet::new(),
        }
    }
}

/// A product with its attached categories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Raw image bytes; travels as Base64 in DTOs
    pub image: Option<Vec<u8>>,
    /// Attached categories, no two with the same id
    pub categories: Vec<Category>,
}

impl Product {
    pub fn category_ids(&self) -> Vec<i32> {
        self.categories.iter().map(|c| c.id).collect()
    }
}

// ============================================================================
// Transfer objects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDto {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryDto {
    /// Required, at most 200 characters, unique
    #[serde(default)]
    #[schema(example = "Electronics")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryDto {
    /// Must match the id in the path
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Base64-encoded image
    pub image: Option<String>,
    pub categories: Vec<CategoryDto>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductDto {
    #[serde(default)]
    #[schema(example = "Widget")]
    pub name: String,
    pub description: Option<String>,
    /// Base64 image, optionally with a `data:<mime>;base64,` prefix
    pub image: Option<String>,
    /// At least one existing category, without repeats
    pub category_ids: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductDto {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category_ids: Option<Vec<i32>>,
}

// ============================================================================
// Query parameters
// ============================================================================

/// Paging parameters; missing values fail validation
#[derive(Debug, Clone, Copy, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PagingQuery {
    /// 1-based page number
    #[serde(default)]
    #[validate(range(min = 1, message = "pageNumber must be >= 1."))]
    pub page_number: i32,
    /// Between 1 and 1000
    #[serde(default)]
    #[validate(range(min = 1, max = 1000, message = "pageSize must be between 1 and 1000."))]
    pub page_size: i32,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImagePathQuery {
    /// Public path returned by the upload endpoint
    pub path: Option<String>,
}

/// Multipart body of the image upload endpoint
#[derive(Debug, ToSchema)]
pub struct UploadImageForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadedImage {
    #[schema(example = "/uploads/3f2b8c1e-8d7a-4c52-9a43-0c1f5b7e2d10.png")]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_query_defaults_fail_validation() {
        let query: PagingQuery = serde_json::from_str("{}").unwrap();
        let errors = query.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("page_number"));
        assert!(fields.contains_key("page_size"));
    }

    #[test]
    fn test_paging_query_bounds() {
        let ok = PagingQuery {
            page_number: 1,
            page_size: MAX_PAGE_SIZE,
        };
        assert!(ok.validate().is_ok());

        let too_big = PagingQuery {
            page_number: 1,
            page_size: MAX_PAGE_SIZE + 1,
        };
        assert!(too_big.validate().is_err());
    }

    #[test]
    fn test_create_product_dto_is_camel_case() {
        let dto: CreateProductDto = serde_json::from_str(
            r#"{"name":"Widget","categoryIds":[10,20]}"#,
        )
        .unwrap();
        assert_eq!(dto.category_ids, Some(vec![10, 20]));
        assert!(dto.image.is_none());
    }
}
