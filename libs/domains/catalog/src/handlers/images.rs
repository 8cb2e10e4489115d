//! Product image upload endpoints

use axum::{
    Json, Router,
    extract::{
        Multipart, Query, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    routing::post,
};
use axum_helpers::{
    AppError, RequestCancellation,
    errors::{ErrorResponse, responses::InternalServerErrorResponse},
};
use observability::CatalogMetrics;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::models::{ImagePathQuery, UploadImageForm, UploadedImage};
use crate::storage::{FileStorage, ImageUpload, StorageConfig, UploadRejection, check_upload};

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

/// OpenAPI documentation for the image endpoints
#[derive(OpenApi)]
#[openapi(
    paths(upload_image, delete_image),
    components(
        schemas(UploadedImage, UploadImageForm, ErrorResponse),
        responses(InternalServerErrorResponse)
    ),
    tags(
        (name = "Images", description = "Product image uploads")
    )
)]
pub struct ApiDoc;

struct ImageState {
    storage: Arc<dyn FileStorage>,
    config: StorageConfig,
}

/// Create the image router; mounted next to the product routes
pub fn router<S: FileStorage + 'static>(storage: S, config: StorageConfig) -> Router {
    let state = ImageState {
        storage: Arc::new(storage),
        config,
    };

    Router::new()
        .route("/images", post(upload_image).delete(delete_image))
        .with_state(Arc::new(state))
}

fn rejected(rejection: UploadRejection) -> AppError {
    CatalogMetrics::record_image_rejected(rejection.reason());
    AppError::BadRequest(rejection.to_string())
}

fn read_error(error: MultipartError, config: &StorageConfig) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return rejected(UploadRejection::TooLarge(config.max_file_size_bytes));
    }
    AppError::BadRequest(error.body_text())
}

/// First `file` field of the form, if any
async fn read_upload(
    mut multipart: Multipart,
    config: &StorageConfig,
) -> Result<Option<ImageUpload>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| read_error(e, config))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| read_error(e, config))?;

        return Ok(Some(ImageUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }

    Ok(None)
}

/// Upload a product image and get its public URL
#[utoipa::path(
    post,
    path = "/images",
    tag = "Images",
    request_body(content = UploadImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = UploadedImage),
        (status = 400, description = "Missing, oversized or disallowed file", body = ErrorResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn upload_image(
    State(state): State<Arc<ImageState>>,
    cancellation: RequestCancellation,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadedImage>, AppError> {
    let upload = match multipart {
        Ok(multipart) => read_upload(multipart, &state.config).await?,
        Err(_) => None,
    };
    let upload = check_upload(&state.config, upload.as_ref()).map_err(rejected)?;

    let url = state
        .storage
        .save_image(&upload.bytes, &upload.file_name, cancellation.token())
        .await?;
    CatalogMetrics::record_image_uploaded(upload.bytes.len());

    Ok(Json(UploadedImage { url }))
}

/// Delete a previously uploaded image; missing files are ignored
#[utoipa::path(
    delete,
    path = "/images",
    tag = "Images",
    params(ImagePathQuery),
    responses(
        (status = 204, description = "Image removed or never existed"),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_image(
    State(state): State<Arc<ImageState>>,
    Query(query): Query<ImagePathQuery>,
) -> StatusCode {
    if let Some(path) = query.path.as_deref() {
        state.storage.delete_if_exists(path).await;
    }
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_doc_describes_multipart_upload() {
        let doc = ApiDoc::openapi();
        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("UploadImageForm"));

        let upload = doc.paths.paths.get("/images").and_then(|item| item.post.as_ref());
        let body = upload.and_then(|op| op.request_body.as_ref()).expect("request body");
        assert!(body.content.contains_key("multipart/form-data"));
    }
}
