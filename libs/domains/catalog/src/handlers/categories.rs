//! HTTP handlers for the Categories API

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::Response as HttpResponse,
    routing::get,
};
use axum_helpers::{
    AppError, IdPath, RequestCancellation, ValidatedQuery,
    errors::responses::{
        BadRequestIdResponse, BadRequestValidationResponse, ConflictResponse,
        InternalServerErrorResponse,
    },
};
use std::sync::Arc;
use utoipa::OpenApi;

use super::{ensure_matching_id, ensure_positive_id, lookup_response, write_response};
use crate::application::CategoryApplication;
use crate::models::{CategoryDto, CreateCategoryDto, PagingQuery, UpdateCategoryDto};
use crate::repository::CategoryRepository;
use crate::response::{PagedResponse, Response, ValidationFailure};

const ENTITY: &str = "Category";

/// OpenAPI documentation for the Categories API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_categories,
        list_categories_paged,
        get_category,
        create_category,
        update_category,
        delete_category,
    ),
    components(
        schemas(CategoryDto, CreateCategoryDto, UpdateCategoryDto, ValidationFailure),
        responses(
            BadRequestIdResponse,
            BadRequestValidationResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Categories", description = "Category management endpoints")
    )
)]
pub struct ApiDoc;

/// Create the categories router
pub fn router<R: CategoryRepository + 'static>(app: CategoryApplication<R>) -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/paged", get(list_categories_paged))
        .route(
            "/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .with_state(Arc::new(app))
}

type AppState<R> = State<Arc<CategoryApplication<R>>>;

/// List all categories ordered by name
#[utoipa::path(
    get,
    path = "",
    tag = "Categories",
    responses(
        (status = 200, description = "All categories", body = Response<Vec<CategoryDto>>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_categories<R: CategoryRepository + 'static>(
    State(app): AppState<R>,
    cancellation: RequestCancellation,
) -> Result<Json<Response<Vec<CategoryDto>>>, AppError> {
    let response = app.get_all(cancellation.token()).await?;
    Ok(Json(response))
}

/// List one page of categories
#[utoipa::path(
    get,
    path = "/paged",
    tag = "Categories",
    params(PagingQuery),
    responses(
        (status = 200, description = "One page of categories", body = PagedResponse<CategoryDto>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_categories_paged<R: CategoryRepository + 'static>(
    State(app): AppState<R>,
    cancellation: RequestCancellation,
    ValidatedQuery(paging): ValidatedQuery<PagingQuery>,
) -> Result<Json<PagedResponse<CategoryDto>>, AppError> {
    let page = app
        .get_all_paged(paging.page_number, paging.page_size, cancellation.token())
        .await?;
    Ok(Json(page))
}

/// Get a category by id
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Categories",
    params(
        ("id" = i32, Path, description = "Category id")
    ),
    responses(
        (status = 200, description = "Category found", body = Response<CategoryDto>),
        (status = 400, response = BadRequestIdResponse),
        (status = 404, description = "Category not found", body = Response<CategoryDto>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_category<R: CategoryRepository + 'static>(
    State(app): AppState<R>,
    IdPath(id): IdPath,
    cancellation: RequestCancellation,
) -> Result<HttpResponse, AppError> {
    ensure_positive_id(id, ENTITY)?;
    let response = app.get(id, cancellation.token()).await?;
    Ok(lookup_response(response))
}

/// Create a category
#[utoipa::path(
    post,
    path = "",
    tag = "Categories",
    request_body = CreateCategoryDto,
    responses(
        (status = 200, description = "Category inserted", body = Response<bool>),
        (status = 400, description = "Validation errors", body = Response<bool>),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_category<R: CategoryRepository + 'static>(
    State(app): AppState<R>,
    cancellation: RequestCancellation,
    payload: Result<Json<CreateCategoryDto>, JsonRejection>,
) -> Result<HttpResponse, AppError> {
    let Json(dto) = payload?;
    let response = app.insert(dto, cancellation.token()).await?;
    Ok(write_response(response))
}

/// Rename a category
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Categories",
    params(
        ("id" = i32, Path, description = "Category id, must match the body")
    ),
    request_body = UpdateCategoryDto,
    responses(
        (status = 200, description = "Category updated", body = Response<bool>),
        (status = 400, description = "Id mismatch, validation errors or failed update", body = Response<bool>),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_category<R: CategoryRepository + 'static>(
    State(app): AppState<R>,
    IdPath(id): IdPath,
    cancellation: RequestCancellation,
    payload: Result<Json<UpdateCategoryDto>, JsonRejection>,
) -> Result<HttpResponse, AppError> {
    let Json(dto) = payload?;
    ensure_matching_id(id, dto.id, ENTITY)?;

    let response = app.update(dto, cancellation.token()).await?;
    Ok(write_response(response))
}

/// Delete a category and detach it from its products
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Categories",
    params(
        ("id" = i32, Path, description = "Category id")
    ),
    responses(
        (status = 200, description = "Category deleted", body = Response<bool>),
        (status = 400, response = BadRequestIdResponse),
        (status = 404, description = "Category not found", body = Response<bool>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_category<R: CategoryRepository + 'static>(
    State(app): AppState<R>,
    IdPath(id): IdPath,
    cancellation: RequestCancellation,
) -> Result<HttpResponse, AppError> {
    ensure_positive_id(id, ENTITY)?;
    let response = app.delete(id, cancellation.token()).await?;
    Ok(lookup_response(response))
}
