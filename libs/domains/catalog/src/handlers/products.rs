//! HTTP handlers for the Products API

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
use crate::application::ProductApplication;
use crate::models::{CategoryDto, CreateProductDto, PagingQuery, ProductDto, UpdateProductDto};
use crate::repository::{CategoryRepository, ProductRepository};
use crate::response::{PagedResponse, Response, ValidationFailure};

const ENTITY: &str = "Product";

/// OpenAPI documentation for the Products API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_products,
        list_products_paged,
        get_product,
        create_product,
        update_product,
        delete_product,
    ),
    components(
        schemas(ProductDto, CategoryDto, CreateProductDto, UpdateProductDto, ValidationFailure),
        responses(
            BadRequestIdResponse,
            BadRequestValidationResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Products", description = "Product management endpoints")
    )
)]
pub struct ApiDoc;

/// Create the products router
pub fn router<C, P>(app: ProductApplication<C, P>) -> Router
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/paged", get(list_products_paged))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .with_state(Arc::new(app))
}

type AppState<C, P> = State<Arc<ProductApplication<C, P>>>;

/// List all products with their categories
#[utoipa::path(
    get,
    path = "",
    tag = "Products",
    responses(
        (status = 200, description = "All products", body = Response<Vec<ProductDto>>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products<C, P>(
    State(app): AppState<C, P>,
    cancellation: RequestCancellation,
) -> Result<Json<Response<Vec<ProductDto>>>, AppError>
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    let response = app.get_all(cancellation.token()).await?;
    Ok(Json(response))
}

/// List one page of products
#[utoipa::path(
    get,
    path = "/paged",
    tag = "Products",
    params(PagingQuery),
    responses(
        (status = 200, description = "One page of products", body = PagedResponse<ProductDto>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products_paged<C, P>(
    State(app): AppState<C, P>,
    cancellation: RequestCancellation,
    ValidatedQuery(paging): ValidatedQuery<PagingQuery>,
) -> Result<Json<PagedResponse<ProductDto>>, AppError>
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    let page = app
        .get_all_paged(paging.page_number, paging.page_size, cancellation.token())
        .await?;
    Ok(Json(page))
}

/// Get a product by id
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = i32, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Product found", body = Response<ProductDto>),
        (status = 400, response = BadRequestIdResponse),
        (status = 404, description = "Product not found", body = Response<ProductDto>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_product<C, P>(
    State(app): AppState<C, P>,
    IdPath(id): IdPath,
    cancellation: RequestCancellation,
) -> Result<HttpResponse, AppError>
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    ensure_positive_id(id, ENTITY)?;
    let response = app.get(id, cancellation.token()).await?;
    Ok(lookup_response(response))
}

/// Create a product attached to existing categories
#[utoipa::path(
    post,
    path = "",
    tag = "Products",
    request_body = CreateProductDto,
    responses(
        (status = 200, description = "Product inserted", body = Response<bool>),
        (status = 400, description = "Validation errors", body = Response<bool>),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_product<C, P>(
    State(app): AppState<C, P>,
    cancellation: RequestCancellation,
    payload: Result<Json<CreateProductDto>, JsonRejection>,
) -> Result<HttpResponse, AppError>
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    let Json(dto) = payload?;
    let response = app.insert(dto, cancellation.token()).await?;
    Ok(write_response(response))
}

/// Update a product and replace its categories
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = i32, Path, description = "Product id, must match the body")
    ),
    request_body = UpdateProductDto,
    responses(
        (status = 200, description = "Product updated", body = Response<bool>),
        (status = 400, description = "Id mismatch, validation errors or failed update", body = Response<bool>),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_product<C, P>(
    State(app): AppState<C, P>,
    IdPath(id): IdPath,
    cancellation: RequestCancellation,
    payload: Result<Json<UpdateProductDto>, JsonRejection>,
) -> Result<HttpResponse, AppError>
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    let Json(dto) = payload?;
    ensure_matching_id(id, dto.id, ENTITY)?;

    let response = app.update(dto, cancellation.token()).await?;
    Ok(write_response(response))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = i32, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Product deleted", body = Response<bool>),
        (status = 400, response = BadRequestIdResponse),
        (status = 404, description = "Product not found", body = Response<bool>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_product<C, P>(
    State(app): AppState<C, P>,
    IdPath(id): IdPath,
    cancellation: RequestCancellation,
) -> Result<HttpResponse, AppError>
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    ensure_positive_id(id, ENTITY)?;
    tracing::info!(product_id = id, "Delete requested");

    let response = app.delete(id, cancellation.token()).await?;
    Ok(lookup_response(response))
}
