//! OpenAPI documentation configuration

use utoipa::OpenApi;

/// Combined OpenAPI documentation for Catalog API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Catalog API",
        version = "0.1.0",
        description = "Products and categories with product image uploads",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    nest(
        (path = "/api/categories", api = domain_catalog::handlers::categories::ApiDoc),
        (path = "/api/products", api = domain_catalog::handlers::products::ApiDoc),
        (path = "/api/products", api = domain_catalog::handlers::images::ApiDoc)
    ),
    tags(
        (name = "Categories", description = "Category management endpoints"),
        (name = "Products", description = "Product management endpoints"),
        (name = "Images", description = "Product image uploads")
    )
)]
pub struct ApiDoc;
