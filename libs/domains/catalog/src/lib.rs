//! Catalog Domain
//!
//! Products and categories with a many-to-many link between them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   Handlers   │  ← HTTP endpoints, image uploads
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ Application  │  ← Validation, mapping, response envelopes
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │  Repository  │  ← Data access (trait + Postgres / in-memory)
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │    Models    │  ← Entities, DTOs
//! └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_catalog::{
//!     CategoryApplication, PgCategoryRepository, PgProductRepository, ProductApplication,
//!     handlers,
//! };
//! use sea_orm::Database;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("postgres://...").await?;
//!
//! let categories = Arc::new(PgCategoryRepository::new(db.clone()));
//! let products = Arc::new(PgProductRepository::new(db));
//!
//! let router = axum::Router::new()
//!     .nest(
//!         "/categories",
//!         handlers::categories::router(CategoryApplication::new(categories.clone())),
//!     )
//!     .nest(
//!         "/products",
//!         handlers::products::router(ProductApplication::new(categories, products)),
//!     );
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod image;
pub mod mapper;
pub mod models;
pub mod postgres;
pub mod reconcile;
pub mod repository;
pub mod response;
pub mod storage;
pub mod validation;
pub mod validators;

// Re-export commonly used types
pub use application::{CategoryApplication, ProductApplication};
pub use error::{CatalogError, CatalogResult};
pub use models::{
    Category, CategoryDto, CreateCategoryDto, CreateProductDto, PagingQuery, Product, ProductDto,
    UpdateCategoryDto, UpdateProductDto,
};
pub use postgres::{PgCategoryRepository, PgProductRepository};
pub use repository::{
    CategoryRepository, InMemoryCatalog, InMemoryCategoryRepository, InMemoryProductRepository,
    ProductRepository,
};
pub use response::{PagedResponse, Response, ValidationFailure};
pub use storage::{FileStorage, LocalFileStorage, StorageConfig};
