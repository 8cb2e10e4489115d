use axum::Router;
use domain_catalog::{
    CategoryApplication, CategoryRepository, InMemoryCatalog, LocalFileStorage,
    PgCategoryRepository, PgProductRepository, ProductApplication, ProductRepository,
    StorageConfig, handlers,
};
use std::sync::Arc;

use crate::state::AppState;

/// Catalog routes on PostgreSQL, or on a fresh in-memory catalog
pub fn router(state: &AppState) -> Router {
    let storage = &state.config.storage;

    match &state.db {
        Some(db) => with_repositories(
            Arc::new(PgCategoryRepository::new(db.clone())),
            Arc::new(PgProductRepository::new(db.clone())),
            storage,
        ),
        None => {
            let catalog = InMemoryCatalog::new();
            with_repositories(
                Arc::new(catalog.categories()),
                Arc::new(catalog.products()),
                storage,
            )
        }
    }
}

fn with_repositories<C, P>(categories: Arc<C>, products: Arc<P>, storage: &StorageConfig) -> Router
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    let images = handlers::images::router(LocalFileStorage::new(storage.clone()), storage.clone());

    Router::new()
        .nest(
            "/categories",
            handlers::categories::router(CategoryApplication::new(categories.clone())),
        )
        .nest(
            "/products",
            handlers::products::router(ProductApplication::new(categories, products)).merge(images),
        )
}
