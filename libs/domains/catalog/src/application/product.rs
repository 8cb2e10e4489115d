use observability::CatalogMetrics;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::observed;
use crate::error::{CatalogResult, ensure_active};
use crate::mapper::{apply_update, product_from_create};
use crate::models::{CreateProductDto, ProductDto, UpdateProductDto};
use crate::reconcile::reconcile_categories;
use crate::repository::{CategoryRepository, ProductRepository};
use crate::response::{PagedResponse, Response};
use crate::validation::{RuleSet, create_product_rules, update_product_rules};
use crate::validators::{CategoryValidator, ProductValidator};

const ENTITY: &str = "product";

/// True when every requested id came back as a stored record.
fn all_resolved(requested: &[i32], resolved: usize) -> bool {
    requested.iter().collect::<HashSet<_>>().len() == resolved
}

/// Product use cases
///
/// Needs both repositories: category ids in the payload are resolved into
/// stored records before they are attached.
pub struct ProductApplication<C: CategoryRepository, P: ProductRepository> {
    categories: Arc<C>,
    products: Arc<P>,
    create_rules: RuleSet<CreateProductDto>,
    update_rules: RuleSet<UpdateProductDto>,
}

impl<C, P> ProductApplication<C, P>
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    pub fn new(categories: Arc<C>, products: Arc<P>) -> Self {
        let category_validator = CategoryValidator::new(categories.clone());
        let product_validator = ProductValidator::new(products.clone());

        Self {
            create_rules: create_product_rules(
                category_validator.clone(),
                product_validator.clone(),
            ),
            update_rules: update_product_rules(category_validator, product_validator),
            categories,
            products,
        }
    }

    #[instrument(skip(self, cancel), fields(product_id = %id))]
    pub async fn get(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<Response<ProductDto>> {
        observed(ENTITY, "get", async {
            Ok(match self.products.get(id, cancel).await? {
                Some(product) => {
                    Response::success(ProductDto::from(product), "Product retrieved successfully.")
                }
                None => Response::failure(None, "Product not found."),
            })
        })
        .await
    }

    #[instrument(skip(self, cancel))]
    pub async fn get_all(&self, cancel: &CancellationToken) -> CatalogResult<Response<Vec<ProductDto>>> {
        observed(ENTITY, "get_all", async {
            let products: Vec<ProductDto> = self
                .products
                .get_all(cancel)
                .await?
                .into_iter()
                .map(ProductDto::from)
                .collect();

            let message = if products.is_empty() {
                "No products found."
            } else {
                "Products retrieved successfully."
            };
            Ok(Response::success(products, message))
        })
        .await
    }

    #[instrument(skip(self, cancel))]
    pub async fn get_all_paged(
        &self,
        page_number: i32,
        page_size: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<PagedResponse<ProductDto>> {
        observed(ENTITY, "get_all_paged", async {
            let total = self.products.count(cancel).await?;
            CatalogMetrics::set_entity_count(ENTITY, total);

            let page = self
                .products
                .get_all_paged(page_number, page_size, cancel)
                .await?
                .into_iter()
                .map(ProductDto::from)
                .collect();

            Ok(PagedResponse::new(
                page,
                "Products retrieved successfully.",
                page_number,
                page_size,
                total,
            ))
        })
        .await
    }

    #[instrument(skip(self, dto, cancel), fields(product_name = %dto.name))]
    pub async fn insert(
        &self,
        dto: CreateProductDto,
        cancel: &CancellationToken,
    ) -> CatalogResult<Response<bool>> {
        observed(ENTITY, "insert", async {
            let validation = self.create_rules.validate(&dto, cancel).await?;
            if !validation.is_valid() {
                return Ok(Response::invalid(validation.failures));
            }

            let mut product = product_from_create(&dto)?;
            let requested = dto.category_ids.as_deref().unwrap_or_default();
            product.categories = self.categories.get_tracking(requested, cancel).await?;
            // A category deleted since validation
            if !all_resolved(requested, product.categories.len()) {
                tracing::warn!(requested = ?requested, "Categories vanished before insert");
                return Ok(Response::failure(Some(false), "Failed to insert product."));
            }

            ensure_active(cancel)?;
            if self.products.insert(&mut product, cancel).await? {
                tracing::info!(
                    product_id = product.id,
                    categories = product.categories.len(),
                    "Product inserted"
                );
                Ok(Response::success(true, "Product inserted successfully."))
            } else {
                Ok(Response::failure(Some(false), "Failed to insert product."))
            }
        })
        .await
    }

    #[instrument(skip(self, dto, cancel), fields(product_id = %dto.id))]
    pub async fn update(
        &self,
        dto: UpdateProductDto,
        cancel: &CancellationToken,
    ) -> CatalogResult<Response<bool>> {
        observed(ENTITY, "update", async {
            let validation = self.update_rules.validate(&dto, cancel).await?;
            if !validation.is_valid() {
                return Ok(Response::invalid(validation.failures));
            }

            // Deleted since validation
            let Some(mut product) = self.products.get_tracking(dto.id, cancel).await? else {
                return Ok(Response::failure(Some(false), "Failed to update product."));
            };
            apply_update(&dto, &mut product)?;

            let requested_ids = dto.category_ids.as_deref().unwrap_or_default();
            let requested = self.categories.get_tracking(requested_ids, cancel).await?;
            if !all_resolved(requested_ids, requested.len()) {
                tracing::warn!(requested = ?requested_ids, "Categories vanished before update");
                return Ok(Response::failure(Some(false), "Failed to update product."));
            }
            let outcome = reconcile_categories(&mut product, requested);
            tracing::debug!(removed = ?outcome.removed, added = ?outcome.added, "Reconciled categories");

            ensure_active(cancel)?;
            if self.products.update(&product, cancel).await? {
                tracing::info!(product_id = product.id, "Product updated");
                Ok(Response::success(true, "Product updated successfully."))
            } else {
                Ok(Response::failure(Some(false), "Failed to update product."))
            }
        })
        .await
    }

    #[instrument(skip(self, cancel), fields(product_id = %id))]
    pub async fn delete(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<Response<bool>> {
        observed(ENTITY, "delete", async {
            ensure_active(cancel)?;
            if self.products.delete(id, cancel).await? {
                tracing::info!(product_id = id, "Product deleted");
                Ok(Response::success(true, "Product deleted successfully."))
            } else {
                Ok(Response::failure(Some(false), "Failed to delete product."))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::models::{Category, Product};
    use crate::repository::{
        InMemoryCatalog, InMemoryCategoryRepository, InMemoryProductRepository,
        MockCategoryRepository, MockProductRepository,
    };

    type App = ProductApplication<InMemoryCategoryRepository, InMemoryProductRepository>;

    async fn app_with_categories(names: &[&str]) -> (App, Vec<i32>) {
        let catalog = InMemoryCatalog::new();
        let categories = catalog.categories();
        let cancel = CancellationToken::new();

        let mut ids = Vec::new();
        for name in names {
            let mut category = Category::new(0, *name);
            categories.insert(&mut category, &cancel).await.unwrap();
            ids.push(category.id);
        }

        let app = ProductApplication::new(Arc::new(categories), Arc::new(catalog.products()));
        (app, ids)
    }

    fn create(name: &str, category_ids: Vec<i32>) -> CreateProductDto {
        CreateProductDto {
            name: name.to_string(),
            category_ids: Some(category_ids),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_attaches_requested_categories() {
        let (app, ids) = app_with_categories(&["Tools", "Garden"]).await;
        let cancel = CancellationToken::new();

        let response = app.insert(create("Widget", ids.clone()), &cancel).await.unwrap();
        assert!(response.is_success);
        assert_eq!(response.message, "Product inserted successfully.");

        let product = app.get(1, &cancel).await.unwrap().data.unwrap();
        assert_eq!(product.categories.len(), 2);
    }

    #[tokio::test]
    async fn test_update_replaces_categories() {
        let (app, ids) = app_with_categories(&["One", "Two", "Three"]).await;
        let cancel = CancellationToken::new();
        app.insert(create("Widget", vec![ids[0], ids[1]]), &cancel)
            .await
            .unwrap();

        let response = app
            .update(
                UpdateProductDto {
                    id: 1,
                    name: "Widget".to_string(),
                    category_ids: Some(vec![ids[1], ids[2]]),
                    ..Default::default()
                },
                &cancel,
            )
            .await
            .unwrap();
        assert!(response.is_success, "{:?}", response.validation_errors);

        let product = app.get(1, &cancel).await.unwrap().data.unwrap();
        let mut attached: Vec<i32> = product.categories.iter().map(|c| c.id).collect();
        attached.sort();
        assert_eq!(attached, vec![ids[1], ids[2]]);
    }

    #[tokio::test]
    async fn test_update_writes_scalars() {
        let (app, ids) = app_with_categories(&["One"]).await;
        let cancel = CancellationToken::new();
        app.insert(create("Widget", ids.clone()), &cancel).await.unwrap();

        app.update(
            UpdateProductDto {
                id: 1,
                name: " Gadget ".to_string(),
                description: Some("Shiny".to_string()),
                image: Some("aGk=".to_string()),
                category_ids: Some(ids),
            },
            &cancel,
        )
        .await
        .unwrap();

        let product = app.get(1, &cancel).await.unwrap().data.unwrap();
        assert_eq!(product.name, "Gadget");
        assert_eq!(product.description.as_deref(), Some("Shiny"));
        assert_eq!(product.image.as_deref(), Some("aGk="));
    }

    #[tokio::test]
    async fn test_insert_invalid_returns_failures_without_writing() {
        let (app, _) = app_with_categories(&[]).await;
        let cancel = CancellationToken::new();

        let response = app.insert(create("", vec![404]), &cancel).await.unwrap();
        assert!(!response.is_success);
        let messages: Vec<_> = response
            .validation_errors
            .iter()
            .map(|f| f.error_message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec!["Product name is required.", "One or more categories do not exist."]
        );

        let all = app.get_all(&cancel).await.unwrap();
        assert_eq!(all.message, "No products found.");
    }

    #[tokio::test]
    async fn test_get_missing_product() {
        let (app, _) = app_with_categories(&[]).await;

        let response = app.get(7, &CancellationToken::new()).await.unwrap();
        assert!(!response.is_success);
        assert_eq!(response.message, "Product not found.");
    }

    #[tokio::test]
    async fn test_delete_missing_product() {
        let (app, _) = app_with_categories(&[]).await;

        let response = app.delete(7, &CancellationToken::new()).await.unwrap();
        assert!(!response.is_success);
        assert_eq!(response.message, "Failed to delete product.");
    }

    #[tokio::test]
    async fn test_update_reports_failure_when_product_vanishes() {
        let mut categories = MockCategoryRepository::new();
        categories.expect_count_existing_ids().returning(|ids, _| Ok(ids.len() as u64));
        let mut products = MockProductRepository::new();
        products.expect_get().returning(|id, _| {
            Ok(Some(Product {
                id,
                ..Default::default()
            }))
        });
        products.expect_existing_name().returning(|_, _, _| Ok(false));
        products.expect_get_tracking().returning(|_, _| Ok(None));
        products.expect_update().never();

        let app = ProductApplication::new(Arc::new(categories), Arc::new(products));
        let response = app
            .update(
                UpdateProductDto {
                    id: 5,
                    name: "Widget".to_string(),
                    category_ids: Some(vec![1]),
                    ..Default::default()
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(!response.is_success);
        assert!(!response.has_validation_errors());
        assert_eq!(response.message, "Failed to update product.");
    }

    #[tokio::test]
    async fn test_conflict_from_storage_propagates() {
        let mut categories = MockCategoryRepository::new();
        categories.expect_count_existing_ids().returning(|ids, _| Ok(ids.len() as u64));
        categories
            .expect_get_tracking()
            .returning(|ids, _| Ok(ids.iter().map(|id| Category::new(*id, "A")).collect()));
        let mut products = MockProductRepository::new();
        products.expect_existing_name().returning(|_, _, _| Ok(false));
        products
            .expect_insert()
            .returning(|_, _| Err(CatalogError::Conflict("duplicate key".to_string())));

        let app = ProductApplication::new(Arc::new(categories), Arc::new(products));
        let result = app.insert(create("Widget", vec![1]), &CancellationToken::new()).await;

        assert!(matches!(result, Err(CatalogError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_insert_fails_when_category_vanishes_after_validation() {
        let mut categories = MockCategoryRepository::new();
        categories.expect_count_existing_ids().returning(|ids, _| Ok(ids.len() as u64));
        categories.expect_get_tracking().returning(|_, _| Ok(Vec::new()));
        let mut products = MockProductRepository::new();
        products.expect_existing_name().returning(|_, _, _| Ok(false));
        products.expect_insert().never();

        let app = ProductApplication::new(Arc::new(categories), Arc::new(products));
        let response = app
            .insert(create("Widget", vec![1]), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!response.is_success);
        assert!(!response.has_validation_errors());
        assert_eq!(response.message, "Failed to insert product.");
    }

    #[tokio::test]
    async fn test_update_fails_when_category_vanishes_after_validation() {
        let mut categories = MockCategoryRepository::new();
        categories.expect_count_existing_ids().returning(|ids, _| Ok(ids.len() as u64));
        categories
            .expect_get_tracking()
            .returning(|_, _| Ok(vec![Category::new(1, "Kept")]));
        let mut products = MockProductRepository::new();
        products.expect_get().returning(|id, _| {
            Ok(Some(Product {
                id,
                ..Default::default()
            }))
        });
        products.expect_existing_name().returning(|_, _, _| Ok(false));
        products.expect_get_tracking().returning(|id, _| {
            Ok(Some(Product {
                id,
                categories: vec![Category::new(1, "Kept"), Category::new(2, "Gone")],
                ..Default::default()
            }))
        });
        products.expect_update().never();

        let app = ProductApplication::new(Arc::new(categories), Arc::new(products));
        let response = app
            .update(
                UpdateProductDto {
                    id: 5,
                    name: "Widget".to_string(),
                    category_ids: Some(vec![1, 2]),
                    ..Default::default()
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(!response.is_success);
        assert_eq!(response.message, "Failed to update product.");
    }

    #[test]
    fn test_all_resolved_counts_distinct_ids() {
        assert!(all_resolved(&[], 0));
        assert!(all_resolved(&[3, 3], 1));
        assert!(!all_resolved(&[1, 2], 1));
    }
}
