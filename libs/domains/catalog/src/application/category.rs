use observability::CatalogMetrics;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::observed;
use crate::error::{CatalogResult, ensure_active};
use crate::models::{Category, CategoryDto, CreateCategoryDto, UpdateCategoryDto};
use crate::repository::CategoryRepository;
use crate::response::{PagedResponse, Response};
use crate::validation::{RuleSet, create_category_rules, update_category_rules};
use crate::validators::CategoryValidator;

const ENTITY: &str = "category";

/// Category use cases
pub struct CategoryApplication<R: CategoryRepository> {
    repository: Arc<R>,
    create_rules: RuleSet<CreateCategoryDto>,
    update_rules: RuleSet<UpdateCategoryDto>,
}

impl<R: CategoryRepository + 'static> CategoryApplication<R> {
    pub fn new(repository: Arc<R>) -> Self {
        let validator = CategoryValidator::new(repository.clone());
        Self {
            create_rules: create_category_rules(validator.clone()),
            update_rules: update_category_rules(validator),
            repository,
        }
    }

    #[instrument(skip(self, cancel), fields(category_id = %id))]
    pub async fn get(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<Response<CategoryDto>> {
        observed(ENTITY, "get", async {
            Ok(match self.repository.get(id, cancel).await? {
                Some(category) => {
                    Response::success(CategoryDto::from(category), "Category retrieved successfully.")
                }
                None => Response::failure(None, "Category not found."),
            })
        })
        .await
    }

    #[instrument(skip(self, cancel))]
    pub async fn get_all(&self, cancel: &CancellationToken) -> CatalogResult<Response<Vec<CategoryDto>>> {
        observed(ENTITY, "get_all", async {
            let categories: Vec<CategoryDto> = self
                .repository
                .get_all(cancel)
                .await?
                .into_iter()
                .map(CategoryDto::from)
                .collect();

            let message = if categories.is_empty() {
                "No categories found."
            } else {
                "Categories retrieved successfully."
            };
            Ok(Response::success(categories, message))
        })
        .await
    }

    #[instrument(skip(self, cancel))]
    pub async fn get_all_paged(
        &self,
        page_number: i32,
        page_size: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<PagedResponse<CategoryDto>> {
        observed(ENTITY, "get_all_paged", async {
            let total = self.repository.count(cancel).await?;
            CatalogMetrics::set_entity_count(ENTITY, total);

            let page = self
                .repository
                .get_all_paged(page_number, page_size, cancel)
                .await?
                .into_iter()
                .map(CategoryDto::from)
                .collect();

            Ok(PagedResponse::new(
                page,
                "Categories retrieved successfully.",
                page_number,
                page_size,
                total,
            ))
        })
        .await
    }

    #[instrument(skip(self, dto, cancel), fields(category_name = %dto.name))]
    pub async fn insert(
        &self,
        dto: CreateCategoryDto,
        cancel: &CancellationToken,
    ) -> CatalogResult<Response<bool>> {
        observed(ENTITY, "insert", async {
            let validation = self.create_rules.validate(&dto, cancel).await?;
            if !validation.is_valid() {
                return Ok(Response::invalid(validation.failures));
            }

            let mut category = Category::from(dto);
            category.id = 0;

            ensure_active(cancel)?;
            if self.repository.insert(&mut category, cancel).await? {
                tracing::info!(category_id = category.id, "Category inserted");
                Ok(Response::success(true, "Category inserted successfully."))
            } else {
                Ok(Response::failure(Some(false), "Failed to insert category."))
            }
        })
        .await
    }

    #[instrument(skip(self, dto, cancel), fields(category_id = %dto.id))]
    pub async fn update(
        &self,
        dto: UpdateCategoryDto,
        cancel: &CancellationToken,
    ) -> CatalogResult<Response<bool>> {
        observed(ENTITY, "update", async {
            let validation = self.update_rules.validate(&dto, cancel).await?;
            if !validation.is_valid() {
                return Ok(Response::invalid(validation.failures));
            }

            let Some(mut category) = self.repository.get(dto.id, cancel).await? else {
                return Ok(Response::failure(Some(false), "Failed to update category."));
            };
            category.name = Category::from(dto).name;

            ensure_active(cancel)?;
            if self.repository.update(&category, cancel).await? {
                tracing::info!(category_id = category.id, "Category updated");
                Ok(Response::success(true, "Category updated successfully."))
            } else {
                Ok(Response::failure(Some(false), "Failed to update category."))
            }
        })
        .await
    }

    #[instrument(skip(self, cancel), fields(category_id = %id))]
    pub async fn delete(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<Response<bool>> {
        observed(ENTITY, "delete", async {
            if self.repository.get(id, cancel).await?.is_none() {
                return Ok(Response::failure(Some(false), "Category not found."));
            }

            ensure_active(cancel)?;
            if self.repository.delete(id, cancel).await? {
                tracing::info!(category_id = id, "Category deleted");
                Ok(Response::success(true, "Category deleted successfully."))
            } else {
                Ok(Response::failure(Some(false), "Failed to delete category."))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::repository::{InMemoryCategoryRepository, MockCategoryRepository};

    fn app() -> CategoryApplication<InMemoryCategoryRepository> {
        CategoryApplication::new(Arc::new(InMemoryCategoryRepository::new()))
    }

    async fn seed(app: &CategoryApplication<InMemoryCategoryRepository>, names: &[&str]) {
        let cancel = CancellationToken::new();
        for name in names {
            let response = app
                .insert(
                    CreateCategoryDto {
                        name: name.to_string(),
                    },
                    &cancel,
                )
                .await
                .unwrap();
            assert!(response.is_success, "{}", response.message);
        }
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let app = app();
        seed(&app, &["  Books  "]).await;
        let cancel = CancellationToken::new();

        let response = app.get(1, &cancel).await.unwrap();
        assert!(response.is_success);
        assert_eq!(response.message, "Category retrieved successfully.");
        assert_eq!(response.data.unwrap().name, "Books");
    }

    #[tokio::test]
    async fn test_get_missing_is_unsuccessful() {
        let response = app().get(3, &CancellationToken::new()).await.unwrap();
        assert!(!response.is_success);
        assert_eq!(response.message, "Category not found.");
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn test_get_all_empty_message() {
        let response = app().get_all(&CancellationToken::new()).await.unwrap();
        assert!(response.is_success);
        assert_eq!(response.message, "No categories found.");
    }

    #[tokio::test]
    async fn test_get_all_paged_metadata() {
        let app = app();
        seed(&app, &["A", "B", "C", "D", "E"]).await;

        let page = app.get_all_paged(2, 2, &CancellationToken::new()).await.unwrap();
        assert_eq!(page.total_records, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page_number, 2);
        assert!(page.has_previous_page);
        assert!(page.has_next_page);
        let names: Vec<_> = page.data.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["C", "D"]);
    }

    #[tokio::test]
    async fn test_insert_duplicate_name_is_invalid() {
        let app = app();
        seed(&app, &["Books"]).await;

        let response = app
            .insert(
                CreateCategoryDto {
                    name: "Books".to_string(),
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(!response.is_success);
        assert_eq!(response.message, "Validation errors occurred.");
        assert_eq!(response.validation_errors[0].property_name, "Name");
        assert_eq!(
            response.validation_errors[0].error_message,
            "Category name already being used."
        );
    }

    #[tokio::test]
    async fn test_update_renames() {
        let app = app();
        seed(&app, &["Books"]).await;
        let cancel = CancellationToken::new();

        let response = app
            .update(
                UpdateCategoryDto {
                    id: 1,
                    name: "Novels".to_string(),
                },
                &cancel,
            )
            .await
            .unwrap();
        assert!(response.is_success);
        assert_eq!(response.message, "Category updated successfully.");

        let stored = app.get(1, &cancel).await.unwrap().data.unwrap();
        assert_eq!(stored.name, "Novels");
    }

    #[tokio::test]
    async fn test_update_missing_reports_failure() {
        let response = app()
            .update(
                UpdateCategoryDto {
                    id: 9,
                    name: "Novels".to_string(),
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(!response.is_success);
        assert!(!response.has_validation_errors());
        assert_eq!(response.message, "Failed to update category.");
    }

    #[tokio::test]
    async fn test_delete_missing_category() {
        let response = app().delete(999, &CancellationToken::new()).await.unwrap();
        assert!(!response.is_success);
        assert_eq!(response.message, "Category not found.");
        assert_eq!(response.data, Some(false));
    }

    #[tokio::test]
    async fn test_delete_existing_category() {
        let app = app();
        seed(&app, &["Books"]).await;
        let cancel = CancellationToken::new();

        let response = app.delete(1, &cancel).await.unwrap();
        assert!(response.is_success);
        assert_eq!(response.message, "Category deleted successfully.");
        assert!(!app.get(1, &cancel).await.unwrap().is_success);
    }

    #[tokio::test]
    async fn test_insert_storage_failure_is_reported() {
        let mut repo = MockCategoryRepository::new();
        repo.expect_existing_name().returning(|_, _, _| Ok(false));
        repo.expect_insert().returning(|_, _| Ok(false));

        let app = CategoryApplication::new(Arc::new(repo));
        let response = app
            .insert(
                CreateCategoryDto {
                    name: "Books".to_string(),
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(!response.is_success);
        assert_eq!(response.message, "Failed to insert category.");
    }

    #[tokio::test]
    async fn test_storage_error_propagates() {
        let mut repo = MockCategoryRepository::new();
        repo.expect_get_all()
            .returning(|_| Err(CatalogError::Database("connection refused".to_string())));

        let app = CategoryApplication::new(Arc::new(repo));
        let result = app.get_all(&CancellationToken::new()).await;
        assert!(matches!(result, Err(CatalogError::Database(_))));
    }

    #[tokio::test]
    async fn test_cancelled_insert_writes_nothing() {
        let mut repo = MockCategoryRepository::new();
        repo.expect_insert().never();

        let app = CategoryApplication::new(Arc::new(repo));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = app
            .insert(
                CreateCategoryDto {
                    name: "Books".to_string(),
                },
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(CatalogError::Cancelled)));
    }
}
