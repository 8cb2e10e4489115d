//! Rule sets for the four write operations.

use super::{Cascade, FieldRules, RuleSet};
use crate::image::{self, MAX_IMAGE_BYTES};
use crate::models::{
    CreateCategoryDto, CreateProductDto, DESCRIPTION_MAX_LEN, NAME_MAX_LEN, UpdateCategoryDto,
    UpdateProductDto,
};
use crate::repository::{CategoryRepository, ProductRepository};
use crate::validators::{CategoryValidator, ProductValidator};

fn within_len(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

// ============================================================================
// Categories
// ============================================================================

fn category_name<T, R>(
    validator: CategoryValidator<R>,
    name: fn(&T) -> &str,
    exclude_id: fn(&T) -> i32,
) -> FieldRules<T>
where
    T: Sync + 'static,
    R: CategoryRepository + 'static,
{
    FieldRules::new("Name")
        .must(move |dto| !name(dto).trim().is_empty(), "Category name is required.")
        .must(
            move |dto| within_len(name(dto), NAME_MAX_LEN),
            "Category name must not exceed 200 characters.",
        )
        .must_async(
            move |dto, cancel| {
                let validator = validator.clone();
                Box::pin(async move {
                    validator
                        .name_must_be_unique(name(dto), exclude_id(dto), cancel)
                        .await
                })
            },
            "Category name already being used.",
        )
}

pub fn create_category_rules<R>(validator: CategoryValidator<R>) -> RuleSet<CreateCategoryDto>
where
    R: CategoryRepository + 'static,
{
    RuleSet::new().field(category_name(validator, |dto: &CreateCategoryDto| &dto.name, |_| 0))
}

pub fn update_category_rules<R>(validator: CategoryValidator<R>) -> RuleSet<UpdateCategoryDto>
where
    R: CategoryRepository + 'static,
{
    RuleSet::new()
        .field(
            FieldRules::new("Id")
                .cascade(Cascade::Stop)
                .must(|dto: &UpdateCategoryDto| dto.id != 0, "Category Id is required.")
                .must(
                    |dto: &UpdateCategoryDto| dto.id > 0,
                    "Category Id must be greater than zero.",
                ),
        )
        .field(category_name(
            validator,
            |dto: &UpdateCategoryDto| &dto.name,
            |dto| dto.id,
        ))
}

// ============================================================================
// Products
// ============================================================================

/// Fields shared by the create and update product payloads
trait ProductPayload: Sync + 'static {
    /// Id excluded from the uniqueness check; 0 for new products
    fn own_id(&self) -> i32;
    fn name(&self) -> &str;
    fn description(&self) -> Option<&str>;
    fn image(&self) -> Option<&str>;
    fn category_ids(&self) -> Option<&[i32]>;
}

impl ProductPayload for CreateProductDto {
    fn own_id(&self) -> i32 {
        0
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }
    fn category_ids(&self) -> Option<&[i32]> {
        self.category_ids.as_deref()
    }
}

impl ProductPayload for UpdateProductDto {
    fn own_id(&self) -> i32 {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }
    fn category_ids(&self) -> Option<&[i32]> {
        self.category_ids.as_deref()
    }
}

/// Image rules only apply to a non-empty payload
fn image_present<T: ProductPayload>(dto: &T) -> Option<&str> {
    dto.image().filter(|image| !image.is_empty())
}

fn product_rules<T, C, P>(
    categories: CategoryValidator<C>,
    products: ProductValidator<P>,
) -> RuleSet<T>
where
    T: ProductPayload,
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    RuleSet::new()
        .field(
            FieldRules::new("Name")
                .must(|dto: &T| !dto.name().trim().is_empty(), "Product name is required.")
                .must(
                    |dto: &T| within_len(dto.name(), NAME_MAX_LEN),
                    "Product name must not exceed 200 characters.",
                )
                .must_async(
                    move |dto: &T, cancel| {
                        let products = products.clone();
                        Box::pin(async move {
                            products
                                .name_must_be_unique(dto.name(), dto.own_id(), cancel)
                                .await
                        })
                    },
                    "Product name already being used.",
                ),
        )
        .field(FieldRules::new("Description").must(
            |dto: &T| dto.description().is_none_or(|d| within_len(d, DESCRIPTION_MAX_LEN)),
            "Product description must not exceed 1000 characters.",
        ))
        .field(
            FieldRules::new("Image")
                .must(
                    |dto: &T| image_present(dto).is_none_or(image::is_valid_base64),
                    "Image must be a valid Base64 string.",
                )
                .must(
                    |dto: &T| {
                        image_present(dto)
                            .is_none_or(|image| image::within_size_limit(image, MAX_IMAGE_BYTES))
                    },
                    "Image must not exceed 2 MB.",
                ),
        )
        .field(
            FieldRules::new("CategoryIds")
                .must(|dto: &T| dto.category_ids().is_some(), "Category is required.")
                .must(
                    |dto: &T| dto.category_ids().is_none_or(|ids| !ids.is_empty()),
                    "At least one category is required.",
                )
                .must(
                    |dto: &T| CategoryValidator::<C>::not_duplicated_categories(dto.category_ids()),
                    "One or more categories are duplicated.",
                )
                .must_async(
                    move |dto: &T, cancel| {
                        let categories = categories.clone();
                        Box::pin(async move {
                            categories.all_categories_exist(dto.category_ids(), cancel).await
                        })
                    },
                    "One or more categories do not exist.",
                ),
        )
}

pub fn create_product_rules<C, P>(
    categories: CategoryValidator<C>,
    products: ProductValidator<P>,
) -> RuleSet<CreateProductDto>
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    product_rules(categories, products)
}

pub fn update_product_rules<C, P>(
    categories: CategoryValidator<C>,
    products: ProductValidator<P>,
) -> RuleSet<UpdateProductDto>
where
    C: CategoryRepository + 'static,
    P: ProductRepository + 'static,
{
    let exists = products.clone();
    let id_rules = FieldRules::new("Id")
        .cascade(Cascade::Stop)
        .must(|dto: &UpdateProductDto| dto.id > 0, "Product Id is required.")
        .must_async(
            move |dto: &UpdateProductDto, cancel| {
                let exists = exists.clone();
                Box::pin(async move { exists.product_must_exist(dto.id, cancel).await })
            },
            "Product does not exist.",
        );

    let mut rules = RuleSet::new().field(id_rules);
    for field in product_rules::<UpdateProductDto, C, P>(categories, products).fields {
        rules = rules.field(field);
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Product};
    use crate::repository::{
        CategoryRepository, InMemoryCatalog, InMemoryCategoryRepository, InMemoryProductRepository,
        ProductRepository,
    };
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        catalog: InMemoryCatalog,
        categories: CategoryValidator<InMemoryCategoryRepository>,
        products: ProductValidator<InMemoryProductRepository>,
        cancel: CancellationToken,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = InMemoryCatalog::new();
            Self {
                categories: CategoryValidator::new(Arc::new(catalog.categories())),
                products: ProductValidator::new(Arc::new(catalog.products())),
                catalog,
                cancel: CancellationToken::new(),
            }
        }

        async fn category(&self, name: &str) -> i32 {
            let mut category = Category::new(0, name);
            self.catalog
                .categories()
                .insert(&mut category, &self.cancel)
                .await
                .unwrap();
            category.id
        }

        async fn product(&self, name: &str, category_ids: &[i32]) -> i32 {
            let categories = self
                .catalog
                .categories()
                .get_tracking(category_ids, &self.cancel)
                .await
                .unwrap();
            let mut product = Product {
                name: name.to_string(),
                categories,
                ..Default::default()
            };
            self.catalog
                .products()
                .insert(&mut product, &self.cancel)
                .await
                .unwrap();
            product.id
        }
    }

    fn messages(failures: &[crate::response::ValidationFailure]) -> Vec<&str> {
        failures.iter().map(|f| f.error_message.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_category_blank_name() {
        let fx = Fixture::new();
        let rules = create_category_rules(fx.categories.clone());

        let result = rules
            .validate(&CreateCategoryDto { name: "  ".to_string() }, &fx.cancel)
            .await
            .unwrap();

        assert_eq!(messages(&result.failures), vec!["Category name is required."]);
    }

    #[tokio::test]
    async fn test_create_category_name_too_long() {
        let fx = Fixture::new();
        let rules = create_category_rules(fx.categories.clone());

        let dto = CreateCategoryDto {
            name: "x".repeat(NAME_MAX_LEN + 1),
        };
        let result = rules.validate(&dto, &fx.cancel).await.unwrap();

        assert_eq!(
            messages(&result.failures),
            vec!["Category name must not exceed 200 characters."]
        );
    }

    #[tokio::test]
    async fn test_update_category_name_excludes_own_id() {
        let fx = Fixture::new();
        let books = fx.category("Books").await;
        let garden = fx.category("Garden").await;
        let rules = update_category_rules(fx.categories.clone());

        let own = UpdateCategoryDto {
            id: books,
            name: "Books".to_string(),
        };
        assert!(rules.validate(&own, &fx.cancel).await.unwrap().is_valid());

        let taken = UpdateCategoryDto {
            id: garden,
            name: "Books".to_string(),
        };
        let result = rules.validate(&taken, &fx.cancel).await.unwrap();
        assert_eq!(messages(&result.failures), vec!["Category name already being used."]);
    }

    #[tokio::test]
    async fn test_update_category_id_messages() {
        let fx = Fixture::new();
        let rules = update_category_rules(fx.categories.clone());

        let missing = UpdateCategoryDto {
            id: 0,
            name: "Books".to_string(),
        };
        let result = rules.validate(&missing, &fx.cancel).await.unwrap();
        assert_eq!(messages(&result.failures), vec!["Category Id is required."]);

        let negative = UpdateCategoryDto {
            id: -4,
            name: "Books".to_string(),
        };
        let result = rules.validate(&negative, &fx.cancel).await.unwrap();
        assert_eq!(
            messages(&result.failures),
            vec!["Category Id must be greater than zero."]
        );
    }

    #[tokio::test]
    async fn test_create_product_valid() {
        let fx = Fixture::new();
        let a = fx.category("A").await;
        let b = fx.category("B").await;
        let rules = create_product_rules(fx.categories.clone(), fx.products.clone());

        let dto = CreateProductDto {
            name: "Widget".to_string(),
            image: Some("data:image/png;base64,aGVsbG8=".to_string()),
            category_ids: Some(vec![a, b]),
            ..Default::default()
        };

        assert!(rules.validate(&dto, &fx.cancel).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_create_product_category_failures() {
        let fx = Fixture::new();
        let a = fx.category("A").await;
        let rules = create_product_rules(fx.categories.clone(), fx.products.clone());

        let cases = [
            (None, vec!["Category is required."]),
            (Some(vec![]), vec!["At least one category is required."]),
            (
                Some(vec![a, a]),
                vec![
                    "One or more categories are duplicated.",
                    "One or more categories do not exist.",
                ],
            ),
            (Some(vec![a, 999]), vec!["One or more categories do not exist."]),
        ];

        for (category_ids, expected) in cases {
            let dto = CreateProductDto {
                name: "Widget".to_string(),
                category_ids,
                ..Default::default()
            };
            let result = rules.validate(&dto, &fx.cancel).await.unwrap();
            assert_eq!(messages(&result.failures), expected);
        }
    }

    #[tokio::test]
    async fn test_create_product_image_rules() {
        let fx = Fixture::new();
        let a = fx.category("A").await;
        let rules = create_product_rules(fx.categories.clone(), fx.products.clone());

        let invalid = CreateProductDto {
            name: "Widget".to_string(),
            image: Some("not base64!".to_string()),
            category_ids: Some(vec![a]),
            ..Default::default()
        };
        let result = rules.validate(&invalid, &fx.cancel).await.unwrap();
        assert!(messages(&result.failures).contains(&"Image must be a valid Base64 string."));

        let oversized = CreateProductDto {
            name: "Widget".to_string(),
            image: Some(image::encode(&vec![0u8; MAX_IMAGE_BYTES as usize + 3])),
            category_ids: Some(vec![a]),
            ..Default::default()
        };
        let result = rules.validate(&oversized, &fx.cancel).await.unwrap();
        assert_eq!(messages(&result.failures), vec!["Image must not exceed 2 MB."]);
    }

    #[tokio::test]
    async fn test_create_product_duplicate_name_and_long_description() {
        let fx = Fixture::new();
        let a = fx.category("A").await;
        fx.product("Widget", &[a]).await;
        let rules = create_product_rules(fx.categories.clone(), fx.products.clone());

        let dto = CreateProductDto {
            name: " Widget ".to_string(),
            description: Some("d".repeat(DESCRIPTION_MAX_LEN + 1)),
            category_ids: Some(vec![a]),
            ..Default::default()
        };
        let result = rules.validate(&dto, &fx.cancel).await.unwrap();

        assert_eq!(
            messages(&result.failures),
            vec![
                "Product name already being used.",
                "Product description must not exceed 1000 characters.",
            ]
        );
    }

    #[tokio::test]
    async fn test_update_product_missing_product_stops_id_chain() {
        let fx = Fixture::new();
        let a = fx.category("A").await;
        let rules = update_product_rules(fx.categories.clone(), fx.products.clone());

        let dto = UpdateProductDto {
            id: 42,
            name: "Widget".to_string(),
            category_ids: Some(vec![a]),
            ..Default::default()
        };
        let result = rules.validate(&dto, &fx.cancel).await.unwrap();
        assert_eq!(messages(&result.failures), vec!["Product does not exist."]);

        let zero = UpdateProductDto { id: 0, ..dto };
        let result = rules.validate(&zero, &fx.cancel).await.unwrap();
        assert_eq!(messages(&result.failures), vec!["Product Id is required."]);
    }

    #[tokio::test]
    async fn test_update_product_name_excludes_own_id() {
        let fx = Fixture::new();
        let a = fx.category("A").await;
        let widget = fx.product("Widget", &[a]).await;
        let gadget = fx.product("Gadget", &[a]).await;
        let rules = update_product_rules(fx.categories.clone(), fx.products.clone());

        let own = UpdateProductDto {
            id: widget,
            name: "Widget".to_string(),
            category_ids: Some(vec![a]),
            ..Default::default()
        };
        assert!(rules.validate(&own, &fx.cancel).await.unwrap().is_valid());

        let taken = UpdateProductDto { id: gadget, ..own };
        let result = rules.validate(&taken, &fx.cancel).await.unwrap();
        assert_eq!(messages(&result.failures), vec!["Product name already being used."]);
    }
}
