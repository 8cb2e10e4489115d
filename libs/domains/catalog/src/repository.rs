use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{CatalogError, CatalogResult, ensure_active};
use crate::models::{Category, Product};

/// Repository trait for Category persistence
///
/// Every call takes the request's cancellation token; implementations stop
/// and return [`CatalogError::Cancelled`] once it fires.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn get(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<Option<Category>>;

    /// All categories ordered by name
    async fn get_all(&self, cancel: &CancellationToken) -> CatalogResult<Vec<Category>>;

    /// One page ordered by name; empty when either argument is below 1
    async fn get_all_paged(
        &self,
        page_number: i32,
        page_size: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<Category>>;

    async fn count(&self, cancel: &CancellationToken) -> CatalogResult<u64>;

    /// Insert and assign `category.id`
    async fn insert(&self, category: &mut Category, cancel: &CancellationToken)
    -> CatalogResult<bool>;

    /// Rename; `false` when the id is unknown
    async fn update(&self, category: &Category, cancel: &CancellationToken) -> CatalogResult<bool>;

    /// Delete and detach from products; `false` when the id is unknown
    async fn delete(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<bool>;

    /// Number of stored categories whose id appears in `ids`.
    /// Repeated ids are counted once.
    async fn count_existing_ids(&self, ids: &[i32], cancel: &CancellationToken)
    -> CatalogResult<u64>;

    /// Whether another category (id != `exclude_id`) holds the trimmed name.
    /// Blank names report `true`.
    async fn existing_name(
        &self,
        name: &str,
        exclude_id: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool>;

    /// Resolve ids into stored records for attaching to a product.
    /// Unknown ids are skipped.
    async fn get_tracking(&self, ids: &[i32], cancel: &CancellationToken)
    -> CatalogResult<Vec<Category>>;
}

/// Repository trait for Product persistence
///
/// Reads load the attached categories.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<Option<Product>>;

    /// Fetch for editing: changes made to the returned value (scalars and
    /// `categories`) are persisted by a following [`ProductRepository::update`].
    async fn get_tracking(&self, id: i32, cancel: &CancellationToken)
    -> CatalogResult<Option<Product>>;

    async fn get_all(&self, cancel: &CancellationToken) -> CatalogResult<Vec<Product>>;

    async fn get_all_paged(
        &self,
        page_number: i32,
        page_size: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<Product>>;

    async fn count(&self, cancel: &CancellationToken) -> CatalogResult<u64>;

    /// Insert the product and its category links; assigns `product.id`
    async fn insert(&self, product: &mut Product, cancel: &CancellationToken) -> CatalogResult<bool>;

    /// Write scalars and replace the stored links with `product.categories`
    async fn update(&self, product: &Product, cancel: &CancellationToken) -> CatalogResult<bool>;

    async fn delete(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<bool>;

    async fn existing_name(
        &self,
        name: &str,
        exclude_id: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool>;
}

// ============================================================================
// In-memory implementation (for development/testing)
// ============================================================================

#[derive(Debug, Clone)]
struct StoredProduct {
    name: String,
    description: Option<String>,
    image: Option<Vec<u8>>,
}

/// Rows shared by both in-memory repositories, shaped like the SQL schema
#[derive(Debug, Default)]
struct CatalogStore {
    categories: BTreeMap<i32, String>,
    products: BTreeMap<i32, StoredProduct>,
    /// (product_id, category_id)
    links: BTreeSet<(i32, i32)>,
    last_category_id: i32,
    last_product_id: i32,
}

impl CatalogStore {
    fn category(&self, id: i32) -> Option<Category> {
        let name = self.categories.get(&id)?;
        let product_ids = self
            .links
            .iter()
            .filter(|(_, category_id)| *category_id == id)
            .map(|(product_id, _)| *product_id)
            .collect();

        Some(Category {
            id,
            name: name.clone(),
            product_ids,
        })
    }

    fn categories_by_name(&self) -> Vec<Category> {
        let mut all: Vec<Category> = self
            .categories
            .keys()
            .filter_map(|id| self.category(*id))
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        all
    }

    fn product(&self, id: i32) -> Option<Product> {
        let stored = self.products.get(&id)?;
        let mut categories: Vec<Category> = self
            .links
            .range((id, i32::MIN)..=(id, i32::MAX))
            .filter_map(|(_, category_id)| self.category(*category_id))
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));

        Some(Product {
            id,
            name: stored.name.clone(),
            description: stored.description.clone(),
            image: stored.image.clone(),
            categories,
        })
    }

    fn products_by_name(&self) -> Vec<Product> {
        let mut all: Vec<Product> = self
            .products
            .keys()
            .filter_map(|id| self.product(*id))
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        all
    }

    fn category_name_taken(&self, name: &str, exclude_id: i32) -> bool {
        self.categories
            .iter()
            .any(|(id, existing)| *id != exclude_id && existing == name)
    }

    fn product_name_taken(&self, name: &str, exclude_id: i32) -> bool {
        self.products
            .iter()
            .any(|(id, existing)| *id != exclude_id && existing.name == name)
    }

    /// Mirrors the join table's foreign key
    fn check_links(&self, product: &Product) -> CatalogResult<()> {
        match product
            .categories
            .iter()
            .find(|c| !self.categories.contains_key(&c.id))
        {
            Some(missing) => Err(CatalogError::Conflict(format!(
                "category {} does not exist",
                missing.id
            ))),
            None => Ok(()),
        }
    }
}

fn page<T>(items: Vec<T>, page_number: i32, page_size: i32) -> Vec<T> {
    if page_number < 1 || page_size < 1 {
        return Vec::new();
    }

    let skip = (page_number as usize - 1).saturating_mul(page_size as usize);
    items.into_iter().skip(skip).take(page_size as usize).collect()
}

/// In-memory catalog backing both repositories
///
/// Clones share the same rows, so the category and product repositories
/// handed out by one catalog see each other's writes.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    store: Arc<RwLock<CatalogStore>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> InMemoryCategoryRepository {
        InMemoryCategoryRepository {
            store: self.store.clone(),
        }
    }

    pub fn products(&self) -> InMemoryProductRepository {
        InMemoryProductRepository {
            store: self.store.clone(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryCategoryRepository {
    store: Arc<RwLock<CatalogStore>>,
}

impl InMemoryCategoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategoryRepository for InMemoryCategoryRepository {
    async fn get(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<Option<Category>> {
        ensure_active(cancel)?;
        Ok(self.store.read().await.category(id))
    }

    async fn get_all(&self, cancel: &CancellationToken) -> CatalogResult<Vec<Category>> {
        ensure_active(cancel)?;
        Ok(self.store.read().await.categories_by_name())
    }

    async fn get_all_paged(
        &self,
        page_number: i32,
        page_size: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<Category>> {
        ensure_active(cancel)?;
        let all = self.store.read().await.categories_by_name();
        Ok(page(all, page_number, page_size))
    }

    async fn count(&self, cancel: &CancellationToken) -> CatalogResult<u64> {
        ensure_active(cancel)?;
        Ok(self.store.read().await.categories.len() as u64)
    }

    async fn insert(
        &self,
        category: &mut Category,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool> {
        ensure_active(cancel)?;
        let mut store = self.store.write().await;

        if store.category_name_taken(&category.name, 0) {
            return Err(CatalogError::Conflict(format!(
                "category name '{}' already exists",
                category.name
            )));
        }

        store.last_category_id += 1;
        category.id = store.last_category_id;
        store.categories.insert(category.id, category.name.clone());

        Ok(true)
    }

    async fn update(&self, category: &Category, cancel: &CancellationToken) -> CatalogResult<bool> {
        ensure_active(cancel)?;
        let mut store = self.store.write().await;

        if !store.categories.contains_key(&category.id) {
            return Ok(false);
        }
        if store.category_name_taken(&category.name, category.id) {
            return Err(CatalogError::Conflict(format!(
                "category name '{}' already exists",
                category.name
            )));
        }

        store.categories.insert(category.id, category.name.clone());
        Ok(true)
    }

    async fn delete(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<bool> {
        ensure_active(cancel)?;
        let mut store = self.store.write().await;

        if store.categories.remove(&id).is_none() {
            return Ok(false);
        }
        store.links.retain(|(_, category_id)| *category_id != id);

        Ok(true)
    }

    async fn count_existing_ids(
        &self,
        ids: &[i32],
        cancel: &CancellationToken,
    ) -> CatalogResult<u64> {
        ensure_active(cancel)?;
        let store = self.store.read().await;
        let distinct: BTreeSet<i32> = ids.iter().copied().collect();

        Ok(distinct
            .iter()
            .filter(|id| store.categories.contains_key(id))
            .count() as u64)
    }

    async fn existing_name(
        &self,
        name: &str,
        exclude_id: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool> {
        ensure_active(cancel)?;
        let name = name.trim();
        if name.is_empty() {
            return Ok(true);
        }

        Ok(self.store.read().await.category_name_taken(name, exclude_id))
    }

    async fn get_tracking(
        &self,
        ids: &[i32],
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<Category>> {
        ensure_active(cancel)?;
        let store = self.store.read().await;
        let distinct: BTreeSet<i32> = ids.iter().copied().collect();

        Ok(distinct.iter().filter_map(|id| store.category(*id)).collect())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryProductRepository {
    store: Arc<RwLock<CatalogStore>>,
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn get(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<Option<Product>> {
        ensure_active(cancel)?;
        Ok(self.store.read().await.product(id))
    }

    async fn get_tracking(
        &self,
        id: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<Option<Product>> {
        // The caller's copy is written back wholesale by `update`
        self.get(id, cancel).await
    }

    async fn get_all(&self, cancel: &CancellationToken) -> CatalogResult<Vec<Product>> {
        ensure_active(cancel)?;
        Ok(self.store.read().await.products_by_name())
    }

    async fn get_all_paged(
        &self,
        page_number: i32,
        page_size: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<Product>> {
        ensure_active(cancel)?;
        let all = self.store.read().await.products_by_name();
        Ok(page(all, page_number, page_size))
    }

    async fn count(&self, cancel: &CancellationToken) -> CatalogResult<u64> {
        ensure_active(cancel)?;
        Ok(self.store.read().await.products.len() as u64)
    }

    async fn insert(&self, product: &mut Product, cancel: &CancellationToken) -> CatalogResult<bool> {
        ensure_active(cancel)?;
        let mut store = self.store.write().await;

        if store.product_name_taken(&product.name, 0) {
            return Err(CatalogError::Conflict(format!(
                "product name '{}' already exists",
                product.name
            )));
        }
        store.check_links(product)?;

        store.last_product_id += 1;
        product.id = store.last_product_id;
        store.products.insert(
            product.id,
            StoredProduct {
                name: product.name.clone(),
                description: product.description.clone(),
                image: product.image.clone(),
            },
        );
        for category in &product.categories {
            store.links.insert((product.id, category.id));
        }

        Ok(true)
    }

    async fn update(&self, product: &Product, cancel: &CancellationToken) -> CatalogResult<bool> {
        ensure_active(cancel)?;
        let mut store = self.store.write().await;

        if !store.products.contains_key(&product.id) {
            return Ok(false);
        }
        if store.product_name_taken(&product.name, product.id) {
            return Err(CatalogError::Conflict(format!(
                "product name '{}' already exists",
                product.name
            )));
        }
        store.check_links(product)?;

        store.products.insert(
            product.id,
            StoredProduct {
                name: product.name.clone(),
                description: product.description.clone(),
                image: product.image.clone(),
            },
        );
        store.links.retain(|(product_id, _)| *product_id != product.id);
        for category in &product.categories {
            store.links.insert((product.id, category.id));
        }

        Ok(true)
    }

    async fn delete(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<bool> {
        ensure_active(cancel)?;
        let mut store = self.store.write().await;

        if store.products.remove(&id).is_none() {
            return Ok(false);
        }
        store.links.retain(|(product_id, _)| *product_id != id);

        Ok(true)
    }

    async fn existing_name(
        &self,
        name: &str,
        exclude_id: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool> {
        ensure_active(cancel)?;
        let name = name.trim();
        if name.is_empty() {
            return Ok(true);
        }

        Ok(self.store.read().await.product_name_taken(name, exclude_id))
    }
}
