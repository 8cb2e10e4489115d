use async_trait::async_trait;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::{
    entity::{category, product, product_category},
    error::{CatalogError, CatalogResult},
    models::{Category, Product},
    repository::{CategoryRepository, ProductRepository},
};

/// Race a query against the request's cancellation token.
///
/// Dropping the query future drops any open transaction, which rolls back.
async fn cancellable<T, F>(cancel: &CancellationToken, query: F) -> CatalogResult<T>
where
    F: Future<Output = Result<T, DbErr>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CatalogError::Cancelled),
        result = query => result.map_err(CatalogError::from),
    }
}

fn page_bounds(page_number: i32, page_size: i32) -> Option<(u64, u64)> {
    if page_number < 1 || page_size < 1 {
        return None;
    }
    let size = page_size as u64;
    Some(((page_number as u64 - 1) * size, size))
}

/// Product ids linked to each of `category_ids`
async fn product_ids_by_category<C: ConnectionTrait>(
    conn: &C,
    category_ids: Vec<i32>,
) -> Result<HashMap<i32, BTreeSet<i32>>, DbErr> {
    if category_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let links = product_category::Entity::find()
        .filter(product_category::Column::CategoryId.is_in(category_ids))
        .all(conn)
        .await?;

    let mut grouped: HashMap<i32, BTreeSet<i32>> = HashMap::new();
    for link in links {
        grouped
            .entry(link.category_id)
            .or_default()
            .insert(link.product_id);
    }
    Ok(grouped)
}

async fn with_product_ids<C: ConnectionTrait>(
    conn: &C,
    models: Vec<category::Model>,
) -> Result<Vec<Category>, DbErr> {
    let ids = models.iter().map(|m| m.category_id).collect();
    let mut grouped = product_ids_by_category(conn, ids).await?;

    Ok(models
        .into_iter()
        .map(|model| {
            let product_ids = grouped.remove(&model.category_id).unwrap_or_default();
            Category {
                product_ids,
                ..model.into()
            }
        })
        .collect())
}

/// Load the categories attached to each product, ordered by name
async fn with_categories<C: ConnectionTrait>(
    conn: &C,
    models: Vec<product::Model>,
) -> Result<Vec<Product>, DbErr> {
    if models.is_empty() {
        return Ok(Vec::new());
    }

    let product_ids: Vec<i32> = models.iter().map(|m| m.product_id).collect();
    let links = product_category::Entity::find()
        .filter(product_category::Column::ProductId.is_in(product_ids))
        .all(conn)
        .await?;

    let category_ids: BTreeSet<i32> = links.iter().map(|l| l.category_id).collect();
    let categories: HashMap<i32, Category> = if category_ids.is_empty() {
        HashMap::new()
    } else {
        category::Entity::find()
            .filter(category::Column::CategoryId.is_in(category_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|m| (m.category_id, m.into()))
            .collect()
    };

    let mut attached: HashMap<i32, Vec<Category>> = HashMap::new();
    for link in links {
        if let Some(category) = categories.get(&link.category_id) {
            attached
                .entry(link.product_id)
                .or_default()
                .push(category.clone());
        }
    }

    Ok(models
        .into_iter()
        .map(|model| {
            let mut categories = attached.remove(&model.product_id).unwrap_or_default();
            categories.sort_by(|a, b| a.name.cmp(&b.name));
            Product {
                id: model.product_id,
                name: model.name,
                description: model.description,
                image: model.image,
                categories,
            }
        })
        .collect())
}

fn link_rows(product_id: i32, category_ids: impl IntoIterator<Item = i32>) -> Vec<product_category::ActiveModel> {
    category_ids
        .into_iter()
        .map(|category_id| product_category::ActiveModel {
            product_id: Set(product_id),
            category_id: Set(category_id),
        })
        .collect()
}

// ============================================================================
// Categories
// ============================================================================

pub struct PgCategoryRepository {
    db: DatabaseConnection,
}

impl PgCategoryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn get(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<Option<Category>> {
        cancellable(cancel, async {
            match category::Entity::find_by_id(id).one(&self.db).await? {
                Some(model) => Ok(with_product_ids(&self.db, vec![model]).await?.pop()),
                None => Ok(None),
            }
        })
        .await
    }

    async fn get_all(&self, cancel: &CancellationToken) -> CatalogResult<Vec<Category>> {
        cancellable(cancel, async {
            let models = category::Entity::find()
                .order_by_asc(category::Column::Name)
                .order_by_asc(category::Column::CategoryId)
                .all(&self.db)
                .await?;
            with_product_ids(&self.db, models).await
        })
        .await
    }

    async fn get_all_paged(
        &self,
        page_number: i32,
        page_size: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<Category>> {
        let Some((offset, limit)) = page_bounds(page_number, page_size) else {
            return Ok(Vec::new());
        };

        cancellable(cancel, async {
            let models = category::Entity::find()
                .order_by_asc(category::Column::Name)
                .order_by_asc(category::Column::CategoryId)
                .offset(offset)
                .limit(limit)
                .all(&self.db)
                .await?;
            with_product_ids(&self.db, models).await
        })
        .await
    }

    async fn count(&self, cancel: &CancellationToken) -> CatalogResult<u64> {
        cancellable(cancel, category::Entity::find().count(&self.db)).await
    }

    async fn insert(
        &self,
        category: &mut Category,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool> {
        let active = category::ActiveModel {
            name: Set(category.name.clone()),
            ..Default::default()
        };

        let model = cancellable(cancel, active.insert(&self.db)).await?;
        category.id = model.category_id;

        tracing::info!(category_id = category.id, "Inserted category");
        Ok(true)
    }

    async fn update(&self, category: &Category, cancel: &CancellationToken) -> CatalogResult<bool> {
        let changes = category::ActiveModel {
            name: Set(category.name.clone()),
            ..Default::default()
        };

        let result = cancellable(
            cancel,
            category::Entity::update_many()
                .set(changes)
                .filter(category::Column::CategoryId.eq(category.id))
                .exec(&self.db),
        )
        .await?;

        Ok(result.rows_affected > 0)
    }

    async fn delete(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<bool> {
        let result = cancellable(cancel, category::Entity::delete_by_id(id).exec(&self.db)).await?;
        Ok(result.rows_affected > 0)
    }

    async fn count_existing_ids(
        &self,
        ids: &[i32],
        cancel: &CancellationToken,
    ) -> CatalogResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        cancellable(
            cancel,
            category::Entity::find()
                .filter(category::Column::CategoryId.is_in(ids.to_vec()))
                .count(&self.db),
        )
        .await
    }

    async fn existing_name(
        &self,
        name: &str,
        exclude_id: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(true);
        }

        let found = cancellable(
            cancel,
            category::Entity::find()
                .filter(category::Column::Name.eq(name))
                .filter(category::Column::CategoryId.ne(exclude_id))
                .one(&self.db),
        )
        .await?;

        Ok(found.is_some())
    }

    async fn get_tracking(
        &self,
        ids: &[i32],
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = cancellable(
            cancel,
            category::Entity::find()
                .filter(category::Column::CategoryId.is_in(ids.to_vec()))
                .order_by_asc(category::Column::CategoryId)
                .all(&self.db),
        )
        .await?;

        Ok(models.into_iter().map(Category::from).collect())
    }
}

// ============================================================================
// Products
// ============================================================================

pub struct PgProductRepository {
    db: DatabaseConnection,
}

impl PgProductRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn get(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<Option<Product>> {
        cancellable(cancel, async {
            match product::Entity::find_by_id(id).one(&self.db).await? {
                Some(model) => Ok(with_categories(&self.db, vec![model]).await?.pop()),
                None => Ok(None),
            }
        })
        .await
    }

    /// Same as `get`: `update` diffs the links against the stored rows, so
    /// the returned value needs no session state.
    async fn get_tracking(
        &self,
        id: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<Option<Product>> {
        self.get(id, cancel).await
    }

    async fn get_all(&self, cancel: &CancellationToken) -> CatalogResult<Vec<Product>> {
        cancellable(cancel, async {
            let models = product::Entity::find()
                .order_by_asc(product::Column::Name)
                .order_by_asc(product::Column::ProductId)
                .all(&self.db)
                .await?;
            with_categories(&self.db, models).await
        })
        .await
    }

    async fn get_all_paged(
        &self,
        page_number: i32,
        page_size: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<Product>> {
        let Some((offset, limit)) = page_bounds(page_number, page_size) else {
            return Ok(Vec::new());
        };

        cancellable(cancel, async {
            let models = product::Entity::find()
                .order_by_asc(product::Column::Name)
                .order_by_asc(product::Column::ProductId)
                .offset(offset)
                .limit(limit)
                .all(&self.db)
                .await?;
            with_categories(&self.db, models).await
        })
        .await
    }

    async fn count(&self, cancel: &CancellationToken) -> CatalogResult<u64> {
        cancellable(cancel, product::Entity::find().count(&self.db)).await
    }

    async fn insert(&self, product: &mut Product, cancel: &CancellationToken) -> CatalogResult<bool> {
        let row = product::ActiveModel {
            name: Set(product.name.clone()),
            description: Set(product.description.clone()),
            image: Set(product.image.clone()),
            ..Default::default()
        };
        let category_ids: BTreeSet<i32> = product.categories.iter().map(|c| c.id).collect();

        let product_id = cancellable(cancel, async {
            let txn = self.db.begin().await?;

            let model = row.insert(&txn).await?;
            if !category_ids.is_empty() {
                product_category::Entity::insert_many(link_rows(model.product_id, category_ids))
                    .exec_without_returning(&txn)
                    .await?;
            }

            txn.commit().await?;
            Ok(model.product_id)
        })
        .await?;

        product.id = product_id;
        tracing::info!(product_id, "Inserted product");
        Ok(true)
    }

    async fn update(&self, product: &Product, cancel: &CancellationToken) -> CatalogResult<bool> {
        let changes = product::ActiveModel {
            name: Set(product.name.clone()),
            description: Set(product.description.clone()),
            image: Set(product.image.clone()),
            ..Default::default()
        };
        let wanted: BTreeSet<i32> = product.categories.iter().map(|c| c.id).collect();
        let id = product.id;

        cancellable(cancel, async {
            let txn = self.db.begin().await?;

            let updated = product::Entity::update_many()
                .set(changes)
                .filter(product::Column::ProductId.eq(id))
                .exec(&txn)
                .await?;
            if updated.rows_affected == 0 {
                return Ok(false);
            }

            let stored: BTreeSet<i32> = product_category::Entity::find()
                .filter(product_category::Column::ProductId.eq(id))
                .all(&txn)
                .await?
                .into_iter()
                .map(|link| link.category_id)
                .collect();

            let removed: Vec<i32> = stored.difference(&wanted).copied().collect();
            let added: Vec<i32> = wanted.difference(&stored).copied().collect();

            if !removed.is_empty() {
                product_category::Entity::delete_many()
                    .filter(product_category::Column::ProductId.eq(id))
                    .filter(product_category::Column::CategoryId.is_in(removed.clone()))
                    .exec(&txn)
                    .await?;
            }
            if !added.is_empty() {
                product_category::Entity::insert_many(link_rows(id, added.iter().copied()))
                    .exec_without_returning(&txn)
                    .await?;
            }

            txn.commit().await?;
            tracing::debug!(product_id = id, removed = ?removed, added = ?added, "Synced product categories");
            Ok(true)
        })
        .await
    }

    async fn delete(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<bool> {
        let result = cancellable(cancel, product::Entity::delete_by_id(id).exec(&self.db)).await?;
        Ok(result.rows_affected > 0)
    }

    async fn existing_name(
        &self,
        name: &str,
        exclude_id: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(true);
        }

        let found = cancellable(
            cancel,
            product::Entity::find()
                .filter(product::Column::Name.eq(name))
                .filter(product::Column::ProductId.ne(exclude_id))
                .one(&self.db),
        )
        .await?;

        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(1, 10), Some((0, 10)));
        assert_eq!(page_bounds(3, 2), Some((4, 2)));
        assert_eq!(page_bounds(0, 10), None);
        assert_eq!(page_bounds(1, 0), None);
    }

    #[tokio::test]
    async fn test_cancellable_prefers_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = cancellable(&cancel, async { Ok::<_, DbErr>(1) }).await;
        assert!(matches!(result, Err(CatalogError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancellable_maps_db_errors() {
        let cancel = CancellationToken::new();

        let result: CatalogResult<()> =
            cancellable(&cancel, async { Err(DbErr::Custom("boom".to_string())) }).await;
        assert!(matches!(result, Err(CatalogError::Database(_))));
    }
}
