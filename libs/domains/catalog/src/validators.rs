//! Storage-backed predicates used by the validation rules.

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::CatalogResult;
use crate::repository::{CategoryRepository, ProductRepository};

/// Checks over the category store
pub struct CategoryValidator<R: CategoryRepository> {
    repository: Arc<R>,
}

impl<R: CategoryRepository> Clone for CategoryValidator<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<R: CategoryRepository> CategoryValidator<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// True when the name is blank or no other category holds it
    pub async fn name_must_be_unique(
        &self,
        name: &str,
        exclude_id: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool> {
        if name.trim().is_empty() {
            return Ok(true);
        }
        let taken = self.repository.existing_name(name, exclude_id, cancel).await?;
        Ok(!taken)
    }

    /// True when nothing was requested, or every id exists and none repeats
    pub async fn all_categories_exist(
        &self,
        ids: Option<&[i32]>,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool> {
        let ids = match ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => return Ok(true),
        };

        let distinct = ids.iter().collect::<BTreeSet<_>>().len() as u64;
        let existing = self.repository.count_existing_ids(ids, cancel).await?;

        Ok(existing == distinct && distinct == ids.len() as u64)
    }

    pub fn not_duplicated_categories(ids: Option<&[i32]>) -> bool {
        match ids {
            Some(ids) => ids.iter().collect::<BTreeSet<_>>().len() == ids.len(),
            None => true,
        }
    }
}

/// Checks over the product store
pub struct ProductValidator<P: ProductRepository> {
    repository: Arc<P>,
}

impl<P: ProductRepository> Clone for ProductValidator<P> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<P: ProductRepository> ProductValidator<P> {
    pub fn new(repository: Arc<P>) -> Self {
        Self { repository }
    }

    pub async fn name_must_be_unique(
        &self,
        name: &str,
        exclude_id: i32,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool> {
        if name.trim().is_empty() {
            return Ok(true);
        }
        let taken = self.repository.existing_name(name, exclude_id, cancel).await?;
        Ok(!taken)
    }

    pub async fn product_must_exist(&self, id: i32, cancel: &CancellationToken) -> CatalogResult<bool> {
        Ok(self.repository.get(id, cancel).await?.is_some())
    }
}
