//! Product-category membership reconciliation.

use std::collections::BTreeSet;

use crate::models::{Category, Product};

/// Ids detached and attached by one [`reconcile_categories`] run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub removed: Vec<i32>,
    pub added: Vec<i32>,
}

impl ReconcileOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Make `product.categories` match `requested` by id.
///
/// Attached categories that are not requested are dropped; requested
/// records not yet attached are pushed as given. Category records are never
/// modified.
pub fn reconcile_categories(product: &mut Product, requested: Vec<Category>) -> ReconcileOutcome {
    let requested_ids: BTreeSet<i32> = requested.iter().map(|c| c.id).collect();
    let mut outcome = ReconcileOutcome::default();

    product.categories.retain(|attached| {
        let keep = requested_ids.contains(&attached.id);
        if !keep {
            outcome.removed.push(attached.id);
        }
        keep
    });

    let mut attached: BTreeSet<i32> = product.categories.iter().map(|c| c.id).collect();
    for category in requested {
        if attached.insert(category.id) {
            outcome.added.push(category.id);
            product.categories.push(category);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(ids: &[i32]) -> Vec<Category> {
        ids.iter()
            .map(|id| Category::new(*id, format!("Category {}", id)))
            .collect()
    }

    fn product_with(ids: &[i32]) -> Product {
        Product {
            id: 5,
            name: "Widget".to_string(),
            categories: categories(ids),
            ..Default::default()
        }
    }

    #[test]
    fn test_replaces_membership() {
        let mut product = product_with(&[1, 2]);

        let outcome = reconcile_categories(&mut product, categories(&[2, 3]));

        assert_eq!(outcome.removed, vec![1]);
        assert_eq!(outcome.added, vec![3]);
        let mut ids = product.category_ids();
        ids.sort();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_equal_sets_do_nothing() {
        let mut product = product_with(&[1, 2]);

        let outcome = reconcile_categories(&mut product, categories(&[2, 1]));

        assert!(outcome.is_unchanged());
        assert_eq!(product.category_ids(), vec![1, 2]);
    }

    #[test]
    fn test_idempotent() {
        let mut product = product_with(&[1]);

        reconcile_categories(&mut product, categories(&[4, 5, 6]));
        let second = reconcile_categories(&mut product, categories(&[4, 5, 6]));

        assert!(second.is_unchanged());
        assert_eq!(product.categories.len(), 3);
    }

    #[test]
    fn test_attaches_resolved_records() {
        let mut product = product_with(&[]);
        let mut resolved = Category::new(9, "Garden");
        resolved.product_ids.insert(77);

        reconcile_categories(&mut product, vec![resolved.clone()]);

        assert_eq!(product.categories, vec![resolved]);
    }

    #[test]
    fn test_empty_request_detaches_everything() {
        let mut product = product_with(&[1, 2]);

        let outcome = reconcile_categories(&mut product, Vec::new());

        assert_eq!(outcome.removed, vec![1, 2]);
        assert!(product.categories.is_empty());
    }
}
