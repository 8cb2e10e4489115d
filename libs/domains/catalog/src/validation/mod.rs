//! Field-level validation pipeline.
//!
//! A [`RuleSet`] holds one [`FieldRules`] chain per property. Every field is
//! evaluated; inside a field the [`Cascade`] mode decides whether later rules
//! still run after a failure. Async rules receive the request's
//! cancellation token and may hit storage.
//!
//! ```rust,ignore
//! let rules = RuleSet::new().field(
//!     FieldRules::new("Name")
//!         .must(|dto: &CreateCategoryDto| !dto.name.trim().is_empty(), "Category name is required."),
//! );
//! let result = rules.validate(&dto, &cancel).await?;
//! ```

pub mod rules;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::{CatalogResult, ensure_active};
use crate::response::ValidationFailure;

pub use rules::{
    create_category_rules, create_product_rules, update_category_rules, update_product_rules,
};

/// What a field chain does after one of its rules fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cascade {
    /// Run the remaining rules of the field
    #[default]
    Continue,
    /// Skip the remaining rules of the field
    Stop,
}

type SyncPredicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type AsyncPredicate<T> = Box<
    dyn for<'a> Fn(&'a T, &'a CancellationToken) -> BoxFuture<'a, CatalogResult<bool>>
        + Send
        + Sync,
>;

enum Predicate<T> {
    Sync(SyncPredicate<T>),
    Async(AsyncPredicate<T>),
}

struct Rule<T> {
    predicate: Predicate<T>,
    message: &'static str,
}

/// Ordered rules for one property
pub struct FieldRules<T> {
    property: &'static str,
    cascade: Cascade,
    rules: Vec<Rule<T>>,
}

impl<T> FieldRules<T> {
    pub fn new(property: &'static str) -> Self {
        Self {
            property,
            cascade: Cascade::Continue,
            rules: Vec::new(),
        }
    }

    pub fn cascade(mut self, cascade: Cascade) -> Self {
        self.cascade = cascade;
        self
    }

    /// Fail with `message` when `predicate` returns false
    pub fn must<F>(mut self, predicate: F, message: &'static str) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            predicate: Predicate::Sync(Box::new(predicate)),
            message,
        });
        self
    }

    /// Like [`FieldRules::must`] for predicates that await storage.
    /// Errors abort the whole validation.
    pub fn must_async<F>(mut self, predicate: F, message: &'static str) -> Self
    where
        F: for<'a> Fn(&'a T, &'a CancellationToken) -> BoxFuture<'a, CatalogResult<bool>>
            + Send
            + Sync
            + 'static,
    {
        self.rules.push(Rule {
            predicate: Predicate::Async(Box::new(predicate)),
            message,
        });
        self
    }

    pub fn property(&self) -> &'static str {
        self.property
    }
}

/// Failures collected by one [`RuleSet::validate`] run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub failures: Vec<ValidationFailure>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Validation rules for one transfer object
pub struct RuleSet<T> {
    fields: Vec<FieldRules<T>>,
}

impl<T> Default for RuleSet<T> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<T: Sync> RuleSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, rules: FieldRules<T>) -> Self {
        self.fields.push(rules);
        self
    }

    /// Run every field chain in declaration order.
    ///
    /// Returns [`crate::CatalogError::Cancelled`] if the token fires between
    /// rules, and any storage error an async rule raised.
    pub async fn validate(
        &self,
        instance: &T,
        cancel: &CancellationToken,
    ) -> CatalogResult<ValidationResult> {
        let mut failures = Vec::new();

        for field in &self.fields {
            for rule in &field.rules {
                ensure_active(cancel)?;

                let passed = match &rule.predicate {
                    Predicate::Sync(predicate) => predicate(instance),
                    Predicate::Async(predicate) => predicate(instance, cancel).await?,
                };

                if !passed {
                    failures.push(ValidationFailure::new(field.property, rule.message));
                    if field.cascade == Cascade::Stop {
                        break;
                    }
                }
            }
        }

        Ok(ValidationResult { failures })
    }
}
