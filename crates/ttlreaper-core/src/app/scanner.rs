//! TypeScanner - 1 つの型について TTL マーカー付きのインスタンスを列挙

use std::sync::Arc;

use crate::domain::{ManagedInstance, ReaperError, TypeDescriptor};
use crate::ports::{ListFilter, ObjectStore};

pub struct TypeScanner {
    store: Arc<dyn ObjectStore>,
    filter: ListFilter,
}

impl TypeScanner {
    /// The store query is always constrained to instances carrying `ttl_label`.
    pub fn new(store: Arc<dyn ObjectStore>, ttl_label: impl Into<String>) -> Self {
        Self {
            store,
            filter: ListFilter::has_label(ttl_label),
        }
    }

    /// Lists marked instances of `descriptor` in store order.
    ///
    /// Unmarked instances returned by a lax store are dropped here so they
    /// never reach the evaluator.
    pub async fn scan(
        &self,
        descriptor: &TypeDescriptor,
    ) -> Result<Vec<ManagedInstance>, ReaperError> {
        let mut instances = self
            .store
            .list(descriptor, &self.filter)
            .await
            .map_err(|e| ReaperError::StoreUnavailable {
                descriptor: descriptor.clone(),
                reason: e.to_string(),
            })?;

        let listed = instances.len();
        instances.retain(|i| self.filter.matches(i));
        if instances.len() != listed {
            tracing::debug!(
                gvk = %descriptor,
                dropped = listed - instances.len(),
                "store returned unmarked instances; dropped"
            );
        }
        Ok(instances)
    }
}
