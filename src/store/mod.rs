//! Product persistence.
//!
//! Every read and write of product data goes through a [`ProductStore`]. Two
//! adapters exist: a flat JSON file rewritten in full on every mutation, and a
//! Postgres table. Both share the id, creation and edit rules defined here so
//! the business logic is never duplicated per backend.

mod json_file;
mod postgres;

use std::sync::Arc;
use async_trait::async_trait;
use tracing::info;

pub use json_file::JsonFileStore;
pub use postgres::PgProductStore;

use crate::config::StoreBackend;
use crate::error::StoreError;
use crate::models::{Product, ProductFields, ProductId, ProductState};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Non-deleted products in `state`, in storage order.
    async fn list_by_state(&self, state: ProductState) -> StoreResult<Vec<Product>>;

    /// Up to `limit` non-deleted products carrying a discount.
    async fn list_discounted(&self, limit: usize) -> StoreResult<Vec<Product>>;

    /// Resolves deleted products too; callers decide whether to show them.
    async fn get_by_id(&self, id: ProductId) -> StoreResult<Product>;

    async fn create(&self, fields: ProductFields, image: Option<String>) -> StoreResult<Product>;

    async fn update(
        &self,
        id: ProductId,
        fields: ProductFields,
        image: Option<String>,
    ) -> StoreResult<Product>;

    async fn set_state(&self, id: ProductId, state: ProductState) -> StoreResult<()>;

    async fn soft_delete(&self, id: ProductId) -> StoreResult<()>;

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Next id given the largest id currently stored.
pub fn next_id(max_existing: Option<ProductId>) -> ProductId {
    max_existing.map_or(1, |max| max + 1)
}

/// A product cannot be created without an uploaded image.
pub fn require_image(image: Option<String>) -> StoreResult<String> {
    match image {
        Some(image) if !image.trim().is_empty() => Ok(image),
        _ => Err(StoreError::Validation("A product image is required".to_string())),
    }
}

pub async fn open(backend: &StoreBackend) -> StoreResult<Arc<dyn ProductStore>> {
    match backend {
        StoreBackend::JsonFile(path) => {
            info!("Opening JSON product store at {}", path.display());
            Ok(Arc::new(JsonFileStore::open(path).await?))
        }
        StoreBackend::Postgres(url) => {
            info!("Connecting to Postgres product store");
            Ok(Arc::new(PgProductStore::connect(url).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_id_starts_at_one() {
        assert_eq!(next_id(None), 1);
        assert_eq!(next_id(Some(7)), 8);
    }

    #[test]
    fn image_is_required() {
        assert!(matches!(require_image(None), Err(StoreError::Validation(_))));
        assert!(matches!(require_image(Some("  ".into())), Err(StoreError::Validation(_))));
        assert_eq!(require_image(Some("tv.png".into())).unwrap(), "tv.png");
    }
}
