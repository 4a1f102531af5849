use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::{next_id, require_image, ProductStore, StoreResult};
use crate::error::StoreError;
use crate::models::{Product, ProductFields, ProductId, ProductState};

/// Product collection kept as a single JSON array on disk.
///
/// Each operation loads the whole array, scans it linearly and, for
/// mutations, writes the whole array back. The mutex serializes operations
/// so two requests cannot interleave their read and rewrite.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens the collection, creating an empty one if the file is missing.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let store = JsonFileStore {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        };

        if tokio::fs::try_exists(&store.path).await? {
            let products = store.load().await?;
            info!("Loaded {} products from {}", products.len(), store.path.display());
        } else {
            if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            store.persist(&[]).await?;
            info!("Created empty product collection at {}", store.path.display());
        }

        Ok(store)
    }

    async fn load(&self) -> StoreResult<Vec<Product>> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            error!("Failed to read {}: {}", self.path.display(), e);
            StoreError::from(e)
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            error!("Failed to parse {}: {}", self.path.display(), e);
            StoreError::from(e)
        })
    }

    /// Rewrites the full collection. The data lands in a sibling file first and
    /// is renamed over the original, so readers never see a partial write.
    async fn persist(&self, products: &[Product]) -> StoreResult<()> {
        let mut buf = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
        products.serialize(&mut serializer)?;

        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, &buf).await.map_err(|e| {
            error!("Failed to write {}: {}", staging.display(), e);
            StoreError::from(e)
        })?;
        tokio::fs::rename(&staging, &self.path).await.map_err(|e| {
            error!("Failed to replace {}: {}", self.path.display(), e);
            StoreError::from(e)
        })?;
        Ok(())
    }

    /// Locates `id`, applies `edit` to it in place and writes the collection back.
    async fn mutate<T, F>(&self, id: ProductId, edit: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Product) -> T + Send,
        T: Send,
    {
        let _guard = self.lock.lock().await;
        let mut products = self.load().await?;
        let index = products
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::NotFound(id))?;

        let result = edit(&mut products[index]);
        self.persist(&products).await?;
        Ok(result)
    }
}

#[async_trait]
impl ProductStore for JsonFileStore {
    async fn list_by_state(&self, state: ProductState) -> StoreResult<Vec<Product>> {
        let _guard = self.lock.lock().await;
        let products = self.load().await?;
        Ok(products.into_iter().filter(|p| p.is_listed(state)).collect())
    }

    async fn list_discounted(&self, limit: usize) -> StoreResult<Vec<Product>> {
        let _guard = self.lock.lock().await;
        let products = self.load().await?;
        Ok(products
            .into_iter()
            .filter(|p| !p.deleted && p.discount > 0)
            .take(limit)
            .collect())
    }

    async fn get_by_id(&self, id: ProductId) -> StoreResult<Product> {
        let _guard = self.lock.lock().await;
        let products = self.load().await?;
        products
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, fields: ProductFields, image: Option<String>) -> StoreResult<Product> {
        let image = require_image(image)?;

        let _guard = self.lock.lock().await;
        let mut products = self.load().await?;
        let id = next_id(products.iter().map(|p| p.id).max());
        let product = Product::new(id, fields, image);

        products.push(product.clone());
        self.persist(&products).await?;
        info!("Product created with ID: {}", id);
        Ok(product)
    }

    async fn update(
        &self,
        id: ProductId,
        fields: ProductFields,
        image: Option<String>,
    ) -> StoreResult<Product> {
        debug!("Updating product {}", id);
        self.mutate(id, move |product| {
            product.apply_edit(fields, image);
            product.clone()
        })
        .await
    }

    async fn set_state(&self, id: ProductId, state: ProductState) -> StoreResult<()> {
        debug!("Moving product {} to {}", id, state);
        self.mutate(id, |product| product.state = state).await
    }

    async fn soft_delete(&self, id: ProductId) -> StoreResult<()> {
        debug!("Soft-deleting product {}", id);
        self.mutate(id, |product| product.deleted = true).await
    }
}
