use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgPool, PgPoolOptions, PgQueryResult};
use sqlx::FromRow;
use tracing::{debug, error, info};

use super::{next_id, require_image, ProductStore, StoreResult};
use crate::error::{StorageError, StoreError};
use crate::models::{Product, ProductFields, ProductId, ProductState};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS products (
    id BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    price DOUBLE PRECISION NOT NULL,
    discount SMALLINT NOT NULL DEFAULT 0,
    image TEXT NOT NULL,
    section_id BIGINT,
    brand_id BIGINT,
    collection_id BIGINT,
    state TEXT NOT NULL DEFAULT 'stock',
    deleted BOOLEAN NOT NULL DEFAULT FALSE
)";

const COLUMNS: &str =
    "id, name, description, price, discount, image, section_id, brand_id, collection_id, state, deleted";

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: String,
    price: f64,
    discount: i16,
    image: String,
    section_id: Option<i64>,
    brand_id: Option<i64>,
    collection_id: Option<i64>,
    state: String,
    deleted: bool,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let discount = u8::try_from(row.discount).map_err(|_| {
            StorageError::Corrupt(format!("product {} has discount {}", row.id, row.discount))
        })?;
        let state = row
            .state
            .parse::<ProductState>()
            .map_err(|e| StorageError::Corrupt(format!("product {}: {}", row.id, e)))?;

        Ok(Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            discount,
            image: row.image,
            section_id: row.section_id,
            brand_id: row.brand_id,
            collection_id: row.collection_id,
            state,
            deleted: row.deleted,
        })
    }
}

/// Products stored in a Postgres `products` table.
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| {
                error!("Failed to connect to the database: {}", e);
                StoreError::from(e)
            })?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        info!("Database connection established");
        Ok(PgProductStore { pool })
    }

    async fn fetch_many(
        &self,
        sql: &str,
        state: Option<ProductState>,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Product>> {
        let mut query = sqlx::query_as::<_, ProductRow>(sql);
        if let Some(state) = state {
            query = query.bind(state.as_str());
        }
        if let Some(limit) = limit {
            query = query.bind(limit);
        }

        let mut products = Vec::new();
        let mut rows = query.fetch(&self.pool);
        while let Some(row) = rows.try_next().await.map_err(|e| {
            error!("Error while iterating products: {}", e);
            StoreError::from(e)
        })? {
            products.push(Product::try_from(row)?);
        }
        Ok(products)
    }

    fn ensure_matched(id: ProductId, result: PgQueryResult) -> StoreResult<()> {
        if result.rows_affected() == 0 {
            debug!("Product not found: {}", id);
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn list_by_state(&self, state: ProductState) -> StoreResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE state = $1 AND deleted = FALSE ORDER BY id",
            COLUMNS
        );
        self.fetch_many(&sql, Some(state), None).await
    }

    async fn list_discounted(&self, limit: usize) -> StoreResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE discount > 0 AND deleted = FALSE ORDER BY id LIMIT $1",
            COLUMNS
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.fetch_many(&sql, None, Some(limit)).await
    }

    async fn get_by_id(&self, id: ProductId) -> StoreResult<Product> {
        let sql = format!("SELECT {} FROM products WHERE id = $1", COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Product::try_from(row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn create(&self, fields: ProductFields, image: Option<String>) -> StoreResult<Product> {
        let image = require_image(image)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("LOCK TABLE products IN EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM products")
            .fetch_one(&mut *tx)
            .await?;

        let product = Product::new(next_id(max), fields, image);
        sqlx::query(&format!(
            "INSERT INTO products ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            COLUMNS
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(i16::from(product.discount))
        .bind(&product.image)
        .bind(product.section_id)
        .bind(product.brand_id)
        .bind(product.collection_id)
        .bind(product.state.as_str())
        .bind(product.deleted)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("Product created with ID: {}", product.id);
        Ok(product)
    }

    async fn update(
        &self,
        id: ProductId,
        fields: ProductFields,
        image: Option<String>,
    ) -> StoreResult<Product> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 FOR UPDATE",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        let mut product = Product::try_from(row)?;
        product.apply_edit(fields, image);

        sqlx::query(
            "UPDATE products SET name = $1, description = $2, price = $3, discount = $4, image = $5, \
             section_id = $6, brand_id = $7, collection_id = $8 WHERE id = $9",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(i16::from(product.discount))
        .bind(&product.image)
        .bind(product.section_id)
        .bind(product.brand_id)
        .bind(product.collection_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("Product updated successfully: {}", id);
        Ok(product)
    }

    async fn set_state(&self, id: ProductId, state: ProductState) -> StoreResult<()> {
        let result = sqlx::query("UPDATE products SET state = $1 WHERE id = $2")
            .bind(state.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Self::ensure_matched(id, result)
    }

    async fn soft_delete(&self, id: ProductId) -> StoreResult<()> {
        let result = sqlx::query("UPDATE products SET deleted = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Self::ensure_matched(id, result)
    }

    async fn close(&self) -> StoreResult<()> {
        self.pool.close().await;
        info!("Database pool closed");
        Ok(())
    }
}
