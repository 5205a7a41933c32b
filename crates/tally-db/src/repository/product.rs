//! # Product Repository
//!
//! Database operations for the product catalogue.
//!
//! The ledger validates every delta against this catalogue, and the
//! dashboard's low-stock view is answered here by joining products against
//! their per-branch stock levels.
//!
//! ## SKU Immutability
//! `sku` is written once at insert and never updated - no method on this
//! repository (or anywhere else) exposes an SKU update.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{Product, ProductVariant};

/// A product paired with one branch's quantity, for the low-stock view.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct LowStockRow {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub branch_id: String,
    pub quantity: i64,
    pub min_stock_level: i64,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
/// let product = repo.get_by_id("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, barcode, name, description,
                cost_cents, price_cents, min_stock_level,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.min_stock_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, barcode, name, description,
                   cost_cents, price_cents, min_stock_level,
                   is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, barcode, name, description,
                   cost_cents, price_cents, min_stock_level,
                   is_active, created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Checks whether an active product exists.
    pub async fn exists(&self, id: &str) -> DbResult<bool> {
        let row: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1 AND is_active = 1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// Historical transactions and receipt lines still reference the row.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Lists products whose quantity at a branch is at or below their
    /// low-stock threshold.
    pub async fn list_low_stock(&self, branch_id: &str, limit: u32) -> DbResult<Vec<LowStockRow>> {
        let rows = sqlx::query_as::<_, LowStockRow>(
            r#"
            SELECT p.id AS product_id, p.sku, p.name,
                   s.branch_id, s.quantity, p.min_stock_level
            FROM stock_levels s
            INNER JOIN products p ON p.id = s.product_id
            WHERE s.branch_id = ?1
              AND p.is_active = 1
              AND s.quantity <= p.min_stock_level
            ORDER BY s.quantity ASC
            LIMIT ?2
            "#,
        )
        .bind(branch_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Adds a variant to a product.
    ///
    /// Variants price independently but draw from the parent's stock pool,
    /// so no stock row is created here.
    pub async fn add_variant(&self, variant: &ProductVariant) -> DbResult<ProductVariant> {
        debug!(product_id = %variant.product_id, name = %variant.name, "Adding variant");

        sqlx::query(
            r#"
            INSERT INTO product_variants (id, product_id, name, price_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.name)
        .bind(variant.price_cents)
        .bind(variant.created_at)
        .execute(&self.pool)
        .await?;

        Ok(variant.clone())
    }

    /// Lists a product's variants.
    pub async fn list_variants(&self, product_id: &str) -> DbResult<Vec<ProductVariant>> {
        let variants = sqlx::query_as::<_, ProductVariant>(
            r#"
            SELECT id, product_id, name, price_cents, created_at
            FROM product_variants
            WHERE product_id = ?1
            ORDER BY name
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::testutil;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = testutil::product("WIDGET-1", 10);
        repo.insert(&product).await.unwrap();

        let by_id = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "WIDGET-1");

        let by_sku = repo.get_by_sku("WIDGET-1").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);

        assert!(repo.exists(&product.id).await.unwrap());
        assert!(!repo.exists("missing").await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&testutil::product("DUP-1", 0)).await.unwrap();
        let err = repo.insert(&testutil::product("DUP-1", 0)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_exists() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = testutil::product("GONE-1", 0);
        repo.insert(&product).await.unwrap();
        repo.soft_delete(&product.id).await.unwrap();

        assert!(!repo.exists(&product.id).await.unwrap());
        // Row is still there for historical references
        assert!(repo.get_by_id(&product.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_variants_share_parent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = testutil::product("SHIRT-1", 0);
        repo.insert(&product).await.unwrap();

        repo.add_variant(&testutil::variant(&product.id, "Small", 1500))
            .await
            .unwrap();
        repo.add_variant(&testutil::variant(&product.id, "Large", 1700))
            .await
            .unwrap();

        let variants = repo.list_variants(&product.id).await.unwrap();
        assert_eq!(variants.len(), 2);
        assert!(variants.iter().all(|v| v.product_id == product.id));
    }

    #[tokio::test]
    async fn test_low_stock_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch) = testutil::seed_stock(&db, 2).await;

        // min_stock_level defaults to 5 in the fixture, quantity is 2
        let rows = db.products().list_low_stock(&branch, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].product_id, product);
        assert_eq!(rows[0].quantity, 2);
    }
}
