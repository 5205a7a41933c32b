//! # Stock Transaction Log
//!
//! Read side of the append-only stock history. Rows are written exclusively
//! by the ledger's delta path; this module only queries them.
//!
//! ## Ordering
//! `created_at` has second-level granularity under load, so two mutations in
//! the same instant would be ambiguously ordered by timestamp alone. SQLite's
//! `rowid` increases with insertion, so `(created_at, rowid)` gives a total
//! order that matches what actually happened.

use sqlx::SqlitePool;

use tally_core::{ListOrder, StockTransaction};

use crate::error::{DbError, ServiceResult};

/// Reader over the stock transaction history.
#[derive(Debug, Clone)]
pub struct TransactionLog {
    pool: SqlitePool,
}

impl TransactionLog {
    /// Creates a new TransactionLog.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionLog { pool }
    }

    /// Lists one product's mutations across all branches.
    pub async fn list_by_product(
        &self,
        product_id: &str,
        order: ListOrder,
        limit: u32,
        offset: u32,
    ) -> ServiceResult<Vec<StockTransaction>> {
        let sql = match order {
            ListOrder::OldestFirst => {
                r#"
                SELECT id, product_id, branch_id, tx_type, quantity,
                       quantity_after, reason, actor_id, created_at
                FROM stock_transactions
                WHERE product_id = ?1
                ORDER BY created_at ASC, rowid ASC
                LIMIT ?2 OFFSET ?3
                "#
            }
            ListOrder::NewestFirst => {
                r#"
                SELECT id, product_id, branch_id, tx_type, quantity,
                       quantity_after, reason, actor_id, created_at
                FROM stock_transactions
                WHERE product_id = ?1
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?2 OFFSET ?3
                "#
            }
        };

        let transactions = sqlx::query_as::<_, StockTransaction>(sql)
            .bind(product_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(transactions)
    }

    /// Lists mutations for one (product, branch) pair.
    pub async fn list_by_product_branch(
        &self,
        product_id: &str,
        branch_id: &str,
        order: ListOrder,
        limit: u32,
        offset: u32,
    ) -> ServiceResult<Vec<StockTransaction>> {
        let sql = match order {
            ListOrder::OldestFirst => {
                r#"
                SELECT id, product_id, branch_id, tx_type, quantity,
                       quantity_after, reason, actor_id, created_at
                FROM stock_transactions
                WHERE product_id = ?1 AND branch_id = ?2
                ORDER BY created_at ASC, rowid ASC
                LIMIT ?3 OFFSET ?4
                "#
            }
            ListOrder::NewestFirst => {
                r#"
                SELECT id, product_id, branch_id, tx_type, quantity,
                       quantity_after, reason, actor_id, created_at
                FROM stock_transactions
                WHERE product_id = ?1 AND branch_id = ?2
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?3 OFFSET ?4
                "#
            }
        };

        let transactions = sqlx::query_as::<_, StockTransaction>(sql)
            .bind(product_id)
            .bind(branch_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(transactions)
    }

    /// Counts one product's mutations.
    pub async fn count_by_product(&self, product_id: &str) -> ServiceResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM stock_transactions WHERE product_id = ?1")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await
                .map_err(DbError::from)?;

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
    use crate::repository::stock::StockDelta;
    use crate::testutil;
    use tally_core::StockTransactionType;

    async fn apply(db: &Database, product: &str, branch: &str, quantity: i64) {
        let (tx_type, reason) = if quantity > 0 {
            (StockTransactionType::In, None)
        } else {
            (StockTransactionType::Out, Some("sale".to_string()))
        };
        db.stock()
            .apply_delta(&StockDelta {
                product_id: product.to_string(),
                branch_id: branch.to_string(),
                quantity,
                tx_type,
                reason,
                actor_id: "tester".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_history_is_insertion_ordered() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch) = testutil::seed_stock(&db, 0).await;

        // Several mutations within the same second: timestamp alone cannot
        // order them, the rowid tiebreak must.
        for quantity in [10i64, -3, 5, -1] {
            apply(&db, &product, &branch, quantity).await;
        }

        let oldest_first = db
            .transactions()
            .list_by_product(&product, ListOrder::OldestFirst, 100, 0)
            .await
            .unwrap();
        let applied: Vec<i64> = oldest_first.iter().map(|t| t.quantity).collect();
        assert_eq!(applied, vec![10, -3, 5, -1]);

        // quantity_after is a running sum in insertion order
        let mut running = 0;
        for tx in &oldest_first {
            running += tx.quantity;
            assert_eq!(tx.quantity_after, running);
        }

        let newest_first = db
            .transactions()
            .list_by_product(&product, ListOrder::NewestFirst, 100, 0)
            .await
            .unwrap();
        let reversed: Vec<i64> = newest_first.iter().map(|t| t.quantity).collect();
        assert_eq!(reversed, vec![-1, 5, -3, 10]);
    }

    #[tokio::test]
    async fn test_branch_scoped_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch_a) = testutil::seed_stock(&db, 0).await;
        let branch_b = testutil::seed_branch(&db, "Branch B").await;

        apply(&db, &product, &branch_a, 5).await;
        apply(&db, &product, &branch_b, 7).await;
        apply(&db, &product, &branch_a, -2).await;

        let all = db
            .transactions()
            .list_by_product(&product, ListOrder::OldestFirst, 100, 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let only_a = db
            .transactions()
            .list_by_product_branch(&product, &branch_a, ListOrder::OldestFirst, 100, 0)
            .await
            .unwrap();
        assert_eq!(only_a.len(), 2);
        assert!(only_a.iter().all(|t| t.branch_id == branch_a));
    }

    #[tokio::test]
    async fn test_pagination() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch) = testutil::seed_stock(&db, 0).await;

        for _ in 0..5 {
            apply(&db, &product, &branch, 1).await;
        }

        let page = db
            .transactions()
            .list_by_product(&product, ListOrder::OldestFirst, 2, 3)
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(db.transactions().count_by_product(&product).await.unwrap(), 5);
    }
}
