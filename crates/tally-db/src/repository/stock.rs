//! # Stock Ledger
//!
//! The authoritative per-(product, branch) quantity store.
//!
//! ## Guarded Delta Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: read-modify-write (races under concurrency)                 │
//! │     let q = SELECT quantity ...;                                       │
//! │     UPDATE stock_levels SET quantity = q - 3 WHERE ...                 │
//! │                                                                         │
//! │  ✅ CORRECT: guarded single-statement compare-and-swap                 │
//! │     UPDATE stock_levels                                                │
//! │     SET quantity = quantity + ?delta                                   │
//! │     WHERE product_id = ? AND branch_id = ?                             │
//! │       AND quantity + ?delta >= 0                                       │
//! │     RETURNING quantity                                                 │
//! │                                                                         │
//! │  Why?                                                                   │
//! │  Two simultaneous sales against the last unit: the database applies    │
//! │  the updates serially, the second one fails its guard, and exactly     │
//! │  one sale succeeds. No row returned = insufficient stock.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Contention is scoped to one (product, branch) row - unrelated branches
//! and products never serialize against each other beyond SQLite's write
//! lock, which the busy-timeout plus bounded retry loop absorbs.
//!
//! ## Every Mutation Leaves a Trace
//! The guarded update and the stock_transactions insert commit in the same
//! database transaction: there is no committed quantity change without its
//! matching ledger row, and vice versa.

use std::time::Duration;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_core::{
    AuditAction, AuditDraft, CoreError, StockLevel, StockTransactionType,
    validation::validate_stock_delta, CONFLICT_RETRY_BUDGET,
};

use crate::error::{DbError, ServiceError, ServiceResult};
use crate::repository::audit::AuditRecorder;

/// A requested ledger mutation.
#[derive(Debug, Clone)]
pub struct StockDelta {
    pub product_id: String,
    pub branch_id: String,
    /// Signed quantity: negative for OUT, positive for IN, either for ADJUST.
    pub quantity: i64,
    pub tx_type: StockTransactionType,
    /// Required for OUT/ADJUST.
    pub reason: Option<String>,
    pub actor_id: String,
}

/// The per-(product, branch) stock ledger service.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
    recorder: AuditRecorder,
}

impl StockLedger {
    /// Creates a new StockLedger.
    pub fn new(pool: SqlitePool, recorder: AuditRecorder) -> Self {
        StockLedger { pool, recorder }
    }

    /// Applies a signed delta to one (product, branch) quantity.
    ///
    /// ## Guarantees
    /// - Validation runs before any mutation
    /// - The result never goes negative; a delta that would is rejected with
    ///   `InsufficientStock` and leaves the quantity unchanged
    /// - Exactly one StockTransaction row per successful call, committed
    ///   atomically with the quantity change
    /// - Write-lock contention is retried within a bounded budget, then
    ///   surfaced as `ConcurrencyConflict`
    ///
    /// ## Returns
    /// The new quantity on hand.
    pub async fn apply_delta(&self, delta: &StockDelta) -> ServiceResult<i64> {
        validate_stock_delta(delta.quantity, delta.tx_type, delta.reason.as_deref())?;

        let mut attempts: u32 = 0;
        loop {
            match self.try_apply(delta).await {
                Err(ServiceError::Db(DbError::Busy)) if attempts < CONFLICT_RETRY_BUDGET => {
                    attempts += 1;
                    debug!(
                        product_id = %delta.product_id,
                        branch_id = %delta.branch_id,
                        attempts,
                        "Stock delta hit write contention, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempts))).await;
                }
                Err(ServiceError::Db(DbError::Busy)) => {
                    warn!(
                        product_id = %delta.product_id,
                        branch_id = %delta.branch_id,
                        "Stock delta exhausted retry budget"
                    );
                    return Err(CoreError::ConcurrencyConflict {
                        entity: "stock level".to_string(),
                        id: format!("{}/{}", delta.product_id, delta.branch_id),
                    }
                    .into());
                }
                other => return other,
            }
        }
    }

    /// Applies a manual adjustment and records it in the audit trail.
    ///
    /// This is the entry point for the dashboard's stock-adjust action.
    /// Checkout flows call [`apply_delta`](Self::apply_delta) directly:
    /// sales are high-volume, fully covered by the transaction log, and not
    /// a privileged mutation.
    pub async fn adjust_stock(&self, delta: &StockDelta) -> ServiceResult<i64> {
        let new_quantity = self.apply_delta(delta).await?;

        let action = match delta.tx_type {
            StockTransactionType::Out => AuditAction::StockWrittenOff,
            _ => AuditAction::StockAdjusted,
        };

        // Best-effort: the quantity change is already committed and a failed
        // audit write must never undo it.
        self.recorder
            .record_best_effort(AuditDraft {
                action,
                entity: "product".to_string(),
                entity_id: delta.product_id.clone(),
                actor_id: delta.actor_id.clone(),
                actor_name: None,
                details: serde_json::json!({
                    "branch_id": delta.branch_id,
                    "quantity": delta.quantity,
                    "quantity_after": new_quantity,
                    "reason": delta.reason,
                }),
                occurred_at: Utc::now(),
            })
            .await;

        info!(
            product_id = %delta.product_id,
            branch_id = %delta.branch_id,
            quantity = delta.quantity,
            new_quantity,
            "Stock adjusted"
        );

        Ok(new_quantity)
    }

    /// One attempt: a single transaction holding the guarded update and the
    /// ledger insert.
    async fn try_apply(&self, delta: &StockDelta) -> ServiceResult<i64> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let new_quantity = apply_delta_tx(&mut *tx, delta).await?;

        tx.commit().await.map_err(DbError::from)?;

        Ok(new_quantity)
    }

    /// Reads the quantity on hand. Absent row means zero; never negative.
    pub async fn get_quantity(&self, product_id: &str, branch_id: &str) -> ServiceResult<i64> {
        let quantity: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM stock_levels WHERE product_id = ?1 AND branch_id = ?2",
        )
        .bind(product_id)
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(quantity.unwrap_or(0))
    }

    /// Reads the full stock level row, if the pair has ever been stocked.
    pub async fn get_level(
        &self,
        product_id: &str,
        branch_id: &str,
    ) -> ServiceResult<Option<StockLevel>> {
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT product_id, branch_id, quantity, version, updated_at
            FROM stock_levels
            WHERE product_id = ?1 AND branch_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(level)
    }
}

/// Applies one delta inside an already-open transaction.
///
/// Used by [`StockLedger::apply_delta`] for single mutations and by the
/// receipt workflow to batch all line deltas into its own all-or-nothing
/// transaction. The caller owns commit/rollback.
pub(crate) async fn apply_delta_tx(
    conn: &mut SqliteConnection,
    delta: &StockDelta,
) -> ServiceResult<i64> {
    let now = Utc::now();

    // Referenced entities must exist before we create a stock row for them.
    let product_exists: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1 AND is_active = 1")
            .bind(&delta.product_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DbError::from)?;
    if product_exists.is_none() {
        return Err(CoreError::not_found("Product", &delta.product_id).into());
    }

    let branch_exists: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM branches WHERE id = ?1 AND is_active = 1")
            .bind(&delta.branch_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DbError::from)?;
    if branch_exists.is_none() {
        return Err(CoreError::not_found("Branch", &delta.branch_id).into());
    }

    // Absence of a stock row means zero on hand. Materialize it so the
    // guarded update below has a row to contend on.
    sqlx::query(
        r#"
        INSERT INTO stock_levels (product_id, branch_id, quantity, version, updated_at)
        VALUES (?1, ?2, 0, 0, ?3)
        ON CONFLICT (product_id, branch_id) DO NOTHING
        "#,
    )
    .bind(&delta.product_id)
    .bind(&delta.branch_id)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    // The guard `quantity + delta >= 0` is the non-negativity invariant.
    // No row back means the delta would overdraw the branch.
    let new_quantity: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE stock_levels
        SET quantity = quantity + ?1,
            version = version + 1,
            updated_at = ?2
        WHERE product_id = ?3 AND branch_id = ?4
          AND quantity + ?1 >= 0
        RETURNING quantity
        "#,
    )
    .bind(delta.quantity)
    .bind(now)
    .bind(&delta.product_id)
    .bind(&delta.branch_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(DbError::from)?;

    let new_quantity = match new_quantity {
        Some(q) => q,
        None => {
            let available: Option<i64> = sqlx::query_scalar(
                "SELECT quantity FROM stock_levels WHERE product_id = ?1 AND branch_id = ?2",
            )
            .bind(&delta.product_id)
            .bind(&delta.branch_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DbError::from)?;

            return Err(CoreError::InsufficientStock {
                product_id: delta.product_id.clone(),
                branch_id: delta.branch_id.clone(),
                available: available.unwrap_or(0),
                requested: delta.quantity.abs(),
            }
            .into());
        }
    };

    // Same transaction as the quantity change: the ledger row and the new
    // quantity become visible together or not at all.
    sqlx::query(
        r#"
        INSERT INTO stock_transactions (
            id, product_id, branch_id, tx_type,
            quantity, quantity_after, reason, actor_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&delta.product_id)
    .bind(&delta.branch_id)
    .bind(delta.tx_type)
    .bind(delta.quantity)
    .bind(new_quantity)
    .bind(&delta.reason)
    .bind(&delta.actor_id)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    Ok(new_quantity)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::testutil;
    use tally_core::ListOrder;

    fn delta(
        product_id: &str,
        branch_id: &str,
        quantity: i64,
        tx_type: StockTransactionType,
        reason: Option<&str>,
    ) -> StockDelta {
        StockDelta {
            product_id: product_id.to_string(),
            branch_id: branch_id.to_string(),
            quantity,
            tx_type,
            reason: reason.map(String::from),
            actor_id: "tester".to_string(),
        }
    }

    #[tokio::test]
    async fn test_quantity_equals_sum_of_deltas() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch) = testutil::seed_stock(&db, 0).await;
        let ledger = db.stock();

        let deltas = [10i64, -3, 5, -2, -4];
        for d in deltas {
            let (ty, reason) = if d > 0 {
                (StockTransactionType::In, None)
            } else {
                (StockTransactionType::Out, Some("sale"))
            };
            ledger.apply_delta(&delta(&product, &branch, d, ty, reason)).await.unwrap();
        }

        let expected: i64 = deltas.iter().sum();
        assert_eq!(ledger.get_quantity(&product, &branch).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_rejected_delta_leaves_quantity_unchanged() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch) = testutil::seed_stock(&db, 5).await;
        let ledger = db.stock();

        let err = ledger
            .apply_delta(&delta(&product, &branch, -8, StockTransactionType::Out, Some("sale")))
            .await
            .unwrap_err();

        match err {
            ServiceError::Core(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 5);
                assert_eq!(requested, 8);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(ledger.get_quantity(&product, &branch).await.unwrap(), 5);
        // Failed mutation leaves no ledger row either
        assert_eq!(db.transactions().count_by_product(&product).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_adjust_can_move_both_directions_but_not_below_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch) = testutil::seed_stock(&db, 10).await;
        let ledger = db.stock();

        let up = ledger
            .apply_delta(&delta(&product, &branch, 4, StockTransactionType::Adjust, Some("recount")))
            .await
            .unwrap();
        assert_eq!(up, 14);

        let down = ledger
            .apply_delta(&delta(&product, &branch, -14, StockTransactionType::Adjust, Some("recount")))
            .await
            .unwrap();
        assert_eq!(down, 0);

        let err = ledger
            .apply_delta(&delta(&product, &branch, -1, StockTransactionType::Adjust, Some("recount")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InsufficientStock { .. })
        ));
    }

    #[tokio::test]
    async fn test_validation_precedes_mutation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch) = testutil::seed_stock(&db, 5).await;
        let ledger = db.stock();

        // Missing reason on OUT
        let err = ledger
            .apply_delta(&delta(&product, &branch, -1, StockTransactionType::Out, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::Validation(_))
        ));

        // Sign mismatch on IN
        let err = ledger
            .apply_delta(&delta(&product, &branch, -1, StockTransactionType::In, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::Validation(_))
        ));

        // Nothing committed
        assert_eq!(ledger.get_quantity(&product, &branch).await.unwrap(), 5);
        assert_eq!(db.transactions().count_by_product(&product).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product_or_branch() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch) = testutil::seed_stock(&db, 0).await;
        let ledger = db.stock();

        let err = ledger
            .apply_delta(&delta("nope", &branch, 1, StockTransactionType::In, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::NotFound { .. })));

        let err = ledger
            .apply_delta(&delta(&product, "nope", 1, StockTransactionType::In, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_no_oversell_under_concurrency() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let n: i64 = 8;
        let (product, branch) = testutil::seed_stock(&db, n - 1).await;

        let mut handles = Vec::new();
        for _ in 0..n {
            let ledger = db.stock();
            let d = delta(&product, &branch, -1, StockTransactionType::Out, Some("sale"));
            handles.push(tokio::spawn(async move { ledger.apply_delta(&d).await }));
        }

        let mut successes = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(ServiceError::Core(CoreError::InsufficientStock { .. })) => insufficient += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(successes, n - 1);
        assert!(insufficient >= 1);
        assert_eq!(db.stock().get_quantity(&product, &branch).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_every_mutation_has_exactly_one_transaction_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch) = testutil::seed_stock(&db, 0).await;
        let ledger = db.stock();

        let mut successful = 0i64;
        for d in [5i64, -2, -10, 3, -6, 1] {
            let (ty, reason) = if d > 0 {
                (StockTransactionType::In, None)
            } else {
                (StockTransactionType::Out, Some("sale"))
            };
            if ledger.apply_delta(&delta(&product, &branch, d, ty, reason)).await.is_ok() {
                successful += 1;
            }
        }

        assert_eq!(db.transactions().count_by_product(&product).await.unwrap(), successful);

        let history = db
            .transactions()
            .list_by_product(&product, ListOrder::OldestFirst, 100, 0)
            .await
            .unwrap();
        assert_eq!(history.len() as i64, successful);
        // quantity_after of the last entry matches the live quantity
        let live = ledger.get_quantity(&product, &branch).await.unwrap();
        assert_eq!(history.last().unwrap().quantity_after, live);
    }

    #[tokio::test]
    async fn test_adjust_stock_writes_audit_entry() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch) = testutil::seed_stock(&db, 10).await;

        db.stock()
            .adjust_stock(&delta(&product, &branch, -3, StockTransactionType::Adjust, Some("shrinkage")))
            .await
            .unwrap();

        let entries = db
            .audit()
            .list(&crate::repository::audit::AuditFilter::default())
            .await
            .unwrap();
        assert!(entries
            .iter()
            .any(|e| e.action == "stock.adjusted" && e.entity_id == product));
    }

    #[tokio::test]
    async fn test_get_level_tracks_versions() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch) = testutil::seed_stock(&db, 0).await;
        let ledger = db.stock();

        // Never-stocked pair has no row
        assert!(ledger.get_level(&product, "elsewhere").await.unwrap().is_none());

        ledger
            .apply_delta(&delta(&product, &branch, 5, StockTransactionType::In, None))
            .await
            .unwrap();
        ledger
            .apply_delta(&delta(&product, &branch, -2, StockTransactionType::Out, Some("sale")))
            .await
            .unwrap();

        let level = ledger.get_level(&product, &branch).await.unwrap().unwrap();
        assert_eq!(level.quantity, 3);
        // One version bump per successful mutation
        assert_eq!(level.version, 2);
    }

    #[tokio::test]
    async fn test_branches_do_not_interfere() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, branch_a) = testutil::seed_stock(&db, 5).await;
        let branch_b = testutil::seed_branch(&db, "Branch B").await;
        let ledger = db.stock();

        ledger
            .apply_delta(&delta(&product, &branch_b, 7, StockTransactionType::In, None))
            .await
            .unwrap();

        assert_eq!(ledger.get_quantity(&product, &branch_a).await.unwrap(), 5);
        assert_eq!(ledger.get_quantity(&product, &branch_b).await.unwrap(), 7);
    }
}
