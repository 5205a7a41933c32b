//! # Stock Receipt Workflow
//!
//! Create → verify/reject lifecycle for incoming goods.
//!
//! ## Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Receipt Verification Workflow                         │
//! │                                                                         │
//! │  Receiving clerk                        Approver                        │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  create(...)                           verify(id, approver)            │
//! │    receipt + items inserted              │                              │
//! │    status = PENDING                      ▼                              │
//! │    NO stock movement                  one transaction:                 │
//! │       │                                 guard PENDING → VERIFIED       │
//! │       │                                 per item: stock IN delta       │
//! │       │                                 per item: latest-cost update   │
//! │       │                                 │                              │
//! │       │                                 ├─ all ok ──► COMMIT           │
//! │       │                                 └─ any fail ─► ROLLBACK        │
//! │       │                                    (status stays PENDING)      │
//! │       ▼                                                                 │
//! │  reject(id, approver, reason)  ← terminal, no ledger effect            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The status guard (`WHERE status = 'pending'`) is what makes concurrent
//! double-verification safe: two approvers racing on the same receipt both
//! pass the initial read, but only one update matches the guard, so the
//! stock IN deltas apply exactly once.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_core::{
    receipt_total_cents, AuditAction, AuditDraft, CoreError, ReceiptItem, ReceiptStatus,
    StockReceipt, StockTransactionType,
    validation::{validate_actor, validate_receipt_lines, validate_reason},
    CONFLICT_RETRY_BUDGET,
};

use crate::error::{DbError, ServiceError, ServiceResult};
use crate::repository::audit::AuditRecorder;
use crate::repository::stock::{apply_delta_tx, StockDelta};

/// Budget for regenerating a colliding receipt number.
const RECEIPT_NUMBER_RETRIES: u32 = 3;

/// One line of a receipt being created.
#[derive(Debug, Clone)]
pub struct NewReceiptItem {
    pub product_id: String,
    /// Units received. Must be positive.
    pub quantity: i64,
    /// Cost per unit in cents. Must be positive.
    pub unit_cost_cents: i64,
}

/// Input to [`ReceiptService::create`].
#[derive(Debug, Clone)]
pub struct CreateReceipt {
    pub supplier_id: String,
    pub branch_id: String,
    pub supplier_invoice_number: Option<String>,
    /// When the goods physically arrived. Defaults to now.
    pub received_at: Option<DateTime<Utc>>,
    /// Receiving clerk entering the receipt.
    pub created_by: String,
    pub items: Vec<NewReceiptItem>,
}

/// A receipt together with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptDetail {
    #[serde(flatten)]
    pub receipt: StockReceipt,
    pub items: Vec<ReceiptItem>,
}

/// The stock receipt workflow service.
#[derive(Debug, Clone)]
pub struct ReceiptService {
    pool: SqlitePool,
    recorder: AuditRecorder,
}

impl ReceiptService {
    /// Creates a new ReceiptService.
    pub fn new(pool: SqlitePool, recorder: AuditRecorder) -> Self {
        ReceiptService { pool, recorder }
    }

    /// Creates a receipt in PENDING. No stock moves here.
    pub async fn create(&self, input: CreateReceipt) -> ServiceResult<ReceiptDetail> {
        validate_actor("created_by", &input.created_by)?;

        let lines: Vec<(i64, i64)> = input
            .items
            .iter()
            .map(|i| (i.quantity, i.unit_cost_cents))
            .collect();
        validate_receipt_lines(&lines)?;

        let supplier: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM suppliers WHERE id = ?1 AND is_active = 1")
                .bind(&input.supplier_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)?;
        if supplier.is_none() {
            return Err(CoreError::not_found("Supplier", &input.supplier_id).into());
        }

        let branch: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM branches WHERE id = ?1 AND is_active = 1")
                .bind(&input.branch_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)?;
        if branch.is_none() {
            return Err(CoreError::not_found("Branch", &input.branch_id).into());
        }

        for item in &input.items {
            let exists: Option<i32> =
                sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1 AND is_active = 1")
                    .bind(&item.product_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(DbError::from)?;
            if exists.is_none() {
                return Err(CoreError::not_found("Product", &item.product_id).into());
            }
        }

        let now = Utc::now();
        let total_cents = receipt_total_cents(&lines);

        // Receipt number collisions are astronomically unlikely but cheap to
        // retry against the UNIQUE index.
        let mut attempt = 0;
        let detail = loop {
            let receipt = StockReceipt {
                id: Uuid::new_v4().to_string(),
                receipt_number: generate_receipt_number(now),
                supplier_id: input.supplier_id.clone(),
                branch_id: input.branch_id.clone(),
                status: ReceiptStatus::Pending,
                total_cents,
                supplier_invoice_number: input.supplier_invoice_number.clone(),
                received_at: input.received_at.unwrap_or(now),
                created_by: input.created_by.clone(),
                created_at: now,
                verified_by: None,
                verified_at: None,
                rejected_by: None,
                rejected_at: None,
                rejected_reason: None,
            };

            match self.insert_receipt(&receipt, &input.items).await {
                Ok(items) => break ReceiptDetail { receipt, items },
                Err(ServiceError::Db(DbError::UniqueViolation { field }))
                    if field.contains("receipt_number") && attempt < RECEIPT_NUMBER_RETRIES =>
                {
                    attempt += 1;
                    debug!(attempt, "Receipt number collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        };

        self.recorder
            .record_best_effort(AuditDraft {
                action: AuditAction::ReceiptCreated,
                entity: "receipt".to_string(),
                entity_id: detail.receipt.id.clone(),
                actor_id: input.created_by.clone(),
                actor_name: None,
                details: serde_json::json!({
                    "receipt_number": detail.receipt.receipt_number,
                    "branch_id": detail.receipt.branch_id,
                    "supplier_id": detail.receipt.supplier_id,
                    "total_cents": detail.receipt.total_cents,
                    "item_count": detail.items.len(),
                }),
                occurred_at: now,
            })
            .await;

        info!(
            receipt_number = %detail.receipt.receipt_number,
            total_cents = detail.receipt.total_cents,
            "Stock receipt created"
        );

        Ok(detail)
    }

    async fn insert_receipt(
        &self,
        receipt: &StockReceipt,
        items: &[NewReceiptItem],
    ) -> ServiceResult<Vec<ReceiptItem>> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        sqlx::query(
            r#"
            INSERT INTO stock_receipts (
                id, receipt_number, supplier_id, branch_id, status,
                total_cents, supplier_invoice_number, received_at,
                created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.receipt_number)
        .bind(&receipt.supplier_id)
        .bind(&receipt.branch_id)
        .bind(receipt.status)
        .bind(receipt.total_cents)
        .bind(&receipt.supplier_invoice_number)
        .bind(receipt.received_at)
        .bind(&receipt.created_by)
        .bind(receipt.created_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = ReceiptItem {
                id: Uuid::new_v4().to_string(),
                receipt_id: receipt.id.clone(),
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_cost_cents: item.unit_cost_cents,
                line_total_cents: item.quantity.saturating_mul(item.unit_cost_cents),
            };

            sqlx::query(
                r#"
                INSERT INTO receipt_items (
                    id, receipt_id, product_id, quantity, unit_cost_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&row.id)
            .bind(&row.receipt_id)
            .bind(&row.product_id)
            .bind(row.quantity)
            .bind(row.unit_cost_cents)
            .bind(row.line_total_cents)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

            inserted.push(row);
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(inserted)
    }

    /// Verifies a PENDING receipt, applying its stock IN deltas atomically.
    ///
    /// ## Guarantees
    /// - PENDING → VERIFIED happens at most once, even under racing approvers
    /// - Either all line deltas apply and the status flips, or nothing does
    /// - Product cost basis is updated to the latest received unit cost
    /// - A refused attempt (wrong state) lands in the audit trail
    pub async fn verify(&self, receipt_id: &str, verified_by: &str) -> ServiceResult<ReceiptDetail> {
        validate_actor("verified_by", verified_by)?;

        let mut attempts: u32 = 0;
        loop {
            match self.try_verify(receipt_id, verified_by).await {
                Err(ServiceError::Db(DbError::Busy)) if attempts < CONFLICT_RETRY_BUDGET => {
                    attempts += 1;
                    debug!(receipt_id, attempts, "Receipt verify hit write contention, retrying");
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempts))).await;
                }
                Err(ServiceError::Db(DbError::Busy)) => {
                    warn!(receipt_id, "Receipt verify exhausted retry budget");
                    return Err(CoreError::ConcurrencyConflict {
                        entity: "receipt".to_string(),
                        id: receipt_id.to_string(),
                    }
                    .into());
                }
                other => return other,
            }
        }
    }

    async fn try_verify(&self, receipt_id: &str, verified_by: &str) -> ServiceResult<ReceiptDetail> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let receipt = fetch_receipt(&mut *tx, receipt_id).await?;
        let Some(receipt) = receipt else {
            return Err(CoreError::not_found("Receipt", receipt_id).into());
        };

        // The guard makes the PENDING check race-free: a concurrent verify
        // that already flipped the status leaves this update matching zero
        // rows, and we refuse instead of double-applying stock.
        let flipped = sqlx::query(
            r#"
            UPDATE stock_receipts
            SET status = 'verified', verified_by = ?1, verified_at = ?2
            WHERE id = ?3 AND status = 'pending'
            "#,
        )
        .bind(verified_by)
        .bind(now)
        .bind(receipt_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if flipped.rows_affected() == 0 {
            drop(tx); // release before the audit write

            let err = CoreError::InvalidState {
                receipt_id: receipt_id.to_string(),
                current: receipt.status,
                attempted: "verify",
            };
            self.record_verify_failure(&receipt, verified_by, &err).await;
            return Err(err.into());
        }

        let items = fetch_items(&mut *tx, receipt_id).await?;

        for item in &items {
            // Same transaction as the status flip: a failing line delta
            // rolls the whole verification back.
            apply_delta_tx(
                &mut *tx,
                &StockDelta {
                    product_id: item.product_id.clone(),
                    branch_id: receipt.branch_id.clone(),
                    quantity: item.quantity,
                    tx_type: StockTransactionType::In,
                    reason: Some(format!("Receipt {}", receipt.receipt_number)),
                    actor_id: verified_by.to_string(),
                },
            )
            .await?;

            // Latest-cost basis: the most recent verified receipt defines
            // the product's current cost.
            sqlx::query("UPDATE products SET cost_cents = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(item.unit_cost_cents)
                .bind(now)
                .bind(&item.product_id)
                .execute(&mut *tx)
                .await
                .map_err(DbError::from)?;
        }

        tx.commit().await.map_err(DbError::from)?;

        self.recorder
            .record_best_effort(AuditDraft {
                action: AuditAction::ReceiptVerified,
                entity: "receipt".to_string(),
                entity_id: receipt.id.clone(),
                actor_id: verified_by.to_string(),
                actor_name: None,
                details: serde_json::json!({
                    "receipt_number": receipt.receipt_number,
                    "branch_id": receipt.branch_id,
                    "total_cents": receipt.total_cents,
                    "item_count": items.len(),
                }),
                occurred_at: now,
            })
            .await;

        info!(
            receipt_number = %receipt.receipt_number,
            items = items.len(),
            "Stock receipt verified"
        );

        let receipt = StockReceipt {
            status: ReceiptStatus::Verified,
            verified_by: Some(verified_by.to_string()),
            verified_at: Some(now),
            ..receipt
        };
        Ok(ReceiptDetail { receipt, items })
    }

    /// Records a refused verification attempt, feeding the repeated-failure
    /// suspicion heuristic.
    async fn record_verify_failure(
        &self,
        receipt: &StockReceipt,
        actor_id: &str,
        err: &CoreError,
    ) {
        let prior = self
            .recorder
            .count_action(AuditAction::ReceiptVerifyFailed, &receipt.id)
            .await
            .unwrap_or(0);

        self.recorder
            .record_best_effort(AuditDraft {
                action: AuditAction::ReceiptVerifyFailed,
                entity: "receipt".to_string(),
                entity_id: receipt.id.clone(),
                actor_id: actor_id.to_string(),
                actor_name: None,
                details: serde_json::json!({
                    "receipt_number": receipt.receipt_number,
                    "error": err.to_string(),
                    "failed_verifications": prior + 1,
                }),
                occurred_at: Utc::now(),
            })
            .await;
    }

    /// Rejects a PENDING receipt. Terminal; no ledger effect.
    pub async fn reject(
        &self,
        receipt_id: &str,
        rejected_by: &str,
        reason: &str,
    ) -> ServiceResult<ReceiptDetail> {
        validate_actor("rejected_by", rejected_by)?;
        validate_reason(Some(reason))?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let receipt = fetch_receipt(&mut *tx, receipt_id).await?;
        let Some(receipt) = receipt else {
            return Err(CoreError::not_found("Receipt", receipt_id).into());
        };

        let flipped = sqlx::query(
            r#"
            UPDATE stock_receipts
            SET status = 'rejected', rejected_reason = ?1, rejected_by = ?2, rejected_at = ?3
            WHERE id = ?4 AND status = 'pending'
            "#,
        )
        .bind(reason)
        .bind(rejected_by)
        .bind(now)
        .bind(receipt_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if flipped.rows_affected() == 0 {
            return Err(CoreError::InvalidState {
                receipt_id: receipt_id.to_string(),
                current: receipt.status,
                attempted: "reject",
            }
            .into());
        }

        let items = fetch_items(&mut *tx, receipt_id).await?;
        tx.commit().await.map_err(DbError::from)?;

        self.recorder
            .record_best_effort(AuditDraft {
                action: AuditAction::ReceiptRejected,
                entity: "receipt".to_string(),
                entity_id: receipt.id.clone(),
                actor_id: rejected_by.to_string(),
                actor_name: None,
                details: serde_json::json!({
                    "receipt_number": receipt.receipt_number,
                    "reason": reason,
                }),
                occurred_at: now,
            })
            .await;

        info!(receipt_number = %receipt.receipt_number, "Stock receipt rejected");

        let receipt = StockReceipt {
            status: ReceiptStatus::Rejected,
            rejected_by: Some(rejected_by.to_string()),
            rejected_at: Some(now),
            rejected_reason: Some(reason.to_string()),
            ..receipt
        };
        Ok(ReceiptDetail { receipt, items })
    }

    /// Gets a receipt with its items.
    pub async fn get(&self, receipt_id: &str) -> ServiceResult<Option<ReceiptDetail>> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;

        let Some(receipt) = fetch_receipt(&mut *conn, receipt_id).await? else {
            return Ok(None);
        };
        let items = fetch_items(&mut *conn, receipt_id).await?;

        Ok(Some(ReceiptDetail { receipt, items }))
    }

    /// Lists a branch's receipts, newest first.
    pub async fn list_by_branch(
        &self,
        branch_id: &str,
        limit: u32,
        offset: u32,
    ) -> ServiceResult<Vec<StockReceipt>> {
        let receipts = sqlx::query_as::<_, StockReceipt>(
            r#"
            SELECT id, receipt_number, supplier_id, branch_id, status,
                   total_cents, supplier_invoice_number, received_at,
                   created_by, created_at, verified_by, verified_at,
                   rejected_by, rejected_at, rejected_reason
            FROM stock_receipts
            WHERE branch_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(branch_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(receipts)
    }
}

/// Generates a receipt number like `GRN-20260829-3f9a1c`.
fn generate_receipt_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("GRN-{}-{}", now.format("%Y%m%d"), &suffix[..6])
}

async fn fetch_receipt(
    conn: &mut sqlx::SqliteConnection,
    receipt_id: &str,
) -> ServiceResult<Option<StockReceipt>> {
    let receipt = sqlx::query_as::<_, StockReceipt>(
        r#"
        SELECT id, receipt_number, supplier_id, branch_id, status,
               total_cents, supplier_invoice_number, received_at,
               created_by, created_at, verified_by, verified_at,
               rejected_by, rejected_at, rejected_reason
        FROM stock_receipts
        WHERE id = ?1
        "#,
    )
    .bind(receipt_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(DbError::from)?;

    Ok(receipt)
}

async fn fetch_items(
    conn: &mut sqlx::SqliteConnection,
    receipt_id: &str,
) -> ServiceResult<Vec<ReceiptItem>> {
    let items = sqlx::query_as::<_, ReceiptItem>(
        r#"
        SELECT id, receipt_id, product_id, quantity, unit_cost_cents, line_total_cents
        FROM receipt_items
        WHERE receipt_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(receipt_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(DbError::from)?;

    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================
