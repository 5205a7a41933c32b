//! # Customer Credit Ledger
//!
//! Running per-customer balance, mutated only through ADD/DEDUCT operations.
//!
//! Same discipline as the stock ledger: the balance is updated with a
//! single-statement relative update (never read-modify-write), and every
//! successful adjustment commits a [`CreditEntry`] row in the same
//! transaction.
//!
//! The credit limit is advisory: crossing it logs a warning and flags the
//! audit details, it does not block the operation. Refusing a credit sale
//! at the till is a front-of-house policy decision, not a ledger rule.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use tally_core::{
    validation::{validate_actor, validate_credit_amount},
    AuditAction, AuditDraft, CoreError, CreditEntry, CreditOperation, Customer,
};

use crate::error::{DbError, ServiceResult};
use crate::repository::audit::AuditRecorder;

/// The customer credit ledger service.
#[derive(Debug, Clone)]
pub struct CreditLedger {
    pool: SqlitePool,
    recorder: AuditRecorder,
}

impl CreditLedger {
    /// Creates a new CreditLedger.
    pub fn new(pool: SqlitePool, recorder: AuditRecorder) -> Self {
        CreditLedger { pool, recorder }
    }

    /// Applies one ADD/DEDUCT adjustment to a customer's balance.
    ///
    /// `amount_cents` is the positive magnitude; the operation supplies the
    /// sign. Returns the new balance.
    pub async fn adjust(
        &self,
        customer_id: &str,
        amount_cents: i64,
        operation: CreditOperation,
        actor_id: &str,
    ) -> ServiceResult<i64> {
        validate_actor("actor_id", actor_id)?;
        validate_credit_amount(amount_cents)?;

        let signed = operation.signed(amount_cents);
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // Relative update: concurrent adjustments compose instead of
        // clobbering each other.
        let updated: Option<(i64, i64)> = sqlx::query_as(
            r#"
            UPDATE customers
            SET credit_balance_cents = credit_balance_cents + ?1,
                updated_at = ?2
            WHERE id = ?3
            RETURNING credit_balance_cents, credit_limit_cents
            "#,
        )
        .bind(signed)
        .bind(now)
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::from)?;

        let Some((balance_after, credit_limit)) = updated else {
            return Err(CoreError::not_found("Customer", customer_id).into());
        };

        sqlx::query(
            r#"
            INSERT INTO credit_entries (
                id, customer_id, operation, amount_cents,
                balance_after_cents, actor_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(customer_id)
        .bind(operation)
        .bind(amount_cents)
        .bind(balance_after)
        .bind(actor_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;

        let over_limit = credit_limit > 0 && balance_after > credit_limit;
        if over_limit {
            warn!(
                customer_id,
                balance_after,
                credit_limit,
                "Customer balance exceeds credit limit"
            );
        }

        self.recorder
            .record_best_effort(AuditDraft {
                action: AuditAction::CreditAdjusted,
                entity: "customer".to_string(),
                entity_id: customer_id.to_string(),
                actor_id: actor_id.to_string(),
                actor_name: None,
                details: serde_json::json!({
                    "operation": operation,
                    "amount_cents": amount_cents,
                    "balance_after_cents": balance_after,
                    "over_limit": over_limit,
                }),
                occurred_at: now,
            })
            .await;

        info!(
            customer_id,
            ?operation,
            amount_cents,
            balance_after,
            "Customer credit adjusted"
        );

        Ok(balance_after)
    }

    /// Inserts a customer.
    pub async fn insert_customer(&self, customer: &Customer) -> ServiceResult<Customer> {
        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, credit_balance_cents, credit_limit_cents,
                total_spent_cents, total_purchases, loyalty_points, tier,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(customer.credit_balance_cents)
        .bind(customer.credit_limit_cents)
        .bind(customer.total_spent_cents)
        .bind(customer.total_purchases)
        .bind(customer.loyalty_points)
        .bind(customer.tier)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(customer.clone())
    }

    /// Gets a customer by ID.
    pub async fn get_customer(&self, customer_id: &str) -> ServiceResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, credit_balance_cents, credit_limit_cents,
                   total_spent_cents, total_purchases, loyalty_points, tier,
                   created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(customer)
    }

    /// Gets a customer's current balance.
    pub async fn get_balance(&self, customer_id: &str) -> ServiceResult<i64> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT credit_balance_cents FROM customers WHERE id = ?1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)?;

        balance.ok_or_else(|| CoreError::not_found("Customer", customer_id).into())
    }

    /// Lists a customer's credit entries, newest first.
    pub async fn list_entries(
        &self,
        customer_id: &str,
        limit: u32,
        offset: u32,
    ) -> ServiceResult<Vec<CreditEntry>> {
        let entries = sqlx::query_as::<_, CreditEntry>(
            r#"
            SELECT id, customer_id, operation, amount_cents,
                   balance_after_cents, actor_id, created_at
            FROM credit_entries
            WHERE customer_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
