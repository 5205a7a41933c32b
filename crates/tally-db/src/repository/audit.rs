//! # Audit Recorder
//!
//! Append-only trail of privileged actions, with suspicion flagging.
//!
//! ## Recording Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Audit Write Policy                                 │
//! │                                                                         │
//! │  AuditDraft                                                            │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  SuspicionPolicy::evaluate ── Some(reason)? ─► is_suspicious = true    │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  INSERT INTO audit_logs                                                │
//! │      │                                                                  │
//! │      ├── ok  ─► AuditEntry returned                                    │
//! │      └── err ─► record():             AuditWriteFailure error          │
//! │                 record_best_effort(): one retry, then error log.       │
//! │                 The business mutation is NEVER rolled back for a       │
//! │                 failed audit write - it already committed.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries are never updated or deleted; there is deliberately no method
//! for either.

use std::sync::Arc;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, error, warn};
use uuid::Uuid;

use tally_core::suspicion::SuspicionPolicy;
use tally_core::{AuditAction, AuditDraft, AuditEntry, CoreError};

use crate::error::{DbError, ServiceResult};

/// Filters for listing audit entries.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    /// Only entries the policy flagged.
    pub suspicious_only: bool,
    /// Case-insensitive substring match against action, entity and actor.
    pub text: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for AuditFilter {
    fn default() -> Self {
        AuditFilter {
            suspicious_only: false,
            text: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Writes and reads the audit trail.
#[derive(Clone)]
pub struct AuditRecorder {
    pool: SqlitePool,
    policy: Arc<dyn SuspicionPolicy>,
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

impl AuditRecorder {
    /// Creates a new AuditRecorder with the given suspicion policy.
    pub fn new(pool: SqlitePool, policy: Arc<dyn SuspicionPolicy>) -> Self {
        AuditRecorder { pool, policy }
    }

    /// Records one audit entry, evaluating the suspicion policy first.
    ///
    /// ## Returns
    /// The persisted entry, including the policy's verdict.
    ///
    /// ## Errors
    /// `CoreError::AuditWriteFailure` if the insert fails. Callers on a
    /// committed business path should prefer
    /// [`record_best_effort`](Self::record_best_effort).
    pub async fn record(&self, draft: AuditDraft) -> ServiceResult<AuditEntry> {
        let suspicious_reason = self.policy.evaluate(&draft);
        let is_suspicious = suspicious_reason.is_some();

        if let Some(reason) = &suspicious_reason {
            warn!(
                action = %draft.action,
                entity_id = %draft.entity_id,
                actor_id = %draft.actor_id,
                reason = %reason,
                "Suspicious activity flagged"
            );
        }

        let entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            action: draft.action.as_str().to_string(),
            entity: draft.entity,
            entity_id: draft.entity_id,
            actor_id: draft.actor_id,
            actor_name: draft.actor_name,
            details: draft.details,
            is_suspicious,
            suspicious_reason,
            created_at: draft.occurred_at,
        };

        let insert = sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, action, entity, entity_id, actor_id, actor_name,
                details, is_suspicious, suspicious_reason, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.action)
        .bind(&entry.entity)
        .bind(&entry.entity_id)
        .bind(&entry.actor_id)
        .bind(&entry.actor_name)
        .bind(&entry.details)
        .bind(entry.is_suspicious)
        .bind(&entry.suspicious_reason)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await;

        match insert {
            Ok(_) => {
                debug!(action = %entry.action, entity_id = %entry.entity_id, "Audit entry recorded");
                Ok(entry)
            }
            Err(e) => Err(CoreError::AuditWriteFailure {
                action: entry.action,
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Records an entry for an already-committed mutation.
    ///
    /// One retry, then an error log. Never propagates: the ledger change
    /// stands regardless of whether its trail row landed.
    pub async fn record_best_effort(&self, draft: AuditDraft) {
        if self.record(draft.clone()).await.is_ok() {
            return;
        }

        if let Err(e) = self.record(draft.clone()).await {
            error!(
                action = %draft.action,
                entity_id = %draft.entity_id,
                actor_id = %draft.actor_id,
                error = %e,
                "Audit write failed after retry, entry lost"
            );
        }
    }

    /// Counts trail entries for one action against one entity.
    ///
    /// Feeds the repeated-failure suspicion heuristic: the caller includes
    /// `count + 1` in the next draft's details.
    pub async fn count_action(&self, action: AuditAction, entity_id: &str) -> ServiceResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_logs WHERE action = ?1 AND entity_id = ?2",
        )
        .bind(action.as_str())
        .bind(entity_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(count)
    }

    /// Lists trail entries, newest first.
    pub async fn list(&self, filter: &AuditFilter) -> ServiceResult<Vec<AuditEntry>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT id, action, entity, entity_id, actor_id, actor_name,
                   details, is_suspicious, suspicious_reason, created_at
            FROM audit_logs
            WHERE 1 = 1
            "#,
        );

        if filter.suspicious_only {
            builder.push(" AND is_suspicious = 1");
        }

        if let Some(text) = &filter.text {
            let pattern = format!("%{}%", text.to_lowercase());
            builder.push(" AND (LOWER(action) LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR LOWER(entity) LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR LOWER(entity_id) LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR LOWER(actor_id) LIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC, rowid DESC LIMIT ");
        builder.push_bind(filter.limit);
        builder.push(" OFFSET ");
        builder.push_bind(filter.offset);

        let entries = builder
            .build_query_as::<AuditEntry>()
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{TimeZone, Utc};

    fn draft(action: AuditAction, entity_id: &str, details: serde_json::Value) -> AuditDraft {
        AuditDraft {
            action,
            entity: "product".to_string(),
            entity_id: entity_id.to_string(),
            actor_id: "tester".to_string(),
            actor_name: Some("Test User".to_string()),
            details,
            // Midday, so the off-hours heuristic stays out of these tests
            occurred_at: Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_record_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let recorder = db.audit();

        let entry = recorder
            .record(draft(
                AuditAction::StockAdjusted,
                "p1",
                serde_json::json!({ "quantity": -3 }),
            ))
            .await
            .unwrap();
        assert_eq!(entry.action, "stock.adjusted");
        assert!(!entry.is_suspicious);

        let listed = recorder.list(&AuditFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, entry.id);
        assert_eq!(listed[0].details["quantity"], serde_json::json!(-3));
    }

    #[tokio::test]
    async fn test_large_adjustment_flagged_suspicious() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let recorder = db.audit();

        let entry = recorder
            .record(draft(
                AuditAction::StockAdjusted,
                "p1",
                serde_json::json!({ "quantity": -100000 }),
            ))
            .await
            .unwrap();
        assert!(entry.is_suspicious);
        assert!(entry.suspicious_reason.is_some());

        let flagged = recorder
            .list(&AuditFilter {
                suspicious_only: true,
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(flagged.len(), 1);
    }

    #[tokio::test]
    async fn test_text_filter() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let recorder = db.audit();

        recorder
            .record(draft(AuditAction::StockAdjusted, "p1", serde_json::json!({})))
            .await
            .unwrap();
        recorder
            .record(draft(AuditAction::CreditAdjusted, "c1", serde_json::json!({})))
            .await
            .unwrap();

        let hits = recorder
            .list(&AuditFilter {
                text: Some("credit".to_string()),
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].action, "credit.adjusted");

        // Entity-type matches too; both drafts carry entity "product"
        let hits = recorder
            .list(&AuditFilter {
                text: Some("PRODUCT".to_string()),
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_count_action() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let recorder = db.audit();

        for _ in 0..3 {
            recorder
                .record(draft(
                    AuditAction::ReceiptVerifyFailed,
                    "r1",
                    serde_json::json!({}),
                ))
                .await
                .unwrap();
        }
        recorder
            .record(draft(AuditAction::ReceiptVerifyFailed, "r2", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(
            recorder
                .count_action(AuditAction::ReceiptVerifyFailed, "r1")
                .await
                .unwrap(),
            3
        );
        assert_eq!(
            recorder
                .count_action(AuditAction::ReceiptVerified, "r1")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_pagination() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let recorder = db.audit();

        for i in 0..5 {
            recorder
                .record(draft(
                    AuditAction::StockAdjusted,
                    &format!("p{i}"),
                    serde_json::json!({}),
                ))
                .await
                .unwrap();
        }

        let page = recorder
            .list(&AuditFilter {
                limit: 2,
                offset: 2,
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
    }
}
