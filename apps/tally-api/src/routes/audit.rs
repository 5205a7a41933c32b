//! Audit trail feed.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use tally_core::AuditEntry;
use tally_db::AuditFilter;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Only entries the suspicion policy flagged.
    pub suspicious: Option<bool>,
    /// Substring match against action, entity and actor.
    pub q: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /api/audit-logs
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let entries = state
        .db
        .audit()
        .list(&AuditFilter {
            suspicious_only: query.suspicious.unwrap_or(false),
            text: query.q,
            limit: query.limit.unwrap_or(50).min(200),
            offset: query.offset.unwrap_or(0),
        })
        .await?;

    Ok(Json(entries))
}
