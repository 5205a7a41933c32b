//! Customer credit endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use tally_core::{CreditEntry, CreditOperation};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustCreditRequest {
    /// Positive magnitude; the operation supplies the sign.
    pub amount_cents: i64,
    pub operation: CreditOperation,
    pub actor_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalanceResponse {
    pub customer_id: String,
    pub credit_balance_cents: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntriesQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// PATCH /api/customers/{id}/credit
pub async fn adjust_credit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AdjustCreditRequest>,
) -> ApiResult<Json<CreditBalanceResponse>> {
    let balance_cents = state
        .db
        .credit()
        .adjust(&id, req.amount_cents, req.operation, &req.actor_id)
        .await?;

    Ok(Json(CreditBalanceResponse {
        customer_id: id,
        credit_balance_cents: balance_cents,
    }))
}

/// GET /api/customers/{id}/credit
pub async fn get_credit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CreditBalanceResponse>> {
    let balance_cents = state.db.credit().get_balance(&id).await?;

    Ok(Json(CreditBalanceResponse {
        customer_id: id,
        credit_balance_cents: balance_cents,
    }))
}

/// GET /api/customers/{id}/credit/entries
pub async fn list_entries(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListEntriesQuery>,
) -> ApiResult<Json<Vec<CreditEntry>>> {
    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);

    let entries = state.db.credit().list_entries(&id, limit, offset).await?;
    Ok(Json(entries))
}
