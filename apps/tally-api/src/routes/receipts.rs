//! Stock receipt workflow endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use tally_core::StockReceipt;
use tally_db::{CreateReceipt, NewReceiptItem, ReceiptDetail};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReceiptRequest {
    pub supplier_id: String,
    pub branch_id: String,
    pub supplier_invoice_number: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub actor_id: String,
    pub items: Vec<CreateReceiptItemRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReceiptItemRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRequest {
    pub actor_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    pub actor_id: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReceiptsQuery {
    pub branch_id: String,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// POST /api/receipts
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateReceiptRequest>,
) -> ApiResult<(StatusCode, Json<ReceiptDetail>)> {
    let detail = state
        .db
        .receipts()
        .create(CreateReceipt {
            supplier_id: req.supplier_id,
            branch_id: req.branch_id,
            supplier_invoice_number: req.supplier_invoice_number,
            received_at: req.received_at,
            created_by: req.actor_id,
            items: req
                .items
                .into_iter()
                .map(|i| NewReceiptItem {
                    product_id: i.product_id,
                    quantity: i.quantity,
                    unit_cost_cents: i.unit_cost_cents,
                })
                .collect(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/receipts/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReceiptDetail>> {
    let detail = state
        .db
        .receipts()
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Receipt not found: {id}")))?;

    Ok(Json(detail))
}

/// GET /api/receipts?branchId=...
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListReceiptsQuery>,
) -> ApiResult<Json<Vec<StockReceipt>>> {
    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);

    let receipts = state
        .db
        .receipts()
        .list_by_branch(&query.branch_id, limit, offset)
        .await?;

    Ok(Json(receipts))
}

/// PATCH /api/receipts/{id}/verify
pub async fn verify(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<ReceiptDetail>> {
    let detail = state.db.receipts().verify(&id, &req.actor_id).await?;
    Ok(Json(detail))
}

/// PATCH /api/receipts/{id}/reject
pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<Json<ReceiptDetail>> {
    let detail = state
        .db
        .receipts()
        .reject(&id, &req.actor_id, &req.reason)
        .await?;
    Ok(Json(detail))
}
