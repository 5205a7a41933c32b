//! Stock ledger endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use tally_core::StockTransactionType;
use tally_db::{LowStockRow, StockDelta};

use crate::error::ApiResult;
use crate::state::AppState;

/// Request body for `POST /api/stock/adjust`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub product_id: String,
    pub branch_id: String,
    /// Signed delta: negative for OUT, positive for IN, either for ADJUST.
    pub quantity: i64,
    #[serde(rename = "type")]
    pub tx_type: StockTransactionType,
    pub reason: Option<String>,
    pub actor_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockQuantityResponse {
    pub product_id: String,
    pub branch_id: String,
    pub quantity: i64,
}

/// POST /api/stock/adjust
///
/// Applies a manual stock adjustment through the audited path.
pub async fn adjust(
    State(state): State<AppState>,
    Json(req): Json<AdjustStockRequest>,
) -> ApiResult<Json<StockQuantityResponse>> {
    let quantity = state
        .db
        .stock()
        .adjust_stock(&StockDelta {
            product_id: req.product_id.clone(),
            branch_id: req.branch_id.clone(),
            quantity: req.quantity,
            tx_type: req.tx_type,
            reason: req.reason,
            actor_id: req.actor_id,
        })
        .await?;

    Ok(Json(StockQuantityResponse {
        product_id: req.product_id,
        branch_id: req.branch_id,
        quantity,
    }))
}

/// GET /api/stock/{product_id}/{branch_id}
pub async fn get_quantity(
    State(state): State<AppState>,
    Path((product_id, branch_id)): Path<(String, String)>,
) -> ApiResult<Json<StockQuantityResponse>> {
    let quantity = state.db.stock().get_quantity(&product_id, &branch_id).await?;

    Ok(Json(StockQuantityResponse {
        product_id,
        branch_id,
        quantity,
    }))
}

/// GET /api/stock/low/{branch_id}
///
/// The dashboard's low-stock view: products at or below their threshold.
pub async fn list_low(
    State(state): State<AppState>,
    Path(branch_id): Path<String>,
) -> ApiResult<Json<Vec<LowStockRow>>> {
    let rows = state.db.products().list_low_stock(&branch_id, 100).await?;
    Ok(Json(rows))
}
