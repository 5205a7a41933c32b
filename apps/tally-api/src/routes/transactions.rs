//! Stock transaction history endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use tally_core::{ListOrder, StockTransaction};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// `oldest_first` or `newest_first` (default).
    pub order: Option<ListOrder>,
    pub branch_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /api/transactions/product/{id}
pub async fn list_by_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<StockTransaction>>> {
    let order = query.order.unwrap_or_default();
    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);

    let transactions = match &query.branch_id {
        Some(branch_id) => {
            state
                .db
                .transactions()
                .list_by_product_branch(&product_id, branch_id, order, limit, offset)
                .await?
        }
        None => {
            state
                .db
                .transactions()
                .list_by_product(&product_id, order, limit, offset)
                .await?
        }
    };

    Ok(Json(transactions))
}
