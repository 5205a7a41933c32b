//! Route table.
//!
//! One module per resource, assembled into a single router here:
//!
//! ```text
//! POST  /api/stock/adjust                   manual stock adjustment (audited)
//! GET   /api/stock/low/{branch_id}          low-stock view
//! GET   /api/stock/{product_id}/{branch_id} quantity on hand
//! POST  /api/receipts                       create receipt (PENDING)
//! GET   /api/receipts                       list by branch
//! GET   /api/receipts/{id}                  receipt with items
//! PATCH /api/receipts/{id}/verify           PENDING → VERIFIED, stock applied
//! PATCH /api/receipts/{id}/reject           PENDING → REJECTED
//! PATCH /api/customers/{id}/credit          ADD/DEDUCT credit
//! GET   /api/customers/{id}/credit          current balance
//! GET   /api/customers/{id}/credit/entries  credit history
//! GET   /api/transactions/product/{id}      stock history
//! GET   /api/audit-logs                     audit feed
//! GET   /api/health                         liveness + db check
//! ```

pub mod audit;
pub mod customers;
pub mod health;
pub mod receipts;
pub mod stock;
pub mod transactions;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/stock/adjust", post(stock::adjust))
        .route("/api/stock/low/{branch_id}", get(stock::list_low))
        .route(
            "/api/stock/{product_id}/{branch_id}",
            get(stock::get_quantity),
        )
        .route("/api/receipts", post(receipts::create).get(receipts::list))
        .route("/api/receipts/{id}", get(receipts::get))
        .route("/api/receipts/{id}/verify", patch(receipts::verify))
        .route("/api/receipts/{id}/reject", patch(receipts::reject))
        .route(
            "/api/customers/{id}/credit",
            patch(customers::adjust_credit).get(customers::get_credit),
        )
        .route(
            "/api/customers/{id}/credit/entries",
            get(customers::list_entries),
        )
        .route(
            "/api/transactions/product/{id}",
            get(transactions::list_by_product),
        )
        .route("/api/audit-logs", get(audit::list))
        .route("/api/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
