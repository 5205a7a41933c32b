//! End-to-end tests against the router with an in-memory database.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use tally_api::routes;
use tally_api::state::AppState;
use tally_core::{Branch, Product, Supplier};
use tally_db::{Database, DbConfig};

async fn test_app() -> (Router, Database) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let app = routes::router(AppState::new(db.clone()));
    (app, db)
}

async fn seed_product(db: &Database) -> String {
    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        sku: format!("SKU-{}", &Uuid::new_v4().simple().to_string()[..8]),
        barcode: None,
        name: "Test product".to_string(),
        description: None,
        cost_cents: 100,
        price_cents: 200,
        min_stock_level: 5,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&product).await.unwrap();
    product.id
}

async fn seed_branch(db: &Database) -> String {
    let branch = Branch {
        id: Uuid::new_v4().to_string(),
        name: "Main".to_string(),
        is_active: true,
        created_at: Utc::now(),
    };
    db.org().insert_branch(&branch).await.unwrap();
    branch.id
}

async fn seed_supplier(db: &Database) -> String {
    let supplier = Supplier {
        id: Uuid::new_v4().to_string(),
        name: "Acme".to_string(),
        is_active: true,
        created_at: Utc::now(),
    };
    db.org().insert_supplier(&supplier).await.unwrap();
    supplier.id
}

async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    let request = match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (app, _db) = test_app().await;

    let (status, body) = request(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_stock_adjust_and_read() {
    let (app, db) = test_app().await;
    let product = seed_product(&db).await;
    let branch = seed_branch(&db).await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/stock/adjust",
        Some(serde_json::json!({
            "productId": product,
            "branchId": branch,
            "quantity": 10,
            "type": "in",
            "actorId": "clerk-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quantity"], 10);

    let (status, body) = request(
        &app,
        Method::GET,
        &format!("/api/stock/{product}/{branch}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quantity"], 10);
}

#[tokio::test]
async fn test_oversell_maps_to_conflict() {
    let (app, db) = test_app().await;
    let product = seed_product(&db).await;
    let branch = seed_branch(&db).await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/stock/adjust",
        Some(serde_json::json!({
            "productId": product,
            "branchId": branch,
            "quantity": -1,
            "type": "out",
            "reason": "sale",
            "actorId": "till-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "insufficient_stock");
}

#[tokio::test]
async fn test_validation_maps_to_422() {
    let (app, db) = test_app().await;
    let product = seed_product(&db).await;
    let branch = seed_branch(&db).await;

    // OUT without a reason
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/stock/adjust",
        Some(serde_json::json!({
            "productId": product,
            "branchId": branch,
            "quantity": -1,
            "type": "out",
            "actorId": "till-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn test_receipt_workflow_over_http() {
    let (app, db) = test_app().await;
    let product = seed_product(&db).await;
    let branch = seed_branch(&db).await;
    let supplier = seed_supplier(&db).await;

    let (status, created) = request(
        &app,
        Method::POST,
        "/api/receipts",
        Some(serde_json::json!({
            "supplierId": supplier,
            "branchId": branch,
            "actorId": "clerk-1",
            "items": [
                { "productId": product, "quantity": 10, "unitCostCents": 250 }
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["total_cents"], 2500);

    let receipt_id = created["id"].as_str().unwrap();

    let (status, verified) = request(
        &app,
        Method::PATCH,
        &format!("/api/receipts/{receipt_id}/verify"),
        Some(serde_json::json!({ "actorId": "approver-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["status"], "verified");

    // Stock landed
    let (_, stock) = request(
        &app,
        Method::GET,
        &format!("/api/stock/{product}/{branch}"),
        None,
    )
    .await;
    assert_eq!(stock["quantity"], 10);

    // Double verification refused
    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/api/receipts/{receipt_id}/verify"),
        Some(serde_json::json!({ "actorId": "approver-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "invalid_state");
}

#[tokio::test]
async fn test_receipt_not_found() {
    let (app, _db) = test_app().await;

    let (status, body) = request(&app, Method::GET, "/api/receipts/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn test_transactions_and_audit_feed() {
    let (app, db) = test_app().await;
    let product = seed_product(&db).await;
    let branch = seed_branch(&db).await;

    for (quantity, tx_type) in [(10i64, "in"), (-3, "out")] {
        let (status, _) = request(
            &app,
            Method::POST,
            "/api/stock/adjust",
            Some(serde_json::json!({
                "productId": product,
                "branchId": branch,
                "quantity": quantity,
                "type": tx_type,
                "reason": "cycle count",
                "actorId": "clerk-1",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, history) = request(
        &app,
        Method::GET,
        &format!("/api/transactions/product/{product}?order=oldest_first"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["quantity"], 10);
    assert_eq!(history[1]["quantity_after"], 7);

    let (status, audit) = request(&app, Method::GET, "/api/audit-logs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!audit.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_credit_adjust_over_http() {
    let (app, db) = test_app().await;

    let now = Utc::now();
    let customer = tally_core::Customer {
        id: Uuid::new_v4().to_string(),
        name: "Test customer".to_string(),
        credit_balance_cents: 0,
        credit_limit_cents: 100_000,
        total_spent_cents: 0,
        total_purchases: 0,
        loyalty_points: 0,
        tier: tally_core::CustomerTier::Bronze,
        created_at: now,
        updated_at: now,
    };
    db.credit().insert_customer(&customer).await.unwrap();

    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/api/customers/{}/credit", customer.id),
        Some(serde_json::json!({
            "amountCents": 500,
            "operation": "add",
            "actorId": "manager-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["creditBalanceCents"], 500);

    let (status, body) = request(
        &app,
        Method::GET,
        &format!("/api/customers/{}/credit", customer.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["creditBalanceCents"], 500);
}
