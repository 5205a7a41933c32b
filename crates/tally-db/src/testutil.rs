//! Shared test fixtures. Compiled only for tests.

use chrono::Utc;
use uuid::Uuid;

use tally_core::{
    Branch, Customer, CustomerTier, Product, ProductVariant, StockTransactionType, Supplier,
};

use crate::pool::Database;
use crate::repository::stock::StockDelta;

/// A product fixture with the given SKU and low-stock threshold.
pub fn product(sku: &str, min_stock_level: i64) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        barcode: None,
        name: format!("Test product {sku}"),
        description: None,
        cost_cents: 100,
        price_cents: 200,
        min_stock_level,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// A variant fixture for the given parent product.
pub fn variant(product_id: &str, name: &str, price_cents: i64) -> ProductVariant {
    ProductVariant {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        name: name.to_string(),
        price_cents,
        created_at: Utc::now(),
    }
}

/// Inserts a product and returns its id.
pub async fn seed_product(db: &Database, sku: &str, min_stock_level: i64) -> String {
    let p = product(sku, min_stock_level);
    db.products().insert(&p).await.unwrap();
    p.id
}

/// Inserts a branch and returns its id.
pub async fn seed_branch(db: &Database, name: &str) -> String {
    let branch = Branch {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        is_active: true,
        created_at: Utc::now(),
    };
    db.org().insert_branch(&branch).await.unwrap();
    branch.id
}

/// Inserts a supplier and returns its id.
pub async fn seed_supplier(db: &Database, name: &str) -> String {
    let supplier = Supplier {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        is_active: true,
        created_at: Utc::now(),
    };
    db.org().insert_supplier(&supplier).await.unwrap();
    supplier.id
}

/// Inserts a customer with the given credit limit and returns its id.
pub async fn seed_customer(db: &Database, credit_limit_cents: i64) -> String {
    let now = Utc::now();
    let customer = Customer {
        id: Uuid::new_v4().to_string(),
        name: "Test customer".to_string(),
        credit_balance_cents: 0,
        credit_limit_cents,
        total_spent_cents: 0,
        total_purchases: 0,
        loyalty_points: 0,
        tier: CustomerTier::default(),
        created_at: now,
        updated_at: now,
    };
    db.credit().insert_customer(&customer).await.unwrap();
    customer.id
}

/// Inserts a product (min_stock_level 5) and a branch, then stocks the pair
/// to `quantity` through the ledger. Returns (product_id, branch_id).
///
/// When `quantity` is positive this applies one IN delta, so the product
/// starts with exactly one transaction row.
pub async fn seed_stock(db: &Database, quantity: i64) -> (String, String) {
    let product_id = seed_product(db, &format!("SKU-{}", &Uuid::new_v4().simple().to_string()[..8]), 5).await;
    let branch_id = seed_branch(db, "Test branch").await;

    if quantity > 0 {
        db.stock()
            .apply_delta(&StockDelta {
                product_id: product_id.clone(),
                branch_id: branch_id.clone(),
                quantity,
                tx_type: StockTransactionType::In,
                reason: None,
                actor_id: "seed".to_string(),
            })
            .await
            .unwrap();
    }

    (product_id, branch_id)
}
