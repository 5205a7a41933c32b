//! # Domain Types
//!
//! Core domain types for the Tally stock ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────┐      │
//! │  │    Product      │   │ StockTransaction │   │  StockReceipt   │      │
//! │  │  ─────────────  │   │  ──────────────  │   │  ─────────────  │      │
//! │  │  id (UUID)      │   │  id (UUID)       │   │  id (UUID)      │      │
//! │  │  sku (business) │   │  tx_type         │   │  receipt_number │      │
//! │  │  name           │   │  quantity (±)    │   │  status         │      │
//! │  │  min_stock      │   │  quantity_after  │   │  items[]        │      │
//! │  └─────────────────┘   └──────────────────┘   └─────────────────┘      │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────┐      │
//! │  │   StockLevel    │   │    Customer      │   │   AuditEntry    │      │
//! │  │  ─────────────  │   │  ──────────────  │   │  ─────────────  │      │
//! │  │  (product,      │   │  credit_balance  │   │  action         │      │
//! │  │   branch) key   │   │  credit_limit    │   │  is_suspicious  │      │
//! │  │  quantity ≥ 0   │   │  tier            │   │  details (JSON) │      │
//! │  └─────────────────┘   └──────────────────┘   └─────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, receipt_number, etc.) - human-readable, unique
//!
//! ## Stock Is Not Embedded
//! A product does NOT carry a branch→quantity map. Stock lives in a dedicated
//! [`StockLevel`] keyed by (product_id, branch_id) so each pair is an
//! independently contended unit and branches never serialize against each
//! other on the same product.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Product
// =============================================================================

/// A product tracked by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier, immutable once created.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Display name shown on the dashboard and receipts.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Supplier cost in cents (smallest currency unit).
    pub cost_cents: i64,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Threshold below which a branch's stock counts as low.
    pub min_stock_level: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Checks whether a branch quantity counts as low stock for this product.
    #[inline]
    pub fn is_low_stock(&self, quantity: i64) -> bool {
        quantity <= self.min_stock_level
    }
}

// =============================================================================
// Product Variant
// =============================================================================

/// A sellable variant of a product (e.g. size or colour).
///
/// Variants carry their own price but share the parent product's stock pool:
/// a sale of any variant draws down the same (product, branch) quantity.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    /// Variant display name, unique within the parent product.
    pub name: String,
    /// Variant-specific selling price in cents.
    pub price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ProductVariant {
    /// Returns the structured composite key for this variant.
    #[inline]
    pub fn key(&self) -> VariantKey {
        VariantKey {
            product_id: self.product_id.clone(),
            variant_id: self.id.clone(),
        }
    }
}

/// Structured composite key identifying a variant.
///
/// Used as a map key wherever lines are merged per variant. A structured
/// tuple cannot collide the way a `"{product_id}-{name}"` string
/// concatenation can.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VariantKey {
    pub product_id: String,
    pub variant_id: String,
}

// =============================================================================
// Branch
// =============================================================================

/// A physical or logical store location. Stock is tracked per branch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Supplier
// =============================================================================

/// A goods supplier. Referenced by stock receipts; CRUD beyond creation is
/// handled elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Level
// =============================================================================

/// Quantity-on-hand for one (product, branch) pair.
///
/// This is the only mutable stock state in the system. The `quantity` column
/// carries a `CHECK (quantity >= 0)` constraint as a last line of defence;
/// the ledger's guarded update enforces the invariant before the database
/// ever sees a violation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockLevel {
    pub product_id: String,
    pub branch_id: String,
    /// Quantity on hand. Never negative.
    pub quantity: i64,
    /// Bumped on every write. Useful for cache invalidation and diagnostics.
    pub version: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Transaction
// =============================================================================

/// The kind of ledger mutation a stock transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockTransactionType {
    /// Stock arriving (receipt verification, returns). Quantity > 0.
    In,
    /// Stock leaving (sales, write-offs). Quantity < 0.
    Out,
    /// Manual correction in either direction. Quantity ≠ 0.
    Adjust,
}

impl StockTransactionType {
    /// Checks that a signed quantity agrees with the transaction type.
    pub fn accepts(&self, quantity: i64) -> bool {
        match self {
            StockTransactionType::In => quantity > 0,
            StockTransactionType::Out => quantity < 0,
            StockTransactionType::Adjust => quantity != 0,
        }
    }

    /// Whether this type requires a free-text reason.
    ///
    /// IN movements carry their provenance in the receipt reference, so a
    /// reason is only mandatory for OUT and ADJUST.
    #[inline]
    pub fn requires_reason(&self) -> bool {
        !matches!(self, StockTransactionType::In)
    }
}

/// Immutable record of a single ledger mutation.
///
/// Created by every successful `apply_delta`; never updated or deleted.
/// Ordering by `created_at` (with insertion order as tiebreak) defines the
/// per-product audit history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockTransaction {
    pub id: String,
    pub product_id: String,
    pub branch_id: String,
    pub tx_type: StockTransactionType,
    /// Signed quantity applied (negative for OUT).
    pub quantity: i64,
    /// Quantity on hand after this mutation committed.
    pub quantity_after: i64,
    /// Free text. Required for OUT/ADJUST; receipt reference for IN.
    pub reason: Option<String>,
    /// Who performed the mutation.
    pub actor_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Receipt
// =============================================================================

/// Lifecycle state of a stock receipt.
///
/// ```text
///            ┌──────────┐  verify   ┌──────────┐
///            │ PENDING  │ ────────► │ VERIFIED │  (terminal)
///            └──────────┘           └──────────┘
///                 │
///                 │ reject          ┌──────────┐
///                 └───────────────► │ REJECTED │  (terminal)
///                                   └──────────┘
/// ```
///
/// Transitions out of a terminal state are rejected - re-verifying a
/// VERIFIED receipt must fail, not double-apply stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Entered by a receiving clerk; awaiting approval.
    Pending,
    /// Approved; stock IN transactions applied.
    Verified,
    /// Declined; no ledger effect.
    Rejected,
}

impl ReceiptStatus {
    /// Whether the state permits no further transitions.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReceiptStatus::Pending)
    }
}

impl Default for ReceiptStatus {
    fn default() -> Self {
        ReceiptStatus::Pending
    }
}

/// A batch of goods arriving from a supplier, pending verification.
///
/// ## Why a Two-Party Workflow?
/// Creation (receiving clerk) is deliberately separated from verification
/// (approver). Verification is the control point preventing unverified or
/// fraudulent stock inflation - stock only moves when a second party signs
/// off on what was entered.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockReceipt {
    pub id: String,
    /// Unique, system-generated business identifier (e.g. `GRN-20260829-3f9a1c`).
    pub receipt_number: String,
    pub supplier_id: String,
    pub branch_id: String,
    pub status: ReceiptStatus,
    /// Derived: Σ quantity × unit_cost_cents over all items.
    pub total_cents: i64,
    /// The supplier's own invoice reference, if any.
    pub supplier_invoice_number: Option<String>,
    /// When the goods physically arrived.
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
    /// Receiving clerk who entered the receipt.
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// Approver who verified, once verified.
    pub verified_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub verified_at: Option<DateTime<Utc>>,
    /// Approver who rejected, once rejected.
    pub rejected_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub rejected_at: Option<DateTime<Utc>>,
    /// Why the receipt was rejected, once rejected.
    pub rejected_reason: Option<String>,
}

/// A line item on a stock receipt.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReceiptItem {
    pub id: String,
    pub receipt_id: String,
    pub product_id: String,
    /// Units received. Always positive.
    pub quantity: i64,
    /// Cost per unit in cents at time of receipt.
    pub unit_cost_cents: i64,
    /// quantity × unit_cost_cents.
    pub line_total_cents: i64,
}

/// Computes the derived total of a set of receipt lines.
///
/// Saturating on overflow: a receipt large enough to overflow i64 cents is
/// already garbage input and gets caught by validation limits upstream.
pub fn receipt_total_cents(lines: &[(i64, i64)]) -> i64 {
    lines
        .iter()
        .fold(0i64, |acc, (qty, cost)| acc.saturating_add(qty.saturating_mul(*cost)))
}

// =============================================================================
// Customer / Credit
// =============================================================================

/// Direction of a credit ledger adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CreditOperation {
    /// Customer owes more (credit sale, manual debt entry).
    Add,
    /// Customer owes less (payment received).
    Deduct,
}

impl CreditOperation {
    /// Converts a positive amount into the signed balance delta.
    #[inline]
    pub fn signed(&self, amount_cents: i64) -> i64 {
        match self {
            CreditOperation::Add => amount_cents,
            CreditOperation::Deduct => -amount_cents,
        }
    }
}

/// Loyalty tier. Presentation-level classification, not enforced by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CustomerTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Default for CustomerTier {
    fn default() -> Self {
        CustomerTier::Bronze
    }
}

/// A customer with a running credit balance.
///
/// `credit_balance_cents` is signed: positive means the customer owes the
/// business. It is mutated only through the credit ledger's ADD/DEDUCT
/// operations, never written directly.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    /// Signed running total. Positive = customer owes the business.
    pub credit_balance_cents: i64,
    /// Advisory ceiling. Crossing it warns, it does not block.
    pub credit_limit_cents: i64,
    pub total_spent_cents: i64,
    pub total_purchases: i64,
    pub loyalty_points: i64,
    pub tier: CustomerTier,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Whether the balance currently exceeds the advisory limit.
    #[inline]
    pub fn over_limit(&self) -> bool {
        self.credit_limit_cents > 0 && self.credit_balance_cents > self.credit_limit_cents
    }
}

/// Immutable record of a single credit ledger adjustment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditEntry {
    pub id: String,
    pub customer_id: String,
    pub operation: CreditOperation,
    /// Magnitude of the adjustment. Always positive.
    pub amount_cents: i64,
    /// Balance after this entry committed.
    pub balance_after_cents: i64,
    pub actor_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Audit
// =============================================================================

/// Typed catalogue of privileged actions the audit trail records.
///
/// An enum (not free text) so every sensitive operation has a stable,
/// greppable identifier. Serialized as a dotted string (`stock.adjusted`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Manual stock adjustment applied.
    StockAdjusted,
    /// Stock OUT applied outside a sale (write-off, damage).
    StockWrittenOff,
    /// Stock receipt created in PENDING.
    ReceiptCreated,
    /// Stock receipt verified; stock applied.
    ReceiptVerified,
    /// Stock receipt rejected; no ledger effect.
    ReceiptRejected,
    /// Receipt verification attempted and refused.
    ReceiptVerifyFailed,
    /// Customer credit balance adjusted.
    CreditAdjusted,
    /// User account suspended.
    UserSuspended,
}

impl AuditAction {
    /// Stable dotted identifier stored in the audit table.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::StockAdjusted => "stock.adjusted",
            AuditAction::StockWrittenOff => "stock.written_off",
            AuditAction::ReceiptCreated => "receipt.created",
            AuditAction::ReceiptVerified => "receipt.verified",
            AuditAction::ReceiptRejected => "receipt.rejected",
            AuditAction::ReceiptVerifyFailed => "receipt.verify_failed",
            AuditAction::CreditAdjusted => "credit.adjusted",
            AuditAction::UserSuspended => "user.suspended",
        }
    }

    /// Privileged actions get extra scrutiny from the suspicion policy
    /// (e.g. the off-hours check).
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            AuditAction::StockAdjusted
                | AuditAction::ReceiptVerified
                | AuditAction::CreditAdjusted
                | AuditAction::UserSuspended
        )
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the audit recorder, before the suspicion policy has run.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub action: AuditAction,
    /// Entity kind the action touched ("product", "receipt", "customer", ...).
    pub entity: String,
    pub entity_id: String,
    pub actor_id: String,
    pub actor_name: Option<String>,
    /// Arbitrary structured payload (quantities, reasons, before/after values).
    pub details: serde_json::Value,
    /// When the action happened.
    pub occurred_at: DateTime<Utc>,
}

/// An immutable audit trail row. Append-only; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AuditEntry {
    pub id: String,
    /// Dotted action identifier (see [`AuditAction::as_str`]).
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    pub actor_id: String,
    pub actor_name: Option<String>,
    /// Arbitrary structured payload.
    #[ts(type = "unknown")]
    pub details: serde_json::Value,
    /// Set by the suspicion policy at record time.
    pub is_suspicious: bool,
    pub suspicious_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Listing
// =============================================================================

/// Ordering for history listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    OldestFirst,
    NewestFirst,
}

impl Default for ListOrder {
    fn default() -> Self {
        ListOrder::NewestFirst
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
