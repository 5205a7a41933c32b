//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── ServiceError     - CoreError | DbError at the service seam        │
//! │                                                                         │
//! │  tally-api errors (in app)                                             │
//! │  └── ApiError         - What the dashboard sees (serialized)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → ApiError → UI      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product, available, requested)
//! 3. Errors are enum variants, never String
//! 4. Each variant maps to one of the interface error kinds

use thiserror::Error;

use crate::types::ReceiptStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule violations and domain logic failures.
///
/// These map one-to-one onto the error kinds the HTTP boundary reports.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A delta would take quantity-on-hand below zero.
    ///
    /// ## When This Occurs
    /// - Selling more than a branch has on hand
    /// - An adjustment framed as a delta that overshoots zero
    ///
    /// The rejected delta leaves the stored quantity unchanged.
    #[error(
        "Insufficient stock for product {product_id} at branch {branch_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        branch_id: String,
        available: i64,
        requested: i64,
    },

    /// A receipt transition was attempted from a terminal state.
    ///
    /// ## When This Occurs
    /// - Verifying an already VERIFIED receipt (double-verification)
    /// - Verifying or rejecting a REJECTED receipt
    #[error("Receipt {receipt_id} is {current:?}, cannot {attempted}")]
    InvalidState {
        receipt_id: String,
        current: ReceiptStatus,
        attempted: &'static str,
    },

    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Per-key lock/version contention exceeded the retry budget.
    ///
    /// Transient: the caller is expected to retry or report failure,
    /// never to assume eventual success.
    #[error("Concurrent update conflict on {entity} {id}, retry the operation")]
    ConcurrencyConflict { entity: String, id: String },

    /// Audit trail write failed.
    ///
    /// Non-fatal by policy: a committed ledger mutation is never rolled back
    /// because its audit row could not be written. Escalated via logs.
    #[error("Audit write failed for {action}: {message}")]
    AuditWriteFailure { action: String, message: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These are caught and reported before any mutation runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be nonzero.
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// A signed quantity disagrees with its transaction type.
    #[error("quantity {quantity} does not match transaction type {tx_type}")]
    SignMismatch { tx_type: String, quantity: i64 },

    /// A collection that must not be empty is empty.
    #[error("{field} must contain at least one entry")]
    Empty { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_id: "p1".to_string(),
            branch_id: "b1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product p1 at branch b1: available 3, requested 5"
        );
    }

    #[test]
    fn test_invalid_state_message() {
        let err = CoreError::InvalidState {
            receipt_id: "r1".to_string(),
            current: ReceiptStatus::Verified,
            attempted: "verify",
        };
        assert_eq!(err.to_string(), "Receipt r1 is Verified, cannot verify");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "reason".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
