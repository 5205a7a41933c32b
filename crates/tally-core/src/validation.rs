//! # Validation Module
//!
//! Input validation for ledger operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (deserialization, type checks)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - ledger rule validation, BEFORE any mutation    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (NOT NULL, UNIQUE, CHECK quantity >= 0, FKs)        │
//! │                                                                         │
//! │  Defense in depth: each layer catches a different class of errors      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::StockTransactionType;
use crate::{MAX_DELTA_QUANTITY, MAX_REASON_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Stock Delta Validation
// =============================================================================

/// Validates the (quantity, type, reason) triple of a stock delta.
///
/// ## Rules
/// - Quantity must be nonzero and within ±MAX_DELTA_QUANTITY
/// - Sign must agree with the transaction type (IN > 0, OUT < 0)
/// - Reason is required for OUT and ADJUST
///
/// ## Example
/// ```rust
/// use tally_core::types::StockTransactionType;
/// use tally_core::validation::validate_stock_delta;
///
/// assert!(validate_stock_delta(-3, StockTransactionType::Out, Some("damaged")).is_ok());
/// assert!(validate_stock_delta(-3, StockTransactionType::Out, None).is_err());
/// assert!(validate_stock_delta(3, StockTransactionType::Out, Some("x")).is_err());
/// ```
pub fn validate_stock_delta(
    quantity: i64,
    tx_type: StockTransactionType,
    reason: Option<&str>,
) -> ValidationResult<()> {
    if quantity == 0 {
        return Err(ValidationError::MustBeNonZero {
            field: "quantity".to_string(),
        });
    }

    if quantity.abs() > MAX_DELTA_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: -MAX_DELTA_QUANTITY,
            max: MAX_DELTA_QUANTITY,
        });
    }

    if !tx_type.accepts(quantity) {
        return Err(ValidationError::SignMismatch {
            tx_type: format!("{:?}", tx_type).to_lowercase(),
            quantity,
        });
    }

    if tx_type.requires_reason() {
        validate_reason(reason)?;
    }

    Ok(())
}

/// Validates a free-text reason.
///
/// ## Rules
/// - Must be present and non-empty after trimming
/// - Must be at most MAX_REASON_LEN characters
pub fn validate_reason(reason: Option<&str>) -> ValidationResult<()> {
    let reason = reason.map(str::trim).unwrap_or("");

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Receipt Validation
// =============================================================================

/// Validates the raw lines of a receipt being created.
///
/// ## Rules
/// - At least one line
/// - Every quantity positive and within MAX_DELTA_QUANTITY
/// - Every unit cost non-negative
///
/// Product existence is checked against the database by the caller; this
/// function only covers the shape of the input.
pub fn validate_receipt_lines(lines: &[(i64, i64)]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }

    for (quantity, unit_cost_cents) in lines {
        if *quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "item quantity".to_string(),
            });
        }
        if *quantity > MAX_DELTA_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "item quantity".to_string(),
                min: 1,
                max: MAX_DELTA_QUANTITY,
            });
        }
        if *unit_cost_cents < 0 {
            return Err(ValidationError::OutOfRange {
                field: "item cost".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Credit Validation
// =============================================================================

/// Validates a credit adjustment amount.
///
/// ## Rules
/// - Must be positive; direction comes from the operation, not the sign
pub fn validate_credit_amount(amount_cents: i64) -> ValidationResult<()> {
    if amount_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Identifier Validation
// =============================================================================

/// Validates an actor identifier.
///
/// Actor ids come from the auth layer and are opaque here (UUID, username,
/// till id), so the only rule is that one was supplied.
pub fn validate_actor(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
