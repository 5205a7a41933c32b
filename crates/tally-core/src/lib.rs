//! # tally-core: Pure Domain Logic for the Tally Stock Ledger
//!
//! This crate is the **heart** of Tally. It contains the domain types,
//! validation rules, and audit policy as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Tally Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Dashboard / POS (external, out of scope)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/tally-api (axum)                        │   │
//! │  │    stock adjust, receipts, credit, transactions, audit feed    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ validation│  │   error   │  │ suspicion │  │   │
//! │  │   │  Product  │  │   rules   │  │   kinds   │  │  policy   │  │   │
//! │  │   │  Receipt  │  │  checks   │  │           │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Ledger Layer)                      │   │
//! │  │       SQLite queries, migrations, ledger/receipt services       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, StockTransaction, StockReceipt, ...)
//! - [`error`] - Domain error kinds
//! - [`validation`] - Ledger input validation
//! - [`suspicion`] - Pluggable audit suspicion heuristic
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are cents (i64), never floats
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod suspicion;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::StockReceipt` instead of
// `use tally_core::types::StockReceipt`

pub use error::{CoreError, CoreResult, ValidationError};
pub use suspicion::{DefaultSuspicionPolicy, SuspicionPolicy};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum absolute quantity a single stock delta may move.
///
/// ## Business Reason
/// Catches fat-finger entries (typing 10000 instead of 100) before they hit
/// the ledger. Genuinely larger movements are split into multiple deltas,
/// each leaving its own transaction row.
pub const MAX_DELTA_QUANTITY: i64 = 100_000;

/// Maximum length of a free-text reason on OUT/ADJUST transactions.
pub const MAX_REASON_LEN: usize = 500;

/// How many times a keyed write is retried on lock contention before the
/// operation surfaces a ConcurrencyConflict to the caller.
pub const CONFLICT_RETRY_BUDGET: u32 = 3;
