//! # Tally DB
//!
//! SQLite persistence and ledger services for the Tally stock system.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         tally-db                                        │
//! │                                                                         │
//! │  ┌──────────┐    ┌───────────────────────────────────────────┐         │
//! │  │ Database │───►│ services / repositories                   │         │
//! │  │  (pool)  │    │                                           │         │
//! │  └──────────┘    │  StockLedger      ── per-(product,branch) │         │
//! │       │          │  ReceiptService   ── pending→verified     │         │
//! │       │          │  CreditLedger     ── customer balances    │         │
//! │   migrations     │  TransactionLog   ── stock history reads  │         │
//! │                  │  AuditRecorder    ── privileged actions   │         │
//! │                  │  ProductRepository, OrgRepository         │         │
//! │                  └───────────────────────────────────────────┘         │
//! │                                                                         │
//! │  Domain rules and types come from tally-core; this crate owns SQL,     │
//! │  transactions and retry behaviour.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{DbError, DbResult, ServiceError, ServiceResult};
pub use pool::{Database, DbConfig};
pub use repository::audit::{AuditFilter, AuditRecorder};
pub use repository::credit::CreditLedger;
pub use repository::org::OrgRepository;
pub use repository::product::{LowStockRow, ProductRepository};
pub use repository::receipt::{CreateReceipt, NewReceiptItem, ReceiptDetail, ReceiptService};
pub use repository::stock::{StockDelta, StockLedger};
pub use repository::transaction_log::TransactionLog;
