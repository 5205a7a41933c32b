//! # Repository and Service Modules
//!
//! One module per aggregate:
//!
//! - [`product`] - product catalogue lookups the ledger validates against
//! - [`stock`] - the per-(product, branch) stock ledger
//! - [`receipt`] - the stock receipt verification workflow
//! - [`credit`] - the per-customer credit ledger
//! - [`transaction_log`] - read side of the append-only stock history
//! - [`audit`] - audit trail recorder with suspicion flagging
//! - [`org`] - branches and suppliers (reference data only)

pub mod audit;
pub mod credit;
pub mod org;
pub mod product;
pub mod receipt;
pub mod stock;
pub mod transaction_log;
