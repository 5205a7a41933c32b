//! Library surface so integration tests can build the router against an
//! in-memory database.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
