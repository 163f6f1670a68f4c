//! Wallet API service
//!
//! Thin HTTP surface over the ledger: credential resolution at the
//! boundary, raw-body webhook delivery, and error-to-status mapping. All
//! financial semantics live in `ledger-core`.

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
