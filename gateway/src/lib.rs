//! Paystack gateway adapter
//!
//! Implements the ledger's `PaymentGateway` seam: charge initialization
//! and verification over Paystack's HTTP API, and HMAC-SHA512 webhook
//! signature verification over raw payload bytes.

#![forbid(unsafe_code)]

pub mod client;
pub mod signature;

pub use client::PaystackClient;
