//! Error types for the ledger

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::GatewayError;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger errors
///
/// Every financial-mutation error aborts its entire atomic unit; there is
/// no partial commit behind any of these variants.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Caller-correctable input error (bad amount, malformed payload)
    #[error("Validation error: {0}")]
    Validation(String),

    /// User does not exist
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    /// Wallet absent (by id or wallet number)
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// No transaction recorded under the given reference
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Sender balance below the requested amount at commit time
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount the operation needed
        required: Decimal,
        /// Committed balance at the time of the authoritative check
        available: Decimal,
    },

    /// Transfer source and destination are the same wallet
    #[error("Cannot transfer to own wallet")]
    SelfTransfer,

    /// Webhook signature did not verify over the raw payload bytes
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// A store uniqueness constraint fired (reference, wallet number, email)
    #[error("Duplicate {0}")]
    Duplicate(String),

    /// External payment gateway failure
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Storage failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Broken internal invariant (corrupt row, impossible state)
    #[error("Internal error: {0}")]
    Internal(String),
}
