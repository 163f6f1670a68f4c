//! VaultPay Ledger Core
//!
//! Transactional wallet ledger and reconciliation engine.
//!
//! # Architecture
//!
//! - **Single atomic units**: every balance mutation re-validates its
//!   preconditions inside one isolated store transaction
//! - **Exactly-once reconciliation**: gateway webhooks settle deposits
//!   idempotently regardless of delivery count or order
//! - **Exact arithmetic**: all monetary values are `Decimal`, with one
//!   explicit scaling function between gateway minor units and base units
//!
//! # Invariants
//!
//! - Wallet balances are non-negative at every committed state
//! - Transfers conserve the sum of balances; deposits grow it by exactly
//!   the credited amount
//! - Transaction status transitions are monotone: PENDING → SUCCESS|FAILED,
//!   terminal states immutable

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod gateway;
pub mod ledger;
pub mod money;
pub mod reconcile;
pub mod reference;
pub mod store;
pub mod types;

// Re-exports
pub use error::{LedgerError, Result};
pub use gateway::{ChargeHandle, ChargeStatus, GatewayError, PaymentGateway};
pub use ledger::Ledger;
pub use reconcile::{Reconciler, ReconcileOutcome};
pub use store::{memory::InMemoryLedgerStore, postgres::PgLedgerStore, LedgerStore, SettleOutcome};
pub use types::{
    DepositStatus, Transaction, TransactionKind, TransactionStatus, User, Wallet, WalletNumber,
};
