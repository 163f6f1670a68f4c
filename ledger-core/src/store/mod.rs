//! Durable wallet and transaction storage
//!
//! The store owns every atomic unit that mutates balances. Implementations
//! must guarantee that each trait method below is all-or-nothing and that
//! the documented precondition re-checks happen against current committed
//! state inside the unit — not a snapshot taken earlier in the request.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Transaction, User, Wallet};

/// Outcome of an idempotent settlement attempt
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// The transaction transitioned out of PENDING in this call
    Applied(Transaction),

    /// The transaction was already in a terminal state; nothing changed.
    /// Indistinguishable from fresh success to the webhook sender.
    AlreadySettled,
}

/// Ledger storage contract.
///
/// `apply_transfer`, `settle_deposit`, and `fail_deposit` are the only
/// operations that mutate balances; each runs as one serializable unit.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a user and their wallet in one unit. Fails with
    /// `Duplicate("email")` or `Duplicate("wallet number")` when a
    /// uniqueness constraint fires.
    async fn create_user_with_wallet(&self, email: &str, wallet_number: &str)
        -> Result<(User, Wallet)>;

    /// Look up a user by id.
    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Look up a user's wallet.
    async fn wallet_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>>;

    /// Look up a wallet by its public wallet number.
    async fn wallet_by_number(&self, wallet_number: &str) -> Result<Option<Wallet>>;

    /// Look up a transaction by reference.
    async fn transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>>;

    /// All transactions touching a wallet, both directions, newest first
    /// (descending creation time, ties broken by insertion order).
    async fn transactions_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<Transaction>>;

    /// Record deposit intent: insert a PENDING DEPOSIT row in the same unit
    /// as the reference-uniqueness check.
    async fn insert_pending_deposit(
        &self,
        receiver_wallet_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<Transaction>;

    /// Move `amount` between two wallets and record one SUCCESS TRANSFER
    /// row, all-or-nothing. The sender-balance check runs inside the unit
    /// against locked state; `InsufficientFunds` rolls the whole unit back.
    async fn apply_transfer(
        &self,
        sender_wallet_id: Uuid,
        receiver_wallet_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<Transaction>;

    /// Settle a PENDING deposit: transition to SUCCESS and credit the
    /// receiver wallet by `credited_amount`, one unit. The status check and
    /// the write happen under the same row lock, which is what makes the
    /// idempotency gate safe under concurrent duplicate deliveries.
    async fn settle_deposit(&self, reference: &str, credited_amount: Decimal)
        -> Result<SettleOutcome>;

    /// Mark a PENDING deposit FAILED with no balance effect.
    async fn fail_deposit(&self, reference: &str) -> Result<SettleOutcome>;
}
