//! In-memory ledger store
//!
//! Test double with the same atomicity contract as the Postgres store:
//! one mutex held across each unit makes every operation serializable, so
//! concurrency tests exercise the real precondition re-check semantics.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::store::{LedgerStore, SettleOutcome};
use crate::types::{Transaction, TransactionKind, TransactionStatus, User, Wallet, WalletNumber};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    wallets: HashMap<Uuid, Wallet>,
    transactions: Vec<Transaction>,
}

/// In-memory ledger store
#[derive(Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<State>,
}

impl InMemoryLedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all wallet balances; conservation-law assertions in tests
    pub async fn total_balance(&self) -> Decimal {
        let state = self.state.lock().await;
        state.wallets.values().map(|w| w.balance).sum()
    }
}

impl State {
    fn transaction_index(&self, reference: &str) -> Option<usize> {
        self.transactions.iter().position(|t| t.reference == reference)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_user_with_wallet(
        &self,
        email: &str,
        wallet_number: &str,
    ) -> Result<(User, Wallet)> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|u| u.email == email) {
            return Err(LedgerError::Duplicate("email".to_string()));
        }
        if state
            .wallets
            .values()
            .any(|w| w.wallet_number.as_str() == wallet_number)
        {
            return Err(LedgerError::Duplicate("wallet number".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: now,
        };
        let wallet = Wallet {
            id: Uuid::new_v4(),
            user_id: user.id,
            wallet_number: WalletNumber::new(wallet_number),
            balance: Decimal::ZERO,
            created_at: now,
        };

        state.users.insert(user.id, user.clone());
        state.wallets.insert(wallet.id, wallet.clone());
        Ok((user, wallet))
    }

    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn wallet_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>> {
        let state = self.state.lock().await;
        Ok(state.wallets.values().find(|w| w.user_id == user_id).cloned())
    }

    async fn wallet_by_number(&self, wallet_number: &str) -> Result<Option<Wallet>> {
        let state = self.state.lock().await;
        Ok(state
            .wallets
            .values()
            .find(|w| w.wallet_number.as_str() == wallet_number)
            .cloned())
    }

    async fn transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transaction_index(reference)
            .map(|i| state.transactions[i].clone()))
    }

    async fn transactions_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<Transaction>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| {
                t.sender_wallet_id == Some(wallet_id) || t.receiver_wallet_id == Some(wallet_id)
            })
            .cloned()
            .collect();

        // Same ordering contract as the Postgres store: newest first, ties
        // broken by time-ordered id.
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn insert_pending_deposit(
        &self,
        receiver_wallet_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<Transaction> {
        let mut state = self.state.lock().await;

        if state.transaction_index(reference).is_some() {
            return Err(LedgerError::Duplicate("reference".to_string()));
        }
        if !state.wallets.contains_key(&receiver_wallet_id) {
            return Err(LedgerError::WalletNotFound(receiver_wallet_id.to_string()));
        }

        let txn = Transaction {
            id: Uuid::now_v7(),
            reference: reference.to_string(),
            kind: TransactionKind::Deposit,
            amount,
            status: TransactionStatus::Pending,
            sender_wallet_id: None,
            receiver_wallet_id: Some(receiver_wallet_id),
            created_at: Utc::now(),
        };
        state.transactions.push(txn.clone());
        Ok(txn)
    }

    async fn apply_transfer(
        &self,
        sender_wallet_id: Uuid,
        receiver_wallet_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<Transaction> {
        if sender_wallet_id == receiver_wallet_id {
            return Err(LedgerError::SelfTransfer);
        }

        let mut state = self.state.lock().await;

        if state.transaction_index(reference).is_some() {
            return Err(LedgerError::Duplicate("reference".to_string()));
        }
        if !state.wallets.contains_key(&receiver_wallet_id) {
            return Err(LedgerError::WalletNotFound(receiver_wallet_id.to_string()));
        }

        let sender = state
            .wallets
            .get(&sender_wallet_id)
            .ok_or_else(|| LedgerError::WalletNotFound(sender_wallet_id.to_string()))?;

        // Authoritative check under the lock, against current state.
        if sender.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: sender.balance,
            });
        }

        if let Some(w) = state.wallets.get_mut(&sender_wallet_id) {
            w.balance -= amount;
        }
        if let Some(w) = state.wallets.get_mut(&receiver_wallet_id) {
            w.balance += amount;
        }

        let txn = Transaction {
            id: Uuid::now_v7(),
            reference: reference.to_string(),
            kind: TransactionKind::Transfer,
            amount,
            status: TransactionStatus::Success,
            sender_wallet_id: Some(sender_wallet_id),
            receiver_wallet_id: Some(receiver_wallet_id),
            created_at: Utc::now(),
        };
        state.transactions.push(txn.clone());
        Ok(txn)
    }

    async fn settle_deposit(
        &self,
        reference: &str,
        credited_amount: Decimal,
    ) -> Result<SettleOutcome> {
        self.settle(reference, TransactionStatus::Success, Some(credited_amount))
            .await
    }

    async fn fail_deposit(&self, reference: &str) -> Result<SettleOutcome> {
        self.settle(reference, TransactionStatus::Failed, None).await
    }
}

impl InMemoryLedgerStore {
    async fn settle(
        &self,
        reference: &str,
        new_status: TransactionStatus,
        credit: Option<Decimal>,
    ) -> Result<SettleOutcome> {
        let mut state = self.state.lock().await;

        let index = state
            .transaction_index(reference)
            .ok_or_else(|| LedgerError::TransactionNotFound(reference.to_string()))?;

        if state.transactions[index].status.is_terminal() {
            return Ok(SettleOutcome::AlreadySettled);
        }

        if state.transactions[index].kind != TransactionKind::Deposit {
            return Err(LedgerError::Validation(
                "only deposits settle asynchronously".to_string(),
            ));
        }

        if let Some(amount) = credit {
            let receiver = state.transactions[index]
                .receiver_wallet_id
                .ok_or_else(|| LedgerError::Internal("deposit without receiver".to_string()))?;
            let wallet = state
                .wallets
                .get_mut(&receiver)
                .ok_or_else(|| LedgerError::WalletNotFound(receiver.to_string()))?;
            wallet.balance += amount;
        }

        state.transactions[index].status = new_status;
        Ok(SettleOutcome::Applied(state.transactions[index].clone()))
    }
}
