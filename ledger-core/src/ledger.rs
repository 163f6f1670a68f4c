//! Ledger operations
//!
//! User-facing orchestration over the store and the gateway adapter:
//! deposit initiation, peer-to-peer transfers, account provisioning, and
//! read queries. All balance mutation is delegated to the store's atomic
//! units; nothing here trusts a balance read from earlier in the request.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::gateway::{ChargeHandle, PaymentGateway};
use crate::money;
use crate::reference;
use crate::store::LedgerStore;
use crate::types::{DepositStatus, Transaction, User, Wallet};

/// Attempts at a fresh 10-digit wallet number before giving up
const WALLET_NUMBER_ATTEMPTS: usize = 5;

/// Wallet ledger facade
pub struct Ledger<S> {
    store: Arc<S>,
    gateway: Arc<dyn PaymentGateway>,
}

impl<S: LedgerStore> Ledger<S> {
    /// Create a ledger over a store and a gateway adapter
    pub fn new(store: Arc<S>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Shared store handle
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Provision a user and their wallet in one unit.
    ///
    /// Wallet numbers live in a small space, so generation retries on the
    /// store's uniqueness constraint a bounded number of times.
    pub async fn register_user(&self, email: &str) -> Result<(User, Wallet)> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(LedgerError::Validation("invalid email".to_string()));
        }

        let mut last_err = LedgerError::Duplicate("wallet number".to_string());
        for _ in 0..WALLET_NUMBER_ATTEMPTS {
            let number = reference::wallet_number();
            match self.store.create_user_with_wallet(email, &number).await {
                Ok((user, wallet)) => {
                    info!(user_id = %user.id, wallet_number = %wallet.wallet_number, "user registered");
                    return Ok((user, wallet));
                }
                Err(LedgerError::Duplicate(slot)) if slot == "wallet number" => {
                    last_err = LedgerError::Duplicate(slot);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    /// Initiate a funded deposit.
    ///
    /// Records the PENDING row before asking the gateway to open the
    /// charge. If the gateway call fails the pending row survives: an
    /// orphaned pending record is preferable to losing deposit intent, and
    /// reconciliation or verification settles it later.
    pub async fn initiate_deposit(&self, user_id: Uuid, amount: Decimal) -> Result<ChargeHandle> {
        validate_amount(amount)?;

        let user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))?;
        let wallet = self
            .store
            .wallet_by_user(user_id)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(user_id.to_string()))?;

        let reference = reference::deposit_reference();
        self.store
            .insert_pending_deposit(wallet.id, amount, &reference)
            .await?;

        let handle = match self.gateway.open_charge(&user.email, amount, &reference).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(%reference, error = %e, "gateway charge initialization failed; pending deposit kept");
                return Err(e.into());
            }
        };

        info!(%reference, %amount, wallet_id = %wallet.id, "deposit initiated");
        Ok(handle)
    }

    /// Transfer between wallets, settling synchronously.
    ///
    /// The balance pre-check here is optimistic; the authoritative check
    /// runs inside the store's atomic unit and is the one that can still
    /// fail under concurrency.
    pub async fn transfer(
        &self,
        user_id: Uuid,
        wallet_number: &str,
        amount: Decimal,
    ) -> Result<Transaction> {
        validate_amount(amount)?;

        let sender = self
            .store
            .wallet_by_user(user_id)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(user_id.to_string()))?;
        let receiver = self
            .store
            .wallet_by_number(wallet_number)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_number.to_string()))?;

        if sender.id == receiver.id {
            return Err(LedgerError::SelfTransfer);
        }

        if sender.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: sender.balance,
            });
        }

        let reference = reference::transfer_reference();
        let txn = self
            .store
            .apply_transfer(sender.id, receiver.id, amount, &reference)
            .await?;

        info!(
            %reference,
            %amount,
            sender = %sender.id,
            receiver = %receiver.id,
            "transfer settled"
        );
        Ok(txn)
    }

    /// Current committed balance
    pub async fn balance(&self, user_id: Uuid) -> Result<Decimal> {
        let wallet = self
            .store
            .wallet_by_user(user_id)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(user_id.to_string()))?;
        Ok(wallet.balance)
    }

    /// Transaction history, both directions, newest first
    pub async fn transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        let wallet = self
            .store
            .wallet_by_user(user_id)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(user_id.to_string()))?;
        self.store.transactions_for_wallet(wallet.id).await
    }

    /// Deposit state by reference
    pub async fn deposit_status(&self, reference: &str) -> Result<DepositStatus> {
        let txn = self
            .store
            .transaction_by_reference(reference)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(reference.to_string()))?;

        Ok(DepositStatus {
            reference: txn.reference,
            status: txn.status,
            amount: txn.amount,
        })
    }
}

/// Amounts must be positive and representable in gateway minor units.
fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(
            "amount must be greater than 0".to_string(),
        ));
    }
    money::to_minor_units(amount)?;
    Ok(())
}
