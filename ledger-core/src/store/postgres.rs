//! Postgres-backed ledger store
//!
//! Atomic units are database transactions; precondition re-checks read
//! `FOR UPDATE`-locked rows so concurrent writers serialize on the rows
//! they touch instead of racing past a stale snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::store::{LedgerStore, SettleOutcome};
use crate::types::{Transaction, TransactionKind, TransactionStatus, User, Wallet};

/// Production ledger store over Postgres
pub struct PgLedgerStore {
    pool: PgPool,
}

/// Raw transactions row; kind/status are TEXT in storage
#[derive(FromRow)]
struct TransactionRow {
    id: Uuid,
    reference: String,
    kind: String,
    amount: Decimal,
    status: String,
    sender_wallet_id: Option<Uuid>,
    receiver_wallet_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        let kind = TransactionKind::from_code(&row.kind)
            .ok_or_else(|| LedgerError::Internal(format!("unknown transaction kind {}", row.kind)))?;
        let status = TransactionStatus::from_code(&row.status).ok_or_else(|| {
            LedgerError::Internal(format!("unknown transaction status {}", row.status))
        })?;

        Ok(Transaction {
            id: row.id,
            reference: row.reference,
            kind,
            amount: row.amount,
            status,
            sender_wallet_id: row.sender_wallet_id,
            receiver_wallet_id: row.receiver_wallet_id,
            created_at: row.created_at,
        })
    }
}

const SELECT_TRANSACTION: &str = "SELECT id, reference, kind, amount, status, \
     sender_wallet_id, receiver_wallet_id, created_at FROM transactions";

impl PgLedgerStore {
    /// Connect a pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(PgLedgerStore { pool })
    }

    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        PgLedgerStore { pool }
    }

    /// Shared pool handle
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the ledger schema idempotently
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallets (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL UNIQUE REFERENCES users(id),
                wallet_number TEXT NOT NULL UNIQUE,
                balance NUMERIC(20, 2) NOT NULL DEFAULT 0 CHECK (balance >= 0),
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id UUID PRIMARY KEY,
                reference TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL CHECK (kind IN ('DEPOSIT', 'TRANSFER')),
                amount NUMERIC(20, 2) NOT NULL CHECK (amount > 0),
                status TEXT NOT NULL CHECK (status IN ('PENDING', 'SUCCESS', 'FAILED')),
                sender_wallet_id UUID REFERENCES wallets(id),
                receiver_wallet_id UUID REFERENCES wallets(id),
                created_at TIMESTAMPTZ NOT NULL,
                CHECK (sender_wallet_id IS NOT NULL OR receiver_wallet_id IS NOT NULL),
                CHECK (sender_wallet_id IS DISTINCT FROM receiver_wallet_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_sender
            ON transactions(sender_wallet_id, created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_receiver
            ON transactions(receiver_wallet_id, created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

async fn lock_wallet(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    wallet_id: Uuid,
) -> Result<Option<Wallet>> {
    let wallet = sqlx::query_as::<_, Wallet>(
        "SELECT id, user_id, wallet_number, balance, created_at \
         FROM wallets WHERE id = $1 FOR UPDATE",
    )
    .bind(wallet_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(wallet)
}

/// Map a uniqueness-constraint failure to `Duplicate`, pass others through
fn map_unique(err: sqlx::Error, slot: &str) -> LedgerError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            LedgerError::Duplicate(slot.to_string())
        }
        _ => LedgerError::Database(err),
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_user_with_wallet(
        &self,
        email: &str,
        wallet_number: &str,
    ) -> Result<(User, Wallet)> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: now,
        };
        let wallet = Wallet {
            id: Uuid::new_v4(),
            user_id: user.id,
            wallet_number: crate::types::WalletNumber::new(wallet_number),
            balance: Decimal::ZERO,
            created_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO users (id, email, created_at) VALUES ($1, $2, $3)")
            .bind(user.id)
            .bind(&user.email)
            .bind(user.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique(e, "email"))?;

        sqlx::query(
            "INSERT INTO wallets (id, user_id, wallet_number, balance, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(wallet.id)
        .bind(wallet.user_id)
        .bind(&wallet.wallet_number)
        .bind(wallet.balance)
        .bind(wallet.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, "wallet number"))?;

        tx.commit().await?;
        Ok((user, wallet))
    }

    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("SELECT id, email, created_at FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    async fn wallet_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT id, user_id, wallet_number, balance, created_at \
             FROM wallets WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    async fn wallet_by_number(&self, wallet_number: &str) -> Result<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT id, user_id, wallet_number, balance, created_at \
             FROM wallets WHERE wallet_number = $1",
        )
        .bind(wallet_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    async fn transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn transactions_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} \
             WHERE sender_wallet_id = $1 OR receiver_wallet_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn insert_pending_deposit(
        &self,
        receiver_wallet_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<Transaction> {
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

        sqlx::query(
            "INSERT INTO transactions \
             (id, reference, kind, amount, status, sender_wallet_id, receiver_wallet_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(txn.id)
        .bind(&txn.reference)
        .bind(txn.kind.code())
        .bind(txn.amount)
        .bind(txn.status.code())
        .bind(txn.sender_wallet_id)
        .bind(txn.receiver_wallet_id)
        .bind(txn.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "reference"))?;

        Ok(txn)
    }

    async fn apply_transfer(
        &self,
        sender_wallet_id: Uuid,
        receiver_wallet_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<Transaction> {
        let mut tx = self.pool.begin().await?;

        // Ascending-id lock order so opposite-direction transfers cannot
        // deadlock on each other.
        let (first, second) = if sender_wallet_id <= receiver_wallet_id {
            (sender_wallet_id, receiver_wallet_id)
        } else {
            (receiver_wallet_id, sender_wallet_id)
        };

        let first_wallet = lock_wallet(&mut tx, first)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(first.to_string()))?;
        let second_wallet = lock_wallet(&mut tx, second)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(second.to_string()))?;

        let sender = if first_wallet.id == sender_wallet_id {
            &first_wallet
        } else {
            &second_wallet
        };

        // Authoritative check, against the locked row. Dropping `tx` on the
        // error path rolls the unit back with zero balance change.
        if sender.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: sender.balance,
            });
        }

        sqlx::query("UPDATE wallets SET balance = balance - $1 WHERE id = $2")
            .bind(amount)
            .bind(sender_wallet_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE wallets SET balance = balance + $1 WHERE id = $2")
            .bind(amount)
            .bind(receiver_wallet_id)
            .execute(&mut *tx)
            .await?;

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

        sqlx::query(
            "INSERT INTO transactions \
             (id, reference, kind, amount, status, sender_wallet_id, receiver_wallet_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(txn.id)
        .bind(&txn.reference)
        .bind(txn.kind.code())
        .bind(txn.amount)
        .bind(txn.status.code())
        .bind(txn.sender_wallet_id)
        .bind(txn.receiver_wallet_id)
        .bind(txn.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, "reference"))?;

        tx.commit().await?;
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

impl PgLedgerStore {
    /// Shared settlement unit: row lock, status check under the lock, then
    /// the monotone transition and optional credit.
    async fn settle(
        &self,
        reference: &str,
        new_status: TransactionStatus,
        credit: Option<Decimal>,
    ) -> Result<SettleOutcome> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE reference = $1 FOR UPDATE"
        ))
        .bind(reference)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| LedgerError::TransactionNotFound(reference.to_string()))?;

        let mut txn = Transaction::try_from(row)?;

        // Idempotency gate: terminal states are immutable. This check is
        // only safe because the row lock above serializes concurrent
        // deliveries of the same event.
        if txn.status.is_terminal() {
            return Ok(SettleOutcome::AlreadySettled);
        }

        if txn.kind != TransactionKind::Deposit {
            return Err(LedgerError::Validation(
                "only deposits settle asynchronously".to_string(),
            ));
        }

        sqlx::query("UPDATE transactions SET status = $1 WHERE id = $2")
            .bind(new_status.code())
            .bind(txn.id)
            .execute(&mut *tx)
            .await?;

        if let Some(amount) = credit {
            let receiver = txn
                .receiver_wallet_id
                .ok_or_else(|| LedgerError::Internal("deposit without receiver".to_string()))?;

            sqlx::query("UPDATE wallets SET balance = balance + $1 WHERE id = $2")
                .bind(amount)
                .bind(receiver)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        txn.status = new_status;
        Ok(SettleOutcome::Applied(txn))
    }
}
