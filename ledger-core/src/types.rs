//! Core types for the wallet ledger
//!
//! All types are designed for:
//! - Exact arithmetic (`Decimal` for money, never floating point)
//! - Time-ordered row identity (UUIDv7 for transactions)
//! - Memory safety (no unsafe code)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Public, immutable wallet identifier used as a transfer destination.
///
/// Distinct from the internal wallet id: wallet numbers are the only
/// identifier users share with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct WalletNumber(String);

impl WalletNumber {
    /// Create a new wallet number
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account owner
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Internal identifier
    pub id: Uuid,

    /// Payer email, forwarded to the gateway when opening charges
    pub email: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Balance-bearing wallet, owned 1:1 by a user.
///
/// Created atomically with its owning user; mutated only by the store's
/// atomic units; never deleted in normal operation. `balance >= 0` holds
/// at every committed state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    /// Internal identifier
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Human-shareable transfer destination, unique and immutable
    pub wallet_number: WalletNumber,

    /// Current balance in base units
    pub balance: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Kind of monetary movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Funded deposit through the payment gateway
    Deposit,
    /// Peer-to-peer transfer between wallets
    Transfer,
}

impl TransactionKind {
    /// Storage code
    pub fn code(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Transfer => "TRANSFER",
        }
    }

    /// Parse from storage code
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "DEPOSIT" => Some(TransactionKind::Deposit),
            "TRANSFER" => Some(TransactionKind::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Settlement status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Awaiting gateway confirmation (deposits only)
    Pending,
    /// Settled with financial effect applied
    Success,
    /// Settled with no financial effect
    Failed,
}

impl TransactionStatus {
    /// Storage code
    pub fn code(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
        }
    }

    /// Parse from storage code
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TransactionStatus::Pending),
            "SUCCESS" => Some(TransactionStatus::Success),
            "FAILED" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states are immutable
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Success | TransactionStatus::Failed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Immutable record of one monetary movement.
///
/// DEPOSIT rows have a receiver and no sender; TRANSFER rows have both and
/// never self-reference. `amount > 0` always. Rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Row id (UUIDv7, time-ordered — ties in `created_at` break by id)
    pub id: Uuid,

    /// Globally unique external reference correlating a deposit's pending
    /// row with its gateway notification
    pub reference: String,

    /// Movement kind
    pub kind: TransactionKind,

    /// Amount in base units, positive
    pub amount: Decimal,

    /// Settlement status
    pub status: TransactionStatus,

    /// Source wallet (TRANSFER only)
    pub sender_wallet_id: Option<Uuid>,

    /// Destination wallet
    pub receiver_wallet_id: Option<Uuid>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Point-in-time view of a deposit, keyed by reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositStatus {
    /// Deposit reference
    pub reference: String,

    /// Current settlement status
    pub status: TransactionStatus,

    /// Amount requested at initiation, base units
    pub amount: Decimal,
}
