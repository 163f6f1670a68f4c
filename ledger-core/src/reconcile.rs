//! Webhook reconciliation
//!
//! Applies gateway notifications to the ledger with exactly-once financial
//! effect. Signature verification runs over the raw payload bytes before
//! any parsing or lookup; the idempotency gate and the credit are one
//! atomic store unit, so duplicate or concurrent deliveries of the same
//! event cannot double-credit a wallet.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{LedgerError, Result};
use crate::gateway::{ChargeStatus, PaymentGateway};
use crate::money;
use crate::store::{LedgerStore, SettleOutcome};
use crate::types::TransactionStatus;

/// Gateway event envelope
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    /// Event type, e.g. `charge.success`
    pub event: String,

    /// Event payload
    pub data: WebhookData,
}

/// Charge fields of a gateway event
#[derive(Debug, Deserialize)]
pub struct WebhookData {
    /// Reference correlating the event with a pending transaction
    pub reference: String,

    /// Gateway-reported amount in minor units
    pub amount: i64,

    /// Inner charge status, when the gateway includes one
    #[serde(default)]
    pub status: Option<String>,
}

/// What a notification did to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// PENDING → SUCCESS, wallet credited by the gateway-reported amount
    Credited {
        /// Settled reference
        reference: String,
    },

    /// PENDING → FAILED, no balance effect
    MarkedFailed {
        /// Failed reference
        reference: String,
    },

    /// Transaction already terminal; acknowledged with no further effect
    AlreadyProcessed,

    /// Unrecognized event type; acknowledged as a no-op
    Ignored,
}

/// Webhook reconciler
pub struct Reconciler<S> {
    store: Arc<S>,
    gateway: Arc<dyn PaymentGateway>,
}

impl<S: LedgerStore> Reconciler<S> {
    /// Create a reconciler over a store and a gateway adapter
    pub fn new(store: Arc<S>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Handle one gateway notification.
    ///
    /// `payload` must be the exact raw request body — a transport that
    /// parses and re-serializes before this call breaks the signature.
    pub async fn handle_notification(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<ReconcileOutcome> {
        if !self.gateway.verify_signature(payload, signature) {
            warn!("webhook rejected: signature mismatch");
            return Err(LedgerError::InvalidSignature);
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(payload)
            .map_err(|e| LedgerError::Validation(format!("malformed webhook payload: {e}")))?;

        match envelope.event.as_str() {
            "charge.success" => {
                // The inner status is authoritative when present; a
                // `charge.success` envelope carrying a failed charge is
                // treated as the failure it reports.
                if envelope.data.status.as_deref().unwrap_or("success") == "success" {
                    self.settle_success(&envelope.data.reference, envelope.data.amount)
                        .await
                } else {
                    self.settle_failure(&envelope.data.reference).await
                }
            }
            "charge.failed" => self.settle_failure(&envelope.data.reference).await,
            other => {
                info!(event = other, "webhook event ignored");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    /// Settle a still-pending deposit by querying the gateway directly.
    ///
    /// Covers charges whose webhook never arrived; routes through the same
    /// idempotent settlement units as notification handling.
    pub async fn verify_deposit(&self, reference: &str) -> Result<ReconcileOutcome> {
        let txn = self
            .store
            .transaction_by_reference(reference)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(reference.to_string()))?;

        if txn.status != TransactionStatus::Pending {
            return Ok(ReconcileOutcome::AlreadyProcessed);
        }

        match self.gateway.verify_charge(reference).await? {
            ChargeStatus::Success { amount_minor } => {
                self.settle_success(reference, amount_minor).await
            }
            ChargeStatus::Failed => self.settle_failure(reference).await,
            ChargeStatus::Pending => Ok(ReconcileOutcome::Ignored),
        }
    }

    async fn settle_success(&self, reference: &str, amount_minor: i64) -> Result<ReconcileOutcome> {
        // Explicit scaling: the credited amount is the gateway-reported
        // figure, never a value trusted from the client.
        let credited = money::from_minor_units(amount_minor);

        match self.store.settle_deposit(reference, credited).await? {
            SettleOutcome::Applied(txn) => {
                info!(%reference, amount = %credited, "deposit credited");
                Ok(ReconcileOutcome::Credited {
                    reference: txn.reference,
                })
            }
            SettleOutcome::AlreadySettled => {
                info!(%reference, "duplicate delivery acknowledged");
                Ok(ReconcileOutcome::AlreadyProcessed)
            }
        }
    }

    async fn settle_failure(&self, reference: &str) -> Result<ReconcileOutcome> {
        match self.store.fail_deposit(reference).await? {
            SettleOutcome::Applied(txn) => {
                info!(%reference, "deposit marked failed");
                Ok(ReconcileOutcome::MarkedFailed {
                    reference: txn.reference,
                })
            }
            SettleOutcome::AlreadySettled => Ok(ReconcileOutcome::AlreadyProcessed),
        }
    }
}
