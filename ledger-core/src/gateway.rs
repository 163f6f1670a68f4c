//! Payment gateway seam
//!
//! The ledger consumes the external gateway through this narrow interface;
//! transport, authentication, and retry policy belong to the implementing
//! adapter. The ledger performs no retries of its own — reconciler
//! idempotency is what makes gateway-side retries safe to receive.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Payment gateway failures
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("transport failure: {0}")]
    Transport(String),

    /// The gateway refused the request
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The gateway answered with something we could not interpret
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// Checkout handle returned by charge initialization, passed to the caller
/// untouched.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChargeHandle {
    /// Reference echoed by the gateway
    pub reference: String,

    /// Redirect URL where the payer completes the charge
    pub authorization_url: String,
}

/// Result of an explicit charge verification lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeStatus {
    /// Charge completed; amount is gateway-reported, in minor units
    Success {
        /// Settled amount in minor units
        amount_minor: i64,
    },
    /// Charge failed or was abandoned
    Failed,
    /// Charge still open
    Pending,
}

/// Narrow adapter interface over the external payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open an external charge against `reference`. `amount` is in base
    /// units; the adapter owns the minor-unit conversion on the wire.
    async fn open_charge(
        &self,
        payer_email: &str,
        amount: Decimal,
        reference: &str,
    ) -> std::result::Result<ChargeHandle, GatewayError>;

    /// Look up the settled state of a charge by reference.
    async fn verify_charge(
        &self,
        reference: &str,
    ) -> std::result::Result<ChargeStatus, GatewayError>;

    /// Verify a webhook signature over the exact raw payload bytes.
    fn verify_signature(&self, payload: &[u8], signature: &str) -> bool;
}
