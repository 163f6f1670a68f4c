//! Paystack HTTP client

use async_trait::async_trait;
use ledger_core::gateway::{ChargeHandle, ChargeStatus, GatewayError, PaymentGateway};
use ledger_core::money;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

/// Paystack API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

#[derive(Debug, serde::Serialize)]
struct InitializeRequest<'a> {
    email: &'a str,
    /// Minor units (kobo)
    amount: i64,
    reference: &'a str,
}

/// Paystack wraps every response in this envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    reference: String,
    authorization_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: i64,
}

/// Paystack client with a bounded request timeout
pub struct PaystackClient {
    base_url: String,
    secret_key: String,
    client: Client,
}

impl PaystackClient {
    /// Build a client; `timeout_secs` bounds every outbound call
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(PaystackClient {
            base_url: base_url.into(),
            secret_key: secret_key.into(),
            client,
        })
    }

    fn transport(e: reqwest::Error) -> GatewayError {
        error!("paystack request failed: {}", e);
        GatewayError::Transport(e.to_string())
    }

    /// Unwrap the Paystack envelope, surfacing gateway-side refusals
    fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, GatewayError> {
        if !envelope.status {
            return Err(GatewayError::Rejected(envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::InvalidResponse("missing data field".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn open_charge(
        &self,
        payer_email: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<ChargeHandle, GatewayError> {
        let amount_minor = money::to_minor_units(amount)
            .map_err(|e| GatewayError::Rejected(e.to_string()))?;

        let request = InitializeRequest {
            email: payer_email,
            amount: amount_minor,
            reference,
        };

        let url = format!("{}/transaction/initialize", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(Self::transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!(
                "initialize failed with status {status}: {body}"
            )));
        }

        let envelope = response
            .json::<Envelope<InitializeData>>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let data = Self::unwrap_envelope(envelope)?;

        info!(%reference, "paystack charge opened");
        Ok(ChargeHandle {
            reference: data.reference,
            authorization_url: data.authorization_url,
        })
    }

    async fn verify_charge(&self, reference: &str) -> Result<ChargeStatus, GatewayError> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(Self::transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!(
                "verify failed with status {status}: {body}"
            )));
        }

        let envelope = response
            .json::<Envelope<VerifyData>>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let data = Self::unwrap_envelope(envelope)?;

        Ok(match data.status.as_str() {
            "success" => ChargeStatus::Success {
                amount_minor: data.amount,
            },
            "failed" | "abandoned" | "reversed" => ChargeStatus::Failed,
            _ => ChargeStatus::Pending,
        })
    }

    fn verify_signature(&self, payload: &[u8], signature: &str) -> bool {
        crate::signature::verify(payload, signature, self.secret_key.as_bytes())
    }
}
