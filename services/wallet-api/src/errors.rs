use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use ledger_core::LedgerError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InsufficientFunds(String),

    #[error("Cannot transfer to your own wallet")]
    SelfTransfer,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Internal server error")]
    Internal(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => ApiError::Validation(msg),
            LedgerError::UserNotFound(id) => ApiError::NotFound(format!("User not found: {id}")),
            LedgerError::WalletNotFound(_) => ApiError::NotFound("Wallet not found".to_string()),
            LedgerError::TransactionNotFound(_) => {
                ApiError::NotFound("Transaction not found".to_string())
            }
            LedgerError::InsufficientFunds {
                required,
                available,
            } => ApiError::InsufficientFunds(format!(
                "Insufficient funds: required {required}, available {available}"
            )),
            LedgerError::SelfTransfer => ApiError::SelfTransfer,
            LedgerError::InvalidSignature => ApiError::InvalidSignature,
            LedgerError::Duplicate(slot) => ApiError::Conflict(format!("Duplicate {slot}")),
            LedgerError::Gateway(e) => ApiError::Gateway(e.to_string()),
            LedgerError::Database(e) => {
                error!("database error: {}", e);
                ApiError::Internal(e.to_string())
            }
            LedgerError::Internal(msg) => {
                error!("internal error: {}", msg);
                ApiError::Internal(msg)
            }
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InsufficientFunds(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::SelfTransfer => StatusCode::BAD_REQUEST,
            ApiError::InvalidSignature => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    fn error_type(&self) -> &str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::InsufficientFunds(_) => "insufficient_funds",
            ApiError::SelfTransfer => "self_transfer",
            ApiError::InvalidSignature => "invalid_signature",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Conflict(_) => "duplicate_error",
            ApiError::Gateway(_) => "external_service_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}
