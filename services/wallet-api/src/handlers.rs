use actix_web::{web, HttpRequest, HttpResponse};
use ledger_core::{
    Ledger, PgLedgerStore, Reconciler, ReconcileOutcome, Transaction,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{CredentialResolver, Permission};
use crate::errors::ApiError;

pub struct AppState {
    pub ledger: Ledger<PgLedgerStore>,
    pub reconciler: Reconciler<PgLedgerStore>,
    pub resolver: CredentialResolver,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub wallet_number: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    pub permissions: Vec<Permission>,
    pub expiry: String,
}

#[derive(Debug, Serialize)]
struct TransactionView {
    #[serde(rename = "type")]
    kind: String,
    amount: Decimal,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(txn: Transaction) -> Self {
        TransactionView {
            kind: txn.kind.code().to_lowercase(),
            amount: txn.amount,
            status: txn.status.code().to_lowercase(),
            created_at: txn.created_at,
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "wallet-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Provision a user and their wallet
pub async fn register(
    state: web::Data<AppState>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let (user, wallet) = state.ledger.register_user(&request.email).await?;

    Ok(HttpResponse::Created().json(json!({
        "user_id": user.id,
        "email": user.email,
        "wallet_number": wallet.wallet_number
    })))
}

/// Mint an API key (JWT-holders only)
pub async fn create_api_key(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<CreateKeyRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = state.resolver.resolve_bearer(&req)?;
    let created = state
        .resolver
        .create_api_key(actor.user_id, &request.name, &request.permissions, &request.expiry)
        .await?;

    Ok(HttpResponse::Created().json(created))
}

/// Initiate a deposit through the payment gateway
pub async fn deposit(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<DepositRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = state.resolver.resolve(&req, Permission::Deposit).await?;
    let handle = state
        .ledger
        .initiate_deposit(actor.user_id, request.amount)
        .await?;

    Ok(HttpResponse::Ok().json(handle))
}

/// Transfer funds to another wallet
pub async fn transfer(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<TransferRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = state.resolver.resolve(&req, Permission::Transfer).await?;
    state
        .ledger
        .transfer(actor.user_id, &request.wallet_number, request.amount)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Transfer completed"
    })))
}

/// Get wallet balance
pub async fn balance(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let actor = state.resolver.resolve(&req, Permission::Read).await?;
    let balance = state.ledger.balance(actor.user_id).await?;

    Ok(HttpResponse::Ok().json(json!({ "balance": balance })))
}

/// Get wallet transaction history, newest first
pub async fn transactions(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let actor = state.resolver.resolve(&req, Permission::Read).await?;
    let rows = state.ledger.transactions(actor.user_id).await?;
    let views: Vec<TransactionView> = rows.into_iter().map(TransactionView::from).collect();

    Ok(HttpResponse::Ok().json(views))
}

/// Get deposit status by reference
pub async fn deposit_status(
    state: web::Data<AppState>,
    reference: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let status = state.ledger.deposit_status(&reference).await?;

    Ok(HttpResponse::Ok().json(json!({
        "reference": status.reference,
        "status": status.status.code().to_lowercase(),
        "amount": status.amount
    })))
}

/// Settle a pending deposit by querying the gateway directly
pub async fn verify_deposit(
    state: web::Data<AppState>,
    req: HttpRequest,
    reference: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.resolver.resolve(&req, Permission::Read).await?;
    let outcome = state.reconciler.verify_deposit(&reference).await?;

    Ok(HttpResponse::Ok().json(json!({
        "reference": reference.as_str(),
        "outcome": outcome_label(&outcome)
    })))
}

/// Handle Paystack webhook events.
///
/// The body stays raw `Bytes` until the signature over it has verified;
/// parsing before verification would break the signature contract.
pub async fn paystack_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let signature = req
        .headers()
        .get("x-paystack-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    state.reconciler.handle_notification(&body, signature).await?;

    // Every accepted outcome acknowledges identically; duplicates are
    // indistinguishable from fresh success to the sender.
    Ok(HttpResponse::Ok().json(json!({ "status": true })))
}

fn outcome_label(outcome: &ReconcileOutcome) -> &'static str {
    match outcome {
        ReconcileOutcome::Credited { .. } => "success",
        ReconcileOutcome::MarkedFailed { .. } => "failed",
        ReconcileOutcome::AlreadyProcessed => "already_processed",
        ReconcileOutcome::Ignored => "pending",
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wallet")
            .route("/deposit", web::post().to(deposit))
            .route("/transfer", web::post().to(transfer))
            .route("/balance", web::get().to(balance))
            .route("/transactions", web::get().to(transactions))
            .route("/deposit/{reference}/status", web::get().to(deposit_status))
            .route("/deposit/{reference}/verify", web::post().to(verify_deposit))
            .route("/paystack/webhook", web::post().to(paystack_webhook)),
    )
    .route("/users", web::post().to(register))
    .route("/keys", web::post().to(create_api_key))
    .route("/health", web::get().to(health_check));
}
