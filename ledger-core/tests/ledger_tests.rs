//! Integration tests for the ledger and reconciler
//!
//! Run against the in-memory store, which carries the same atomic-unit
//! contract as the Postgres store, with a mock gateway standing in for
//! Paystack.

use async_trait::async_trait;
use ledger_core::{
    ChargeHandle, ChargeStatus, GatewayError, InMemoryLedgerStore, Ledger, LedgerError,
    LedgerStore, PaymentGateway, Reconciler, ReconcileOutcome, TransactionKind, TransactionStatus,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const VALID_SIGNATURE: &str = "valid-signature";

/// Gateway double: signature checks compare against a fixed token (real
/// HMAC verification is covered by the adapter's own tests), charges echo
/// the reference, and verification answers can be scripted per test.
struct MockGateway {
    fail_open: bool,
    verify_answer: Mutex<ChargeStatus>,
}

impl MockGateway {
    fn new() -> Self {
        Self {
            fail_open: false,
            verify_answer: Mutex::new(ChargeStatus::Pending),
        }
    }

    fn failing() -> Self {
        Self {
            fail_open: true,
            verify_answer: Mutex::new(ChargeStatus::Pending),
        }
    }

    async fn script_verify(&self, answer: ChargeStatus) {
        *self.verify_answer.lock().await = answer;
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn open_charge(
        &self,
        _payer_email: &str,
        _amount: Decimal,
        reference: &str,
    ) -> Result<ChargeHandle, GatewayError> {
        if self.fail_open {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        Ok(ChargeHandle {
            reference: reference.to_string(),
            authorization_url: format!("https://checkout.example.com/{reference}"),
        })
    }

    async fn verify_charge(&self, _reference: &str) -> Result<ChargeStatus, GatewayError> {
        Ok(self.verify_answer.lock().await.clone())
    }

    fn verify_signature(&self, _payload: &[u8], signature: &str) -> bool {
        signature == VALID_SIGNATURE
    }
}

struct Harness {
    store: Arc<InMemoryLedgerStore>,
    gateway: Arc<MockGateway>,
    ledger: Ledger<InMemoryLedgerStore>,
    reconciler: Reconciler<InMemoryLedgerStore>,
}

fn harness_with(gateway: MockGateway) -> Harness {
    let store = Arc::new(InMemoryLedgerStore::new());
    let gateway = Arc::new(gateway);
    let dyn_gateway: Arc<dyn PaymentGateway> = gateway.clone();
    Harness {
        ledger: Ledger::new(store.clone(), dyn_gateway.clone()),
        reconciler: Reconciler::new(store.clone(), dyn_gateway),
        store,
        gateway,
    }
}

fn harness() -> Harness {
    harness_with(MockGateway::new())
}

impl Harness {
    async fn user(&self, email: &str) -> Uuid {
        let (user, _) = self.ledger.register_user(email).await.unwrap();
        user.id
    }

    /// Fund a wallet through the full deposit round trip
    async fn fund(&self, user_id: Uuid, amount: Decimal) {
        let handle = self.ledger.initiate_deposit(user_id, amount).await.unwrap();
        let outcome = self
            .reconciler
            .handle_notification(&success_event(&handle.reference, amount), VALID_SIGNATURE)
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Credited { .. }));
    }

    async fn wallet_number(&self, user_id: Uuid) -> String {
        let wallet = self.store.wallet_by_user(user_id).await.unwrap().unwrap();
        wallet.wallet_number.as_str().to_string()
    }
}

fn minor_units(amount: Decimal) -> i64 {
    ledger_core::money::to_minor_units(amount).unwrap()
}

fn success_event(reference: &str, amount: Decimal) -> Vec<u8> {
    serde_json::json!({
        "event": "charge.success",
        "data": {
            "reference": reference,
            "amount": minor_units(amount),
            "status": "success"
        }
    })
    .to_string()
    .into_bytes()
}

fn failed_event(reference: &str, amount: Decimal) -> Vec<u8> {
    serde_json::json!({
        "event": "charge.failed",
        "data": {
            "reference": reference,
            "amount": minor_units(amount)
        }
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn deposit_round_trip_credits_scaled_amount() {
    let h = harness();
    let alice = h.user("alice@example.com").await;

    let handle = h.ledger.initiate_deposit(alice, dec!(1000)).await.unwrap();
    assert!(handle.authorization_url.contains(&handle.reference));

    let pending = h.ledger.deposit_status(&handle.reference).await.unwrap();
    assert_eq!(pending.status, TransactionStatus::Pending);
    assert_eq!(h.ledger.balance(alice).await.unwrap(), Decimal::ZERO);

    // Gateway reports 100000 kobo; the ledger credits 1000 base units.
    let outcome = h
        .reconciler
        .handle_notification(&success_event(&handle.reference, dec!(1000)), VALID_SIGNATURE)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Credited { .. }));

    assert_eq!(h.ledger.balance(alice).await.unwrap(), dec!(1000));
    let settled = h.ledger.deposit_status(&handle.reference).await.unwrap();
    assert_eq!(settled.status, TransactionStatus::Success);
}

#[tokio::test]
async fn duplicate_webhook_credits_exactly_once() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    let handle = h.ledger.initiate_deposit(alice, dec!(1000)).await.unwrap();
    let event = success_event(&handle.reference, dec!(1000));

    let first = h
        .reconciler
        .handle_notification(&event, VALID_SIGNATURE)
        .await
        .unwrap();
    let second = h
        .reconciler
        .handle_notification(&event, VALID_SIGNATURE)
        .await
        .unwrap();

    assert!(matches!(first, ReconcileOutcome::Credited { .. }));
    assert_eq!(second, ReconcileOutcome::AlreadyProcessed);
    assert_eq!(h.ledger.balance(alice).await.unwrap(), dec!(1000));
}

#[tokio::test]
async fn concurrent_duplicate_webhooks_credit_exactly_once() {
    let h = Arc::new(harness());
    let alice = h.user("alice@example.com").await;
    let handle = h.ledger.initiate_deposit(alice, dec!(250)).await.unwrap();
    let event = success_event(&handle.reference, dec!(250));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let h = h.clone();
        let event = event.clone();
        tasks.push(tokio::spawn(async move {
            h.reconciler
                .handle_notification(&event, VALID_SIGNATURE)
                .await
                .unwrap()
        }));
    }

    let mut credited = 0;
    for task in tasks {
        if matches!(task.await.unwrap(), ReconcileOutcome::Credited { .. }) {
            credited += 1;
        }
    }

    assert_eq!(credited, 1);
    assert_eq!(h.ledger.balance(alice).await.unwrap(), dec!(250));
}

#[tokio::test]
async fn failure_event_marks_failed_without_credit() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    let handle = h.ledger.initiate_deposit(alice, dec!(500)).await.unwrap();

    let outcome = h
        .reconciler
        .handle_notification(&failed_event(&handle.reference, dec!(500)), VALID_SIGNATURE)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::MarkedFailed { .. }));
    assert_eq!(h.ledger.balance(alice).await.unwrap(), Decimal::ZERO);

    // FAILED is terminal: a late success delivery must not re-open it.
    let late = h
        .reconciler
        .handle_notification(&success_event(&handle.reference, dec!(500)), VALID_SIGNATURE)
        .await
        .unwrap();
    assert_eq!(late, ReconcileOutcome::AlreadyProcessed);
    assert_eq!(h.ledger.balance(alice).await.unwrap(), Decimal::ZERO);
}

#[tokio::test]
async fn success_envelope_with_failed_inner_status_marks_failed() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    let handle = h.ledger.initiate_deposit(alice, dec!(500)).await.unwrap();

    let event = serde_json::json!({
        "event": "charge.success",
        "data": {
            "reference": handle.reference,
            "amount": minor_units(dec!(500)),
            "status": "failed"
        }
    })
    .to_string()
    .into_bytes();

    let outcome = h
        .reconciler
        .handle_notification(&event, VALID_SIGNATURE)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::MarkedFailed { .. }));
    assert_eq!(h.ledger.balance(alice).await.unwrap(), Decimal::ZERO);
}

#[tokio::test]
async fn unrecognized_event_is_acknowledged_noop() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    let handle = h.ledger.initiate_deposit(alice, dec!(100)).await.unwrap();

    let event = serde_json::json!({
        "event": "subscription.create",
        "data": { "reference": handle.reference, "amount": 1 }
    })
    .to_string()
    .into_bytes();

    let outcome = h
        .reconciler
        .handle_notification(&event, VALID_SIGNATURE)
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Ignored);

    let status = h.ledger.deposit_status(&handle.reference).await.unwrap();
    assert_eq!(status.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn unknown_reference_is_not_found() {
    let h = harness();
    let result = h
        .reconciler
        .handle_notification(&success_event("dep_0_missing", dec!(10)), VALID_SIGNATURE)
        .await;
    assert!(matches!(result, Err(LedgerError::TransactionNotFound(_))));
}

#[tokio::test]
async fn tampered_signature_is_rejected_before_any_mutation() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    let handle = h.ledger.initiate_deposit(alice, dec!(1000)).await.unwrap();

    let result = h
        .reconciler
        .handle_notification(&success_event(&handle.reference, dec!(1000)), "forged")
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidSignature)));

    assert_eq!(h.ledger.balance(alice).await.unwrap(), Decimal::ZERO);
    let status = h.ledger.deposit_status(&handle.reference).await.unwrap();
    assert_eq!(status.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn transfer_moves_funds_and_records_transaction() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    let bob = h.user("bob@example.com").await;
    h.fund(alice, dec!(1000)).await;

    let bob_number = h.wallet_number(bob).await;
    let txn = h.ledger.transfer(alice, &bob_number, dec!(500)).await.unwrap();

    assert_eq!(h.ledger.balance(alice).await.unwrap(), dec!(500));
    assert_eq!(h.ledger.balance(bob).await.unwrap(), dec!(500));

    let alice_wallet = h.store.wallet_by_user(alice).await.unwrap().unwrap();
    let bob_wallet = h.store.wallet_by_user(bob).await.unwrap().unwrap();
    assert_eq!(txn.kind, TransactionKind::Transfer);
    assert_eq!(txn.status, TransactionStatus::Success);
    assert_eq!(txn.amount, dec!(500));
    assert_eq!(txn.sender_wallet_id, Some(alice_wallet.id));
    assert_eq!(txn.receiver_wallet_id, Some(bob_wallet.id));
}

#[tokio::test]
async fn transfer_rejects_bad_amounts_without_state_change() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    let bob = h.user("bob@example.com").await;
    h.fund(alice, dec!(100)).await;
    let bob_number = h.wallet_number(bob).await;

    for amount in [Decimal::ZERO, dec!(-5)] {
        let result = h.ledger.transfer(alice, &bob_number, amount).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    assert_eq!(h.ledger.balance(alice).await.unwrap(), dec!(100));
    assert_eq!(h.ledger.balance(bob).await.unwrap(), Decimal::ZERO);
}

#[tokio::test]
async fn transfer_to_own_wallet_is_rejected() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    h.fund(alice, dec!(100)).await;
    let own_number = h.wallet_number(alice).await;

    let result = h.ledger.transfer(alice, &own_number, dec!(10)).await;
    assert!(matches!(result, Err(LedgerError::SelfTransfer)));
    assert_eq!(h.ledger.balance(alice).await.unwrap(), dec!(100));
}

#[tokio::test]
async fn transfer_to_unknown_wallet_is_not_found() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    h.fund(alice, dec!(100)).await;

    let result = h.ledger.transfer(alice, "0000000000", dec!(10)).await;
    assert!(matches!(result, Err(LedgerError::WalletNotFound(_))));
}

#[tokio::test]
async fn transfer_rejects_insufficient_funds() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    let bob = h.user("bob@example.com").await;
    h.fund(alice, dec!(100)).await;
    let bob_number = h.wallet_number(bob).await;

    let result = h.ledger.transfer(alice, &bob_number, dec!(100.01)).await;
    assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    assert_eq!(h.ledger.balance(alice).await.unwrap(), dec!(100));
}

#[tokio::test]
async fn concurrent_transfers_cannot_overdraw() {
    let h = Arc::new(harness());
    let alice = h.user("alice@example.com").await;
    let bob = h.user("bob@example.com").await;
    let carol = h.user("carol@example.com").await;
    h.fund(alice, dec!(1000)).await;

    // Each transfer fits the balance alone; together they overdraw it.
    let to_bob = h.wallet_number(bob).await;
    let to_carol = h.wallet_number(carol).await;

    let h1 = h.clone();
    let t1 = tokio::spawn(async move { h1.ledger.transfer(alice, &to_bob, dec!(700)).await });
    let h2 = h.clone();
    let t2 = tokio::spawn(async move { h2.ledger.transfer(alice, &to_carol, dec!(600)).await });

    let results = [t1.await.unwrap(), t2.await.unwrap()];
    let succeeded: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
    assert_eq!(succeeded.len(), 1, "exactly one transfer must win");
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. }))));

    let spent = succeeded[0].as_ref().unwrap().amount;
    let remaining = h.ledger.balance(alice).await.unwrap();
    assert_eq!(remaining, dec!(1000) - spent);
    assert!(remaining >= Decimal::ZERO);
}

#[tokio::test]
async fn gateway_failure_preserves_deposit_intent() {
    let h = harness_with(MockGateway::failing());
    let alice = h.user("alice@example.com").await;

    let result = h.ledger.initiate_deposit(alice, dec!(300)).await;
    assert!(matches!(result, Err(LedgerError::Gateway(_))));

    // The PENDING row survives the failed gateway call.
    let history = h.ledger.transactions(alice).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, TransactionKind::Deposit);
    assert_eq!(history[0].status, TransactionStatus::Pending);
    assert_eq!(h.ledger.balance(alice).await.unwrap(), Decimal::ZERO);
}

#[tokio::test]
async fn verify_deposit_settles_when_webhook_never_arrived() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    let handle = h.ledger.initiate_deposit(alice, dec!(750)).await.unwrap();

    h.gateway
        .script_verify(ChargeStatus::Success {
            amount_minor: minor_units(dec!(750)),
        })
        .await;

    let outcome = h.reconciler.verify_deposit(&handle.reference).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Credited { .. }));
    assert_eq!(h.ledger.balance(alice).await.unwrap(), dec!(750));

    // Re-verification and late webhooks are both idempotent no-ops.
    let again = h.reconciler.verify_deposit(&handle.reference).await.unwrap();
    assert_eq!(again, ReconcileOutcome::AlreadyProcessed);
    assert_eq!(h.ledger.balance(alice).await.unwrap(), dec!(750));
}

#[tokio::test]
async fn history_is_newest_first_and_bidirectional() {
    let h = harness();
    let alice = h.user("alice@example.com").await;
    let bob = h.user("bob@example.com").await;
    h.fund(alice, dec!(1000)).await;

    let alice_number = h.wallet_number(alice).await;
    let bob_number = h.wallet_number(bob).await;
    h.ledger.transfer(alice, &bob_number, dec!(200)).await.unwrap();
    h.ledger.transfer(bob, &alice_number, dec!(50)).await.unwrap();

    let history = h.ledger.transactions(alice).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].amount, dec!(50));
    assert_eq!(history[1].amount, dec!(200));
    assert_eq!(history[2].kind, TransactionKind::Deposit);
    for pair in history.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
}

#[tokio::test]
async fn register_rejects_invalid_email_and_duplicates() {
    let h = harness();
    assert!(matches!(
        h.ledger.register_user("not-an-email").await,
        Err(LedgerError::Validation(_))
    ));

    h.user("alice@example.com").await;
    assert!(matches!(
        h.ledger.register_user("alice@example.com").await,
        Err(LedgerError::Duplicate(_))
    ));
}
