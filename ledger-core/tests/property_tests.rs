//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Non-negativity: every wallet balance >= 0 at every committed state
//! - Conservation: transfers never change the sum of balances; deposits
//!   grow it by exactly the credited amount
//! - Idempotency: repeated settlement of one reference credits once

use ledger_core::{InMemoryLedgerStore, LedgerError, LedgerStore, SettleOutcome};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Strategy for generating valid amounts (positive decimals, two places)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1u64..1_000_000_00u64).prop_map(|cents| Decimal::new(cents as i64, 2))
}

/// Strategy for a transfer instruction over wallet indexes
fn transfer_strategy(wallets: usize) -> impl Strategy<Value = (usize, usize, Decimal)> {
    (0..wallets, 0..wallets, amount_strategy())
}

/// Seed a store with one funded wallet per entry; returns (user, wallet)
/// id pairs.
async fn seeded_store(initial: &[Decimal]) -> (InMemoryLedgerStore, Vec<(Uuid, Uuid)>) {
    let store = InMemoryLedgerStore::new();
    let mut ids = Vec::new();

    for (i, amount) in initial.iter().enumerate() {
        let (user, wallet) = store
            .create_user_with_wallet(&format!("user{i}@example.com"), &format!("000000000{i}"))
            .await
            .unwrap();
        ids.push((user.id, wallet.id));

        if *amount > Decimal::ZERO {
            let reference = format!("dep_seed_{i}");
            store
                .insert_pending_deposit(wallet.id, *amount, &reference)
                .await
                .unwrap();
            store.settle_deposit(&reference, *amount).await.unwrap();
        }
    }

    (store, ids)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: random transfer sequences conserve the total balance and
    /// never drive any wallet negative.
    #[test]
    fn prop_transfers_conserve_total(
        initial in proptest::collection::vec(amount_strategy(), 3),
        transfers in proptest::collection::vec(transfer_strategy(3), 1..40),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (store, ids) = seeded_store(&initial).await;
            let total_before = store.total_balance().await;

            for (i, (from, to, amount)) in transfers.into_iter().enumerate() {
                let result = store
                    .apply_transfer(ids[from].1, ids[to].1, amount, &format!("trf_{i}"))
                    .await;

                match result {
                    Ok(_)
                    | Err(LedgerError::InsufficientFunds { .. })
                    | Err(LedgerError::SelfTransfer) => {}
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                }

                // Non-negativity holds after every committed unit.
                for (user_id, _) in &ids {
                    let wallet = store.wallet_by_user(*user_id).await.unwrap().unwrap();
                    prop_assert!(wallet.balance >= Decimal::ZERO);
                }
            }

            prop_assert_eq!(store.total_balance().await, total_before);
            Ok(())
        })?;
    }

    /// Property: a deposit settled N >= 1 times credits exactly once.
    #[test]
    fn prop_settlement_is_idempotent(
        amount in amount_strategy(),
        deliveries in 1usize..6,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (store, ids) = seeded_store(&[Decimal::ZERO]).await;

            store
                .insert_pending_deposit(ids[0].1, amount, "dep_prop")
                .await
                .unwrap();

            let mut applied = 0;
            for _ in 0..deliveries {
                match store.settle_deposit("dep_prop", amount).await.unwrap() {
                    SettleOutcome::Applied(_) => applied += 1,
                    SettleOutcome::AlreadySettled => {}
                }
            }

            prop_assert_eq!(applied, 1);
            prop_assert_eq!(store.total_balance().await, amount);
            Ok(())
        })?;
    }

    /// Property: a failed deposit never moves money, and failure is
    /// terminal against later success deliveries.
    #[test]
    fn prop_failed_deposits_have_no_balance_effect(amount in amount_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (store, ids) = seeded_store(&[Decimal::ZERO]).await;

            store
                .insert_pending_deposit(ids[0].1, amount, "dep_fail")
                .await
                .unwrap();
            store.fail_deposit("dep_fail").await.unwrap();

            let outcome = store.settle_deposit("dep_fail", amount).await.unwrap();
            prop_assert!(matches!(outcome, SettleOutcome::AlreadySettled));
            prop_assert_eq!(store.total_balance().await, Decimal::ZERO);
            Ok(())
        })?;
    }
}
