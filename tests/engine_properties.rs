//! Engine-level integration tests
//!
//! These drive the public `SettlementEngine` API directly: money flow at each
//! step of a rental, exclusivity under concurrent approvals, completion
//! timers and all-or-nothing settlement.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rental_settlement_engine::core::{
    Catalog, Collaborators, EngineConfig, InMemoryCatalog, SettlementEngine,
    DEFAULT_COMMISSION_RATE,
};
use rental_settlement_engine::types::{
    DeliveryStatus, Interval, Item, ItemId, Rental, RentalError, RentalRequest, RentalStatus,
    TransactionStatus, TransactionType, UserId,
};
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const OWNER: UserId = 10;
const RENTER: UserId = 20;
const OTHER_RENTER: UserId = 21;
const ITEM: ItemId = 1;

struct Harness {
    engine: SettlementEngine,
    catalog: Arc<InMemoryCatalog>,
}

fn harness(delay: Duration) -> Harness {
    let (collaborators, catalog, identity) = Collaborators::in_memory();
    catalog.list_item(ITEM, OWNER, dec!(50));
    for user in [OWNER, RENTER, OTHER_RENTER] {
        identity.register(user);
    }
    let engine = SettlementEngine::new(
        EngineConfig::new(DEFAULT_COMMISSION_RATE, delay),
        collaborators,
    );
    Harness { engine, catalog }
}

fn interval(from: u32, to: u32) -> Interval {
    Interval::new(
        Utc.with_ymd_and_hms(2024, 6, from, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 6, to, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

fn request(h: &Harness, renter: UserId, from: u32, to: u32, total: Decimal) -> Rental {
    h.engine
        .create_rental_request(RentalRequest::new(ITEM, renter, interval(from, to), total))
        .unwrap()
}

fn available(h: &Harness) -> bool {
    h.catalog.get_item(ITEM).unwrap().available
}

fn deliver(h: &Harness, rental: &Rental) {
    h.engine
        .transition_delivery(rental.id, DeliveryStatus::DeliveredToBuyer)
        .unwrap();
}

fn return_item(h: &Harness, rental: &Rental) -> Rental {
    h.engine
        .transition_delivery(rental.id, DeliveryStatus::ReturnedToSeller)
        .unwrap()
}

#[test]
fn test_approval_posts_pending_earning_and_fee() {
    let h = harness(Duration::ZERO);
    let rental = request(&h, RENTER, 1, 3, dec!(100));

    let outcome = h.engine.approve_rental(rental.id).unwrap();

    assert_eq!(outcome.rental.status, RentalStatus::Confirmed);
    assert_eq!(outcome.rental.platform_commission, dec!(5.00));
    let wallet = h.engine.get_wallet(OWNER);
    assert_eq!(wallet.pending_balance, dec!(95.00));
    assert_eq!(wallet.withdrawable_balance, dec!(0));

    let txs = h.engine.transactions_for_rental(rental.id);
    let fee = txs
        .iter()
        .find(|tx| tx.tx_type == TransactionType::PlatformFee)
        .unwrap();
    assert_eq!(fee.amount, dec!(-5.00));
    assert_eq!(fee.status, TransactionStatus::Completed);
    let earning = txs
        .iter()
        .find(|tx| tx.tx_type == TransactionType::RentalEarning)
        .unwrap();
    assert_eq!(earning.amount, dec!(95.00));
    assert_eq!(earning.status, TransactionStatus::Pending);
    assert!(!available(&h));
}

#[test]
fn test_completion_with_damage() {
    let h = harness(Duration::ZERO);
    let rental = request(&h, RENTER, 1, 3, dec!(100));
    h.engine.approve_rental(rental.id).unwrap();
    deliver(&h, &rental);
    h.engine.assess_damage(rental.id, dec!(10)).unwrap();

    let completed = return_item(&h, &rental);

    assert_eq!(completed.status, RentalStatus::Completed);
    assert_eq!(completed.final_seller_earning, dec!(85.00));
    let wallet = h.engine.get_wallet(OWNER);
    assert_eq!(wallet.pending_balance, dec!(0));
    assert_eq!(wallet.withdrawable_balance, dec!(85.00));
    assert!(available(&h));
}

#[test]
fn test_deposit_released_without_damage() {
    let h = harness(Duration::ZERO);
    let rental = h
        .engine
        .create_rental_request(
            RentalRequest::new(ITEM, RENTER, interval(1, 3), dec!(100)).with_deposit(dec!(25)),
        )
        .unwrap();
    h.engine.approve_rental(rental.id).unwrap();
    deliver(&h, &rental);
    return_item(&h, &rental);

    let txs = h.engine.transactions_for_rental(rental.id);
    let hold = txs
        .iter()
        .find(|tx| tx.tx_type == TransactionType::SecurityDepositHold)
        .unwrap();
    assert_eq!(hold.status, TransactionStatus::Completed);
    assert!(txs
        .iter()
        .any(|tx| tx.tx_type == TransactionType::SecurityDepositRelease && tx.amount == dec!(25)));
    assert_eq!(h.engine.get_wallet(RENTER).withdrawable_balance, dec!(25));
}

#[test]
fn test_approval_rejects_overlapping_requests() {
    let h = harness(Duration::ZERO);
    let first = request(&h, RENTER, 1, 5, dec!(100));
    let second = request(&h, OTHER_RENTER, 3, 7, dec!(80));
    let apart = request(&h, OTHER_RENTER, 10, 12, dec!(40));

    let outcome = h.engine.approve_rental(first.id).unwrap();

    assert_eq!(outcome.rejected_siblings.len(), 1);
    let rejected = h.engine.get_rental(second.id).unwrap();
    assert_eq!(rejected.status, RentalStatus::Rejected);
    assert_eq!(rejected.refund_amount, dec!(80));
    assert!(rejected.rejection_reason.is_some());
    assert_eq!(
        h.engine.get_rental(apart.id).unwrap().status,
        RentalStatus::Requested
    );
    assert!(matches!(
        h.engine.approve_rental(second.id),
        Err(RentalError::InvalidState { .. })
    ));
    assert!(matches!(
        h.engine.create_rental_request(RentalRequest::new(
            ITEM,
            OTHER_RENTER,
            interval(2, 4),
            dec!(30)
        )),
        Err(RentalError::Conflict { conflicting, .. }) if conflicting == first.id
    ));
}

#[test]
fn test_every_overlapping_sibling_gets_one_refund_record() {
    let h = harness(Duration::ZERO);
    let approved = request(&h, RENTER, 1, 3, dec!(100));
    let second = request(&h, OTHER_RENTER, 1, 3, dec!(1000));
    let third = request(&h, OTHER_RENTER, 2, 3, dec!(60));

    let outcome = h.engine.approve_rental(approved.id).unwrap();

    assert_eq!(outcome.rental.status, RentalStatus::Confirmed);
    assert_eq!(outcome.rejected_siblings.len(), 2);
    for sibling in [&second, &third] {
        let rejected = h.engine.get_rental(sibling.id).unwrap();
        assert_eq!(rejected.status, RentalStatus::Rejected);
        assert_eq!(rejected.refund_amount, rejected.total_amount);

        let txs = h.engine.transactions_for_rental(sibling.id);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].tx_type, TransactionType::Refund);
        assert_eq!(txs[0].status, TransactionStatus::Completed);
        assert_eq!(txs[0].amount, sibling.total_amount);
        assert_eq!(txs[0].user, OTHER_RENTER);
    }

    // The losing renter was never charged, so nothing became withdrawable.
    let wallet = h.engine.get_wallet(OTHER_RENTER);
    assert_eq!(wallet.withdrawable_balance, dec!(0));
    assert!(matches!(
        h.engine.request_withdrawal(OTHER_RENTER, dec!(1000)),
        Err(RentalError::InsufficientFunds { .. })
    ));
    assert!(h.engine.reconcile_wallet(OTHER_RENTER).is_ok());
}

#[rstest]
#[case::delivered(DeliveryStatus::DeliveredToBuyer, RentalStatus::Active)]
#[case::picked(DeliveryStatus::PickedFromSeller, RentalStatus::PickedUp)]
fn test_repeated_delivery_event_is_idempotent(
    #[case] delivery: DeliveryStatus,
    #[case] expected: RentalStatus,
) {
    let h = harness(Duration::ZERO);
    let rental = request(&h, RENTER, 1, 3, dec!(100));
    h.engine.approve_rental(rental.id).unwrap();

    let first = h.engine.transition_delivery(rental.id, delivery).unwrap();
    let tx_count = h.engine.transactions_for_rental(rental.id).len();
    let second = h.engine.transition_delivery(rental.id, delivery).unwrap();

    assert_eq!(first.status, expected);
    assert_eq!(first, second);
    assert_eq!(h.engine.transactions_for_rental(rental.id).len(), tx_count);
}

#[test]
fn test_backwards_delivery_is_refused() {
    let h = harness(Duration::ZERO);
    let rental = request(&h, RENTER, 1, 3, dec!(100));
    h.engine.approve_rental(rental.id).unwrap();
    deliver(&h, &rental);

    let result = h
        .engine
        .transition_delivery(rental.id, DeliveryStatus::PickedFromSeller);

    assert!(matches!(result, Err(RentalError::InvalidState { .. })));
}

#[test]
fn test_cancel_reverses_earning_and_frees_item() {
    let h = harness(Duration::ZERO);
    let rental = request(&h, RENTER, 1, 3, dec!(100));
    h.engine.approve_rental(rental.id).unwrap();

    let cancelled = h
        .engine
        .cancel_rental(rental.id, Some("changed plans".to_string()))
        .unwrap();

    assert_eq!(cancelled.status, RentalStatus::Cancelled);
    assert_eq!(cancelled.refund_amount, dec!(100));
    assert_eq!(h.engine.get_wallet(OWNER).pending_balance, dec!(0));
    assert_eq!(h.engine.get_wallet(RENTER).withdrawable_balance, dec!(100));
    assert!(available(&h));

    let earning = h
        .engine
        .transactions_for_rental(rental.id)
        .into_iter()
        .find(|tx| tx.tx_type == TransactionType::RentalEarning)
        .unwrap();
    assert_eq!(earning.status, TransactionStatus::Reversed);

    // The window is free again.
    let again = request(&h, OTHER_RENTER, 1, 3, dec!(100));
    assert!(h.engine.approve_rental(again.id).is_ok());
}

#[test]
fn test_cancel_after_return_is_refused() {
    let h = harness(Duration::from_secs(30));
    let rental = request(&h, RENTER, 1, 3, dec!(100));
    h.engine.approve_rental(rental.id).unwrap();
    deliver(&h, &rental);
    // No runtime: the completion happens inline.
    let completed = return_item(&h, &rental);
    assert_eq!(completed.status, RentalStatus::Completed);

    let result = h.engine.cancel_rental(rental.id, None);

    assert!(matches!(result, Err(RentalError::InvalidState { .. })));
}

#[test]
fn test_concurrent_overlapping_approvals_grant_one() {
    let h = harness(Duration::ZERO);
    let requests: Vec<Rental> = (0..8)
        .map(|i| {
            let renter = if i % 2 == 0 { RENTER } else { OTHER_RENTER };
            request(&h, renter, 1 + (i % 3), 5 + (i % 3), dec!(100))
        })
        .collect();

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = requests
            .iter()
            .map(|rental| {
                let engine = h.engine.clone();
                let id = rental.id;
                scope.spawn(move || engine.approve_rental(id))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let granted: Vec<_> = h
        .engine
        .rentals_for_item(ITEM)
        .into_iter()
        .filter(|r| r.status == RentalStatus::Confirmed)
        .collect();
    assert_eq!(granted.len(), 1);
    assert_eq!(h.engine.get_wallet(OWNER).pending_balance, dec!(95.00));
}

#[test]
fn test_concurrent_withdrawals_never_overdraw() {
    let h = harness(Duration::ZERO);
    let rental = request(&h, RENTER, 1, 3, dec!(100));
    h.engine.approve_rental(rental.id).unwrap();
    deliver(&h, &rental);
    return_item(&h, &rental);

    let succeeded = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let engine = h.engine.clone();
                scope.spawn(move || engine.request_withdrawal(OWNER, dec!(20)).is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count()
    });

    assert_eq!(succeeded, 4);
    let wallet = h.engine.get_wallet(OWNER);
    assert_eq!(wallet.withdrawable_balance, dec!(15.00));
    assert_eq!(wallet.total_withdrawn, dec!(80));
}

#[tokio::test(start_paused = true)]
async fn test_completion_fires_after_delay() {
    let h = harness(Duration::from_secs(30));
    let rental = request(&h, RENTER, 1, 3, dec!(100));
    h.engine.approve_rental(rental.id).unwrap();
    deliver(&h, &rental);

    let returned = return_item(&h, &rental);
    assert_eq!(returned.status, RentalStatus::Returned);
    assert_eq!(h.engine.pending_completions(), 1);
    assert!(available(&h));

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(
        h.engine.get_rental(rental.id).unwrap().status,
        RentalStatus::Returned
    );
    assert_eq!(h.engine.get_wallet(OWNER).pending_balance, dec!(95.00));

    tokio::time::sleep(Duration::from_secs(2)).await;
    h.engine.wait_for_completions().await;
    assert_eq!(
        h.engine.get_rental(rental.id).unwrap().status,
        RentalStatus::Completed
    );
    assert_eq!(h.engine.get_wallet(OWNER).withdrawable_balance, dec!(95.00));
    assert_eq!(h.engine.pending_completions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_held_completion_waits_for_explicit_complete() {
    let h = harness(Duration::from_secs(30));
    let rental = request(&h, RENTER, 1, 3, dec!(100));
    h.engine.approve_rental(rental.id).unwrap();
    deliver(&h, &rental);
    return_item(&h, &rental);

    h.engine.hold_completion(rental.id).unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(
        h.engine.get_rental(rental.id).unwrap().status,
        RentalStatus::Returned
    );
    assert_eq!(h.engine.pending_completions(), 0);

    let completed = h.engine.complete_rental(rental.id).unwrap();
    assert_eq!(completed.status, RentalStatus::Completed);
    // Completing twice is a no-op.
    assert_eq!(h.engine.complete_rental(rental.id).unwrap(), completed);
    assert_eq!(h.engine.get_wallet(OWNER).withdrawable_balance, dec!(95.00));
}

#[test]
fn test_extension_settles_at_completion() {
    let h = harness(Duration::ZERO);
    let rental = request(&h, RENTER, 1, 3, dec!(100));
    h.engine.approve_rental(rental.id).unwrap();
    deliver(&h, &rental);

    let extended = h
        .engine
        .extend_rental(rental.id, chrono::Duration::hours(24))
        .unwrap();
    assert_eq!(extended.total_amount, dec!(150.00));
    assert_eq!(extended.extension_amount, dec!(50.00));
    assert_eq!(extended.interval, interval(1, 4));

    let completed = return_item(&h, &rental);

    assert_eq!(completed.platform_commission, dec!(7.50));
    assert_eq!(completed.final_seller_earning, dec!(142.50));
    assert_eq!(
        h.engine.get_wallet(OWNER).withdrawable_balance,
        dec!(142.50)
    );
}

#[test]
fn test_extension_into_granted_window_conflicts() {
    let h = harness(Duration::ZERO);
    let first = request(&h, RENTER, 1, 3, dec!(100));
    h.engine.approve_rental(first.id).unwrap();
    let second = request(&h, OTHER_RENTER, 5, 7, dec!(100));
    h.engine.approve_rental(second.id).unwrap();
    deliver(&h, &first);

    let result = h
        .engine
        .extend_rental(first.id, chrono::Duration::days(3));

    assert!(matches!(
        result,
        Err(RentalError::Conflict { conflicting, .. }) if conflicting == second.id
    ));
    assert_eq!(
        h.engine.get_rental(first.id).unwrap().total_amount,
        dec!(100)
    );
}

/// Catalog whose availability writes always fail
struct FailingCatalog {
    inner: InMemoryCatalog,
}

impl Catalog for FailingCatalog {
    fn get_item(&self, item: ItemId) -> Result<Item, RentalError> {
        self.inner.get_item(item)
    }

    fn set_availability(&self, _item: ItemId, _available: bool) -> Result<(), RentalError> {
        Err(RentalError::collaborator("catalog", "unavailable"))
    }
}

#[test]
fn test_failed_catalog_write_leaves_nothing_behind() {
    let (mut collaborators, _catalog, identity) = Collaborators::in_memory();
    let failing = FailingCatalog {
        inner: InMemoryCatalog::new(),
    };
    failing.inner.list_item(ITEM, OWNER, dec!(50));
    collaborators.catalog = Arc::new(failing);
    identity.register(OWNER);
    identity.register(RENTER);
    let engine = SettlementEngine::new(EngineConfig::default(), collaborators);
    let rental = engine
        .create_rental_request(RentalRequest::new(ITEM, RENTER, interval(1, 3), dec!(100)))
        .unwrap();

    let result = engine.approve_rental(rental.id);

    assert!(matches!(result, Err(RentalError::SettlementFailure { .. })));
    assert_eq!(
        engine.get_rental(rental.id).unwrap().status,
        RentalStatus::Requested
    );
    assert!(engine.transactions_for_rental(rental.id).is_empty());
    assert_eq!(engine.get_wallet(OWNER).pending_balance, dec!(0));
}

#[test]
fn test_wallets_reconcile_after_full_lifecycle() {
    let h = harness(Duration::ZERO);
    let kept = request(&h, RENTER, 1, 3, dec!(100));
    let rejected = request(&h, OTHER_RENTER, 2, 4, dec!(60));
    h.engine.approve_rental(kept.id).unwrap();
    deliver(&h, &kept);
    h.engine.assess_damage(kept.id, dec!(5)).unwrap();
    return_item(&h, &kept);
    let cancelled = request(&h, RENTER, 10, 12, dec!(40));
    h.engine.approve_rental(cancelled.id).unwrap();
    h.engine.cancel_rental(cancelled.id, None).unwrap();
    h.engine.request_withdrawal(OWNER, dec!(50)).unwrap();

    for user in [OWNER, RENTER, OTHER_RENTER] {
        let reconciliation = h.engine.reconcile_wallet(user).unwrap();
        let wallet = reconciliation.wallet;
        assert_eq!(reconciliation.expected_pending, wallet.pending_balance);
        assert_eq!(reconciliation.expected_withdrawable, wallet.withdrawable_balance);
        assert!(wallet.pending_balance >= Decimal::ZERO);
        assert!(wallet.withdrawable_balance >= Decimal::ZERO);
    }
    let owner = h.engine.get_wallet(OWNER);
    assert_eq!(owner.withdrawable_balance, dec!(40.00));
    assert_eq!(owner.total_earnings, dec!(90.00));
    assert_eq!(
        h.engine.get_rental(rejected.id).unwrap().status,
        RentalStatus::Rejected
    );
}
