//! Wallet ledger
//!
//! This module provides the `Ledger`, which owns every wallet and the
//! append-only transaction log. It knows nothing about rentals beyond the ids
//! carried on transactions.
//!
//! # Postings
//!
//! Every balance change is expressed as a [`Posting`]: one wallet, one
//! [`BalanceChange`], and exactly one ledger [`Entry`] (a new record, or the
//! settlement of an existing pending record). The pairing is structural, so
//! there is no way to move a balance without leaving an audit record.
//!
//! # Two-Phase Application
//!
//! `prepare` runs a batch of postings against copies of the affected wallets
//! and validates every entry, without writing anything. `apply` then writes
//! the prepared result and cannot fail. Callers hold the wallet locks across
//! both phases (`with_wallet_locks`), which is what lets the settlement
//! orchestrator make a multi-wallet unit all-or-nothing.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, error, warn};

use crate::core::locks::KeyedLocks;
use crate::core::transaction_store::TransactionStore;
use crate::types::{
    ItemId, RentalError, RentalId, Transaction, TransactionId, TransactionStatus,
    TransactionType, UserId, Wallet,
};

/// How a posting moves the wallet's balances
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BalanceChange {
    /// Audit record only
    None,
    /// `pending += amount`
    AddPending(Decimal),
    /// Move up to `amount` from pending to withdrawable
    ReleasePending(Decimal),
    /// Remove up to `amount` from pending
    ReversePending(Decimal),
    /// `withdrawable += amount`
    Credit(Decimal),
    /// `withdrawable += amount`, counted as earnings
    CreditEarning(Decimal),
    /// `withdrawable -= amount`, counted against earnings
    Deduct(Decimal),
    /// `withdrawable -= amount`, counted as withdrawn
    Withdraw(Decimal),
}

impl BalanceChange {
    /// Signed change of withdrawable + pending a new record must describe
    fn record_amount(&self) -> Option<Decimal> {
        match *self {
            BalanceChange::AddPending(amount)
            | BalanceChange::Credit(amount)
            | BalanceChange::CreditEarning(amount) => Some(amount),
            BalanceChange::Deduct(amount) | BalanceChange::Withdraw(amount) => Some(-amount),
            BalanceChange::None
            | BalanceChange::ReleasePending(_)
            | BalanceChange::ReversePending(_) => None,
        }
    }
}

/// The ledger record paired with a balance change
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Write a new record
    Append(Transaction),
    /// Move an existing pending record to a final status
    Settle {
        tx: TransactionId,
        status: TransactionStatus,
    },
}

/// One wallet mutation plus its audit record
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub user: UserId,
    pub change: BalanceChange,
    pub entry: Entry,
}

impl Posting {
    /// Record without balance effect (payments, fees, deposit holds)
    pub fn record(tx: Transaction) -> Self {
        Self::append(BalanceChange::None, tx)
    }

    /// Pending earning, record stays `pending` until released or reversed
    pub fn pending_earning(tx: Transaction) -> Self {
        Self::append(BalanceChange::AddPending(tx.amount), tx)
    }

    /// Credit to withdrawable (refunds, deposit releases)
    pub fn credit(tx: Transaction) -> Self {
        Self::append(BalanceChange::Credit(tx.amount), tx)
    }

    /// Earning credited straight to withdrawable
    pub fn credit_earning(tx: Transaction) -> Self {
        Self::append(BalanceChange::CreditEarning(tx.amount), tx)
    }

    /// Deduction from withdrawable; `tx.amount` is negative
    pub fn deduct(tx: Transaction) -> Self {
        Self::append(BalanceChange::Deduct(-tx.amount), tx)
    }

    /// Withdrawal; `tx.amount` is negative
    pub fn withdraw(tx: Transaction) -> Self {
        Self::append(BalanceChange::Withdraw(-tx.amount), tx)
    }

    /// Release a pending earning and mark its record completed
    pub fn release(earning: &Transaction) -> Self {
        Posting {
            user: earning.user,
            change: BalanceChange::ReleasePending(earning.amount),
            entry: Entry::Settle {
                tx: earning.id,
                status: TransactionStatus::Completed,
            },
        }
    }

    /// Take back a pending earning and mark its record reversed
    pub fn reverse(earning: &Transaction) -> Self {
        Posting {
            user: earning.user,
            change: BalanceChange::ReversePending(earning.amount),
            entry: Entry::Settle {
                tx: earning.id,
                status: TransactionStatus::Reversed,
            },
        }
    }

    /// Settle a record-only entry (no balance effect)
    pub fn settle(tx: &Transaction, status: TransactionStatus) -> Self {
        Posting {
            user: tx.user,
            change: BalanceChange::None,
            entry: Entry::Settle { tx: tx.id, status },
        }
    }

    fn append(change: BalanceChange, tx: Transaction) -> Self {
        Posting {
            user: tx.user,
            change,
            entry: Entry::Append(tx),
        }
    }
}

/// Result of `prepare`: final wallet states and the records to write
#[derive(Debug, Clone, Default)]
pub struct PreparedPostings {
    wallets: HashMap<UserId, Wallet>,
    appends: Vec<Transaction>,
    settles: Vec<(TransactionId, TransactionStatus)>,
}

impl PreparedPostings {
    /// Users whose wallets this batch writes
    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.wallets.keys()
    }

    /// New records this batch will append
    pub fn appended(&self) -> &[Transaction] {
        &self.appends
    }

    pub fn is_empty(&self) -> bool {
        self.appends.is_empty() && self.settles.is_empty()
    }
}

/// Expected balances recomputed from a wallet's records
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub wallet: Wallet,
    pub expected_pending: Decimal,
    pub expected_withdrawable: Decimal,
}

/// Wallet ledger
///
/// Wallets are created lazily and exactly once per user. All balance
/// mutations go through postings.
#[derive(Debug, Default)]
pub struct Ledger {
    wallets: DashMap<UserId, Wallet>,
    transactions: TransactionStore,
    locks: KeyedLocks<UserId>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a user's wallet, creating an empty one on first reference
    ///
    /// Concurrent callers for the same user always observe the same wallet.
    pub fn get_or_create(&self, user: UserId) -> Wallet {
        self.wallets
            .entry(user)
            .or_insert_with(|| {
                debug!(user, "creating wallet");
                Wallet::new(user)
            })
            .clone()
    }

    /// Existing wallet, without creating one
    pub fn wallet(&self, user: UserId) -> Option<Wallet> {
        self.wallets.get(&user).map(|entry| entry.value().clone())
    }

    pub fn all_wallets(&self) -> Vec<Wallet> {
        self.wallets
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn transactions(&self) -> &TransactionStore {
        &self.transactions
    }

    /// Run `f` while holding the locks of every wallet in `users`
    pub fn with_wallet_locks<R>(
        &self,
        users: impl IntoIterator<Item = UserId>,
        f: impl FnOnce() -> R,
    ) -> R {
        self.locks.with_locks(users, f)
    }

    /// Validate a batch of postings against current balances
    ///
    /// Nothing is written. The caller must hold the locks of every wallet
    /// the postings touch until the result has been applied.
    pub fn prepare(&self, postings: Vec<Posting>) -> Result<PreparedPostings, RentalError> {
        let mut prepared = PreparedPostings::default();
        let mut settled: HashSet<TransactionId> = HashSet::new();

        for posting in postings {
            let user = posting.user;
            let wallet = prepared
                .wallets
                .entry(user)
                .or_insert_with(|| self.get_or_create(user));

            match posting.entry {
                Entry::Append(mut tx) => {
                    if tx.user != user {
                        return Err(RentalError::settlement(format!(
                            "record for user {} posted to wallet of user {}",
                            tx.user, user
                        )));
                    }
                    match posting.change.record_amount() {
                        Some(delta) if delta != tx.amount => {
                            return Err(RentalError::settlement(format!(
                                "{} record of {} does not match balance change of {}",
                                tx.tx_type, tx.amount, delta
                            )));
                        }
                        None if tx.moves_balance() && posting.change == BalanceChange::None =>
                        {
                            return Err(RentalError::settlement(format!(
                                "{} record must move a balance",
                                tx.tx_type
                            )));
                        }
                        Some(_) if tx.record_only => {
                            return Err(RentalError::settlement(format!(
                                "record-only {} entry cannot move a balance",
                                tx.tx_type
                            )));
                        }
                        _ => {}
                    }
                    apply_change(wallet, posting.change)?;
                    tx.wallet = wallet.id;
                    prepared.appends.push(tx);
                }
                Entry::Settle { tx, status } => {
                    let existing = self.transactions.check_settle(tx, status)?;
                    if existing.user != user || !settled.insert(tx) {
                        return Err(RentalError::settlement(format!(
                            "transaction {} cannot be settled by this posting",
                            tx
                        )));
                    }
                    let moved = apply_change(wallet, posting.change)?;
                    if let Some(moved) = moved {
                        if moved != existing.amount {
                            warn!(
                                tx = %tx,
                                expected = %existing.amount,
                                moved = %moved,
                                "pending balance short of the earning being settled"
                            );
                        }
                    }
                    prepared.settles.push((tx, status));
                }
            }
        }

        Ok(prepared)
    }

    /// Write a prepared batch
    ///
    /// Must be called under the same wallet locks as the `prepare` that
    /// produced it.
    pub fn apply(&self, prepared: PreparedPostings) {
        for (user, wallet) in prepared.wallets {
            self.wallets.insert(user, wallet);
        }
        for tx in prepared.appends {
            self.transactions.append(tx);
        }
        for (tx, status) in prepared.settles {
            // Checked in `prepare` under the wallet lock that guards this record.
            if let Err(e) = self.transactions.settle(tx, status) {
                error!(tx = %tx, error = %e, "prepared settlement could not be written");
            }
        }
    }

    /// Lock, prepare and apply a batch of postings
    pub fn post(&self, postings: Vec<Posting>) -> Result<Vec<Transaction>, RentalError> {
        let users: Vec<UserId> = postings.iter().map(|p| p.user).collect();
        self.with_wallet_locks(users, || {
            let prepared = self.prepare(postings)?;
            let appended = prepared.appended().to_vec();
            self.apply(prepared);
            Ok(appended)
        })
    }

    /// `pending += amount` with a `pending` earning record
    pub fn add_pending_earning(
        &self,
        user: UserId,
        amount: Decimal,
        rental: Option<(RentalId, ItemId)>,
    ) -> Result<Transaction, RentalError> {
        if amount <= Decimal::ZERO {
            return Err(RentalError::validation("earning must be positive"));
        }
        let mut tx = Transaction::new(
            user,
            TransactionType::RentalEarning,
            amount,
            TransactionStatus::Pending,
        );
        if let Some((rental, item)) = rental {
            tx = tx.for_rental(rental, item);
        }
        let mut appended = self.post(vec![Posting::pending_earning(tx)])?;
        appended
            .pop()
            .ok_or_else(|| RentalError::settlement("earning record was not written"))
    }

    /// Release a pending earning to withdrawable and complete its record
    pub fn release_pending(&self, earning: TransactionId) -> Result<Decimal, RentalError> {
        let tx = self
            .transactions
            .get(earning)
            .ok_or_else(|| RentalError::transaction_not_found(earning))?;
        let amount = tx.amount;
        self.post(vec![Posting::release(&tx)])?;
        Ok(amount)
    }

    /// Cash out `amount` from withdrawable
    pub fn withdraw(&self, user: UserId, amount: Decimal) -> Result<Transaction, RentalError> {
        if amount <= Decimal::ZERO {
            return Err(RentalError::validation(format!(
                "withdrawal amount must be positive, got {}",
                amount
            )));
        }
        let tx = Transaction::new(
            user,
            TransactionType::Withdrawal,
            -amount,
            TransactionStatus::Completed,
        );
        let mut appended = self.post(vec![Posting::withdraw(tx)])?;
        appended
            .pop()
            .ok_or_else(|| RentalError::settlement("withdrawal record was not written"))
    }

    /// Recompute a wallet's balances from its records
    ///
    /// Fails with a settlement error if the stored balances disagree with
    /// what the records add up to.
    pub fn reconcile(&self, user: UserId) -> Result<Reconciliation, RentalError> {
        self.with_wallet_locks([user], || {
            let wallet = self.get_or_create(user);
            let mut expected_pending = Decimal::ZERO;
            let mut expected_withdrawable = Decimal::ZERO;

            for tx in self.transactions.for_user(user) {
                if !tx.moves_balance() {
                    continue;
                }
                match (tx.tx_type, tx.status) {
                    (TransactionType::RentalEarning, TransactionStatus::Pending) => {
                        expected_pending += tx.amount;
                    }
                    (_, TransactionStatus::Completed) => {
                        expected_withdrawable += tx.amount;
                    }
                    _ => {}
                }
            }

            if expected_pending != wallet.pending_balance
                || expected_withdrawable != wallet.withdrawable_balance
            {
                return Err(RentalError::settlement(format!(
                    "wallet of user {} holds pending {} / withdrawable {} but records add up to {} / {}",
                    user,
                    wallet.pending_balance,
                    wallet.withdrawable_balance,
                    expected_pending,
                    expected_withdrawable
                )));
            }

            Ok(Reconciliation {
                wallet,
                expected_pending,
                expected_withdrawable,
            })
        })
    }
}

/// Apply one change to a working wallet copy
///
/// Returns the amount moved for the clamped pending operations.
fn apply_change(wallet: &mut Wallet, change: BalanceChange) -> Result<Option<Decimal>, RentalError> {
    match change {
        BalanceChange::None => Ok(None),
        BalanceChange::AddPending(amount) => wallet.add_pending(amount).map(|_| None),
        BalanceChange::ReleasePending(amount) => wallet.release_pending(amount).map(Some),
        BalanceChange::ReversePending(amount) => Ok(Some(wallet.reverse_pending(amount))),
        BalanceChange::Credit(amount) => wallet.credit(amount).map(|_| None),
        BalanceChange::CreditEarning(amount) => wallet.credit_earning(amount).map(|_| None),
        BalanceChange::Deduct(amount) => wallet.deduct(amount).map(|_| None),
        BalanceChange::Withdraw(amount) => wallet.withdraw(amount).map(|_| None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::thread;
    use uuid::Uuid;

    #[test]
    fn test_get_or_create_creates_once() {
        let ledger = Ledger::new();

        let first = ledger.get_or_create(1);
        let second = ledger.get_or_create(1);

        assert_eq!(first.id, second.id);
        assert_eq!(ledger.all_wallets().len(), 1);
    }

    #[test]
    fn test_concurrent_get_or_create_same_user() {
        let ledger = Arc::new(Ledger::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let ledger = Arc::clone(&ledger);
            handles.push(thread::spawn(move || ledger.get_or_create(7).id));
        }
        let ids: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(ids.len(), 1);
        assert_eq!(ledger.all_wallets().len(), 1);
    }

    #[test]
    fn test_add_pending_earning_writes_one_record() {
        let ledger = Ledger::new();

        let tx = ledger.add_pending_earning(1, dec!(95), None).unwrap();

        let wallet = ledger.get_or_create(1);
        assert_eq!(wallet.pending_balance, dec!(95));
        assert_eq!(wallet.total_balance(), dec!(95));
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.wallet, wallet.id);
        assert_eq!(ledger.transactions().for_user(1), vec![tx]);
    }

    #[test]
    fn test_release_pending_completes_record() {
        let ledger = Ledger::new();
        let tx = ledger.add_pending_earning(1, dec!(95), None).unwrap();

        let released = ledger.release_pending(tx.id).unwrap();

        let wallet = ledger.get_or_create(1);
        assert_eq!(released, dec!(95));
        assert_eq!(wallet.pending_balance, dec!(0));
        assert_eq!(wallet.withdrawable_balance, dec!(95));
        assert_eq!(
            ledger.transactions().get(tx.id).unwrap().status,
            TransactionStatus::Completed
        );
        // Releasing twice is refused.
        assert!(ledger.release_pending(tx.id).is_err());
    }

    #[test]
    fn test_withdraw_insufficient_funds() {
        let ledger = Ledger::new();

        let result = ledger.withdraw(1, dec!(10));

        assert_eq!(
            result,
            Err(RentalError::insufficient_funds(1, dec!(0), dec!(10)))
        );
        assert!(ledger.transactions().is_empty());
    }

    #[test]
    fn test_withdraw_after_release() {
        let ledger = Ledger::new();
        let tx = ledger.add_pending_earning(1, dec!(95), None).unwrap();
        ledger.release_pending(tx.id).unwrap();

        let withdrawal = ledger.withdraw(1, dec!(45)).unwrap();

        let wallet = ledger.get_or_create(1);
        assert_eq!(withdrawal.amount, dec!(-45));
        assert_eq!(wallet.withdrawable_balance, dec!(50));
        assert_eq!(wallet.total_withdrawn, dec!(45));
        assert!(ledger.reconcile(1).is_ok());
    }

    #[test]
    fn test_failed_batch_writes_nothing() {
        let ledger = Ledger::new();
        let rental = Uuid::new_v4();
        let earning = Transaction::new(
            1,
            TransactionType::RentalEarning,
            dec!(95),
            TransactionStatus::Pending,
        )
        .for_rental(rental, 1);
        let withdrawal = Transaction::new(
            2,
            TransactionType::Withdrawal,
            dec!(-10),
            TransactionStatus::Completed,
        );

        let result = ledger.post(vec![
            Posting::pending_earning(earning),
            Posting::withdraw(withdrawal),
        ]);

        assert!(matches!(result, Err(RentalError::InsufficientFunds { .. })));
        assert_eq!(ledger.get_or_create(1).pending_balance, dec!(0));
        assert!(ledger.transactions().is_empty());
    }

    #[test]
    fn test_mismatched_record_is_refused() {
        let ledger = Ledger::new();
        let refund = Transaction::new(
            1,
            TransactionType::Refund,
            dec!(50),
            TransactionStatus::Completed,
        );

        let result = ledger.post(vec![Posting {
            user: 1,
            change: BalanceChange::Credit(dec!(40)),
            entry: Entry::Append(refund.clone()),
        }]);
        assert!(matches!(result, Err(RentalError::SettlementFailure { .. })));

        let result = ledger.post(vec![Posting::record(refund)]);
        assert!(matches!(result, Err(RentalError::SettlementFailure { .. })));
    }

    #[test]
    fn test_record_only_refund_leaves_balances_alone() {
        let ledger = Ledger::new();
        let refund = Transaction::new(
            1,
            TransactionType::Refund,
            dec!(50),
            TransactionStatus::Completed,
        )
        .record_only();

        let result = ledger.post(vec![Posting::credit(refund.clone())]);
        assert!(matches!(result, Err(RentalError::SettlementFailure { .. })));

        ledger.post(vec![Posting::record(refund)]).unwrap();

        let wallet = ledger.get_or_create(1);
        assert_eq!(wallet.withdrawable_balance, dec!(0));
        assert_eq!(ledger.transactions().for_user(1).len(), 1);
        assert!(ledger.reconcile(1).is_ok());
        assert!(ledger.withdraw(1, dec!(50)).is_err());
    }

    #[test]
    fn test_reverse_restores_pending() {
        let ledger = Ledger::new();
        let tx = ledger.add_pending_earning(3, dec!(95), None).unwrap();

        ledger.post(vec![Posting::reverse(&tx)]).unwrap();

        assert_eq!(ledger.get_or_create(3).pending_balance, dec!(0));
        assert_eq!(
            ledger.transactions().get(tx.id).unwrap().status,
            TransactionStatus::Reversed
        );
        assert!(ledger.reconcile(3).is_ok());
    }

    #[test]
    fn test_concurrent_withdrawals_never_overdraw() {
        let ledger = Arc::new(Ledger::new());
        let tx = ledger.add_pending_earning(1, dec!(100), None).unwrap();
        ledger.release_pending(tx.id).unwrap();
        let mut handles = vec![];

        for _ in 0..20 {
            let ledger = Arc::clone(&ledger);
            handles.push(thread::spawn(move || ledger.withdraw(1, dec!(10)).is_ok()));
        }
        let succeeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        let wallet = ledger.get_or_create(1);
        assert_eq!(succeeded, 10);
        assert_eq!(wallet.withdrawable_balance, dec!(0));
        assert_eq!(wallet.total_withdrawn, dec!(100));
        assert!(ledger.reconcile(1).is_ok());
    }
}
