//! Append-only transaction log
//!
//! This module provides the TransactionStore that keeps every ledger entry
//! ever written. Entries are never removed or rewritten; the only permitted
//! change is settling a pending entry to completed, failed or reversed.
//!
//! # Indexes
//!
//! Entries are indexed by rental and by user so the orchestrator can find a
//! rental's pending earning and the ledger can reconcile a wallet without a
//! full scan.
//!
//! # Thread Safety
//!
//! Backed by `DashMap`. Callers that need several entries to appear together
//! (a settlement unit) hold the relevant wallet locks while appending.

use chrono::Utc;
use dashmap::DashMap;

use crate::types::{
    RentalError, RentalId, Transaction, TransactionId, TransactionStatus, TransactionType, UserId,
};

/// Thread-safe append-only ledger log
#[derive(Debug, Default)]
pub struct TransactionStore {
    transactions: DashMap<TransactionId, Transaction>,
    by_rental: DashMap<RentalId, Vec<TransactionId>>,
    by_user: DashMap<UserId, Vec<TransactionId>>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    ///
    /// If an entry with the same id already exists it is left untouched
    /// (first write wins), so re-appending a record is harmless.
    pub fn append(&self, tx: Transaction) {
        let id = tx.id;
        let rental = tx.rental;
        let user = tx.user;

        let mut inserted = false;
        self.transactions.entry(id).or_insert_with(|| {
            inserted = true;
            tx
        });
        if !inserted {
            return;
        }

        if let Some(rental) = rental {
            self.by_rental.entry(rental).or_default().push(id);
        }
        self.by_user.entry(user).or_default().push(id);
    }

    pub fn get(&self, tx_id: TransactionId) -> Option<Transaction> {
        self.transactions.get(&tx_id).map(|entry| entry.value().clone())
    }

    /// Check that `tx_id` can move to `target` without changing anything
    pub fn check_settle(
        &self,
        tx_id: TransactionId,
        target: TransactionStatus,
    ) -> Result<Transaction, RentalError> {
        let tx = self
            .get(tx_id)
            .ok_or_else(|| RentalError::transaction_not_found(tx_id))?;
        if !tx.status.can_become(target) {
            return Err(RentalError::settlement(format!(
                "transaction {} is {} and cannot become {}",
                tx_id, tx.status, target
            )));
        }
        Ok(tx)
    }

    /// Settle a pending entry
    pub fn settle(
        &self,
        tx_id: TransactionId,
        target: TransactionStatus,
    ) -> Result<(), RentalError> {
        let mut entry = self
            .transactions
            .get_mut(&tx_id)
            .ok_or_else(|| RentalError::transaction_not_found(tx_id))?;
        let tx = entry.value_mut();
        if !tx.status.can_become(target) {
            return Err(RentalError::settlement(format!(
                "transaction {} is {} and cannot become {}",
                tx_id, tx.status, target
            )));
        }
        tx.status = target;
        tx.settled_at = Some(Utc::now());
        Ok(())
    }

    /// All entries for a rental, in append order
    pub fn for_rental(&self, rental: RentalId) -> Vec<Transaction> {
        self.collect(self.by_rental.get(&rental).map(|ids| ids.value().clone()))
    }

    /// All entries for a user's wallet, in append order
    pub fn for_user(&self, user: UserId) -> Vec<Transaction> {
        self.collect(self.by_user.get(&user).map(|ids| ids.value().clone()))
    }

    /// The entry of `tx_type` for `rental` that is still pending, if any
    pub fn pending_for_rental(
        &self,
        rental: RentalId,
        tx_type: TransactionType,
    ) -> Option<Transaction> {
        self.for_rental(rental)
            .into_iter()
            .find(|tx| tx.tx_type == tx_type && tx.status == TransactionStatus::Pending)
    }

    /// Completed entries of `tx_type` for `rental`
    pub fn completed_for_rental(
        &self,
        rental: RentalId,
        tx_type: TransactionType,
    ) -> Vec<Transaction> {
        self.for_rental(rental)
            .into_iter()
            .filter(|tx| tx.tx_type == tx_type && tx.status == TransactionStatus::Completed)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn collect(&self, ids: Option<Vec<TransactionId>>) -> Vec<Transaction> {
        ids.unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.get(id))
            .collect()
    }
}
