//! Wallet types
//!
//! This module defines the per-user wallet and its balance operations.
//! Every operation here is pure: it validates, mutates the in-memory value
//! and reports what it did. Pairing each mutation with a ledger record is the
//! ledger's job.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::RentalError;
use super::rental::UserId;
use super::transaction::WalletId;

/// Per-user wallet
///
/// `total_balance` is not a field: it is always `pending + withdrawable`,
/// computed from the two balances it is made of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user: UserId,

    /// Earnings credited but not yet releasable (rental not completed)
    pub pending_balance: Decimal,

    /// Funds the user may cash out
    pub withdrawable_balance: Decimal,

    /// Lifetime earnings released to withdrawable, net of damage
    pub total_earnings: Decimal,

    /// Lifetime withdrawals
    pub total_withdrawn: Decimal,
}

impl Wallet {
    /// Create an empty wallet for `user`
    pub fn new(user: UserId) -> Self {
        Wallet {
            id: Uuid::new_v4(),
            user,
            pending_balance: Decimal::ZERO,
            withdrawable_balance: Decimal::ZERO,
            total_earnings: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
        }
    }

    pub fn total_balance(&self) -> Decimal {
        self.pending_balance + self.withdrawable_balance
    }

    /// `pending += amount`
    pub fn add_pending(&mut self, amount: Decimal) -> Result<(), RentalError> {
        self.pending_balance = self
            .pending_balance
            .checked_add(amount)
            .ok_or_else(|| RentalError::arithmetic_overflow("add pending", self.user))?;
        Ok(())
    }

    /// Move up to `amount` from pending to withdrawable
    ///
    /// The move is clamped to the pending balance. Returns the amount actually
    /// released, which is also added to lifetime earnings.
    pub fn release_pending(&mut self, amount: Decimal) -> Result<Decimal, RentalError> {
        let released = amount.min(self.pending_balance).max(Decimal::ZERO);
        let withdrawable = self
            .withdrawable_balance
            .checked_add(released)
            .ok_or_else(|| RentalError::arithmetic_overflow("release pending", self.user))?;
        let earnings = self
            .total_earnings
            .checked_add(released)
            .ok_or_else(|| RentalError::arithmetic_overflow("release pending", self.user))?;

        self.pending_balance -= released;
        self.withdrawable_balance = withdrawable;
        self.total_earnings = earnings;
        Ok(released)
    }

    /// Take back up to `amount` of pending earnings; never goes below zero
    pub fn reverse_pending(&mut self, amount: Decimal) -> Decimal {
        let reversed = amount.min(self.pending_balance).max(Decimal::ZERO);
        self.pending_balance -= reversed;
        reversed
    }

    /// `withdrawable += amount` (refunds, deposit releases)
    pub fn credit(&mut self, amount: Decimal) -> Result<(), RentalError> {
        self.withdrawable_balance = self
            .withdrawable_balance
            .checked_add(amount)
            .ok_or_else(|| RentalError::arithmetic_overflow("credit", self.user))?;
        Ok(())
    }

    /// Credit an earning straight to withdrawable
    pub fn credit_earning(&mut self, amount: Decimal) -> Result<(), RentalError> {
        self.credit(amount)?;
        self.total_earnings = self
            .total_earnings
            .checked_add(amount)
            .ok_or_else(|| RentalError::arithmetic_overflow("credit earning", self.user))?;
        Ok(())
    }

    /// Charge a deduction against released earnings
    pub fn deduct(&mut self, amount: Decimal) -> Result<(), RentalError> {
        if amount > self.withdrawable_balance {
            return Err(RentalError::insufficient_funds(
                self.user,
                self.withdrawable_balance,
                amount,
            ));
        }
        self.withdrawable_balance -= amount;
        self.total_earnings = (self.total_earnings - amount).max(Decimal::ZERO);
        Ok(())
    }

    /// Cash out; fails if `amount` exceeds the withdrawable balance
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), RentalError> {
        if amount > self.withdrawable_balance {
            return Err(RentalError::insufficient_funds(
                self.user,
                self.withdrawable_balance,
                amount,
            ));
        }
        let withdrawn = self
            .total_withdrawn
            .checked_add(amount)
            .ok_or_else(|| RentalError::arithmetic_overflow("withdraw", self.user))?;

        self.withdrawable_balance -= amount;
        self.total_withdrawn = withdrawn;
        Ok(())
    }
}
