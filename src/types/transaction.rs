//! Ledger transaction types
//!
//! A transaction is an append-only audit record tied to one wallet. Its
//! amount is signed from the wallet owner's point of view: credits are
//! positive, debits negative. Only the status of a pending record may change
//! after it is written.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rental::{ItemId, RentalId, UserId};

/// Transaction identifier
pub type TransactionId = Uuid;

/// Wallet identifier (one wallet per user)
pub type WalletId = Uuid;

/// Kind of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Renter's payment for a confirmed rental (captured externally)
    RentalPayment,
    /// Seller's net earning for a rental
    RentalEarning,
    /// Renter's security deposit, captured externally and held
    SecurityDepositHold,
    /// Security deposit returned to the renter
    SecurityDepositRelease,
    /// Money returned to a renter (cancellation), or the audit record of a
    /// rejected request
    Refund,
    /// Damage charged against the seller's earning at completion
    DamageDeduction,
    /// Cash-out of withdrawable balance
    Withdrawal,
    /// Platform commission withheld from the seller's gross
    PlatformFee,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::RentalPayment => "rental_payment",
            TransactionType::RentalEarning => "rental_earning",
            TransactionType::SecurityDepositHold => "security_deposit_hold",
            TransactionType::SecurityDepositRelease => "security_deposit_release",
            TransactionType::Refund => "refund",
            TransactionType::DamageDeduction => "damage_deduction",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::PlatformFee => "platform_fee",
        }
    }

    /// Whether entries of this type move the wallet's own balances
    ///
    /// Payments, deposit holds and platform fees describe money that moves
    /// through the external gateway; they are recorded for audit only.
    pub fn moves_balance(&self) -> bool {
        !matches!(
            self,
            TransactionType::RentalPayment
                | TransactionType::SecurityDepositHold
                | TransactionType::PlatformFee
        )
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement state of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Reversed => "reversed",
        }
    }

    /// Only pending entries settle; every other status is final
    pub fn can_become(&self, target: TransactionStatus) -> bool {
        *self == TransactionStatus::Pending && target != TransactionStatus::Pending
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub wallet: WalletId,
    pub user: UserId,
    pub rental: Option<RentalId>,
    pub item: Option<ItemId>,
    /// Signed from the wallet owner's point of view
    pub amount: Decimal,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub metadata: BTreeMap<String, String>,
    /// Set on entries of a balance-moving type that document money which
    /// never reached the wallet, such as the refund of a request that was
    /// never charged
    #[serde(default)]
    pub record_only: bool,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Start a new entry; the wallet id is filled in by the ledger
    pub fn new(
        user: UserId,
        tx_type: TransactionType,
        amount: Decimal,
        status: TransactionStatus,
    ) -> Self {
        Transaction {
            id: Uuid::new_v4(),
            wallet: Uuid::nil(),
            user,
            rental: None,
            item: None,
            amount,
            tx_type,
            status,
            metadata: BTreeMap::new(),
            record_only: false,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    pub fn for_rental(mut self, rental: RentalId, item: ItemId) -> Self {
        self.rental = Some(rental);
        self.item = Some(item);
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Mark the entry as audit only
    pub fn record_only(mut self) -> Self {
        self.record_only = true;
        self
    }

    /// Whether this entry is counted in the wallet's balances
    pub fn moves_balance(&self) -> bool {
        !self.record_only && self.tx_type.moves_balance()
    }
}
