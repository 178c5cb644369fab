//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `rental`: Rentals, intervals, status enums, catalog/identity records
//! - `wallet`: Per-user wallet and balance operations
//! - `transaction`: Ledger entries and identifiers
//! - `intent`: Inbound requests as read by the replay path
//! - `error`: Error types for the engine

pub mod error;
pub mod intent;
pub mod rental;
pub mod transaction;
pub mod wallet;

pub use error::RentalError;
pub use intent::{Intent, RentalRef};
pub use rental::{
    DeliveryStatus, Interval, Item, ItemId, Rental, RentalId, RentalRequest, RentalStatus,
    StatusTimestamps, User, UserId,
};
pub use transaction::{Transaction, TransactionId, TransactionStatus, TransactionType, WalletId};
pub use wallet::Wallet;
