//! Rental Settlement Engine Library
//! # Overview
//!
//! This library books peer-to-peer rentals and settles their money: it
//! decides which requests may hold an item over an interval, moves rentals
//! through their lifecycle and keeps every wallet consistent with an
//! append-only transaction log.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Rental, Wallet, Transaction, etc.)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::conflict`] - Interval conflict resolution
//!   - [`core::state_machine`] - Rental transitions and the side effects they request
//!   - [`core::ledger`] - Wallet balances and postings
//!   - [`core::settlement`] - All-or-nothing settlement units
//!   - [`core::engine`] - Settlement orchestration, locking and timers
//! - [`io`] - CSV intent input and wallet output
//! - [`strategy`] - Sync and async replay pipelines
//!
//! # Money Flow
//!
//! - **Approve**: the owner's net earning goes to pending; the platform fee
//!   is recorded; the deposit is held; overlapping requests are rejected
//!   with a refund record. Requests are never charged, so that refund moves
//!   no balance.
//! - **Complete**: pending moves to withdrawable; extensions are credited;
//!   damage is deducted and the deposit retained, otherwise released.
//! - **Cancel**: the pending earning is reversed and the renter refunded.
//! - **Withdraw**: only ever from the withdrawable balance.

pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{Ledger, SettlementEngine, TransactionStore};
pub use io::write_wallets_csv;
pub use types::{
    DeliveryStatus, Interval, Rental, RentalError, RentalId, RentalStatus, Transaction,
    TransactionId, TransactionType, UserId, Wallet,
};
