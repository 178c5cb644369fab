//! Error types for the rental settlement engine
//!
//! This module defines every error the engine can surface to a caller.
//! Errors carry enough context (rental, item, user ids) to be logged or
//! returned as-is by a routing layer.
//!
//! # Error Categories
//!
//! - **Validation**: malformed interval, non-positive amount. Rejected before any write.
//! - **Conflict**: the requested interval overlaps a granted rental.
//! - **Invalid state**: the transition is not legal from the rental's current status.
//! - **Insufficient funds**: withdrawal larger than the withdrawable balance.
//! - **Settlement failure**: a step of the atomic settlement unit failed; nothing was applied.
//! - **Lookup / collaborator errors**: unknown ids, a port call failing.
//! - **File / CSV errors**: only raised on the replay path.

use rust_decimal::Decimal;
use thiserror::Error;

use super::rental::{ItemId, RentalId, RentalStatus, UserId};
use super::transaction::TransactionId;

/// Main error type for the rental settlement engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RentalError {
    /// Input rejected before any write (bad interval, non-positive amount, ...)
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what was invalid
        message: String,
    },

    /// Requested interval overlaps a granted rental on the same item
    #[error("Interval for item {item} conflicts with rental {conflicting}")]
    Conflict {
        /// Item being booked
        item: ItemId,
        /// The granted rental that occupies the window
        conflicting: RentalId,
    },

    /// Transition is not legal from the rental's current status
    #[error("Cannot {action} rental {rental} in status {status}")]
    InvalidState {
        /// Rental the transition was attempted on
        rental: RentalId,
        /// Status the rental was in
        status: RentalStatus,
        /// Attempted action
        action: String,
    },

    /// Withdrawal larger than the withdrawable balance
    #[error("Insufficient funds for user {user}: withdrawable {available}, requested {requested}")]
    InsufficientFunds {
        /// Wallet owner
        user: UserId,
        /// Withdrawable balance at the time of the request
        available: Decimal,
        /// Requested withdrawal amount
        requested: Decimal,
    },

    /// A step of the settlement unit failed; no write of the unit was applied
    #[error("Settlement failed: {message}")]
    SettlementFailure {
        /// Description of the failed step
        message: String,
    },

    #[error("Rental {rental} not found")]
    RentalNotFound { rental: RentalId },

    #[error("Item {item} not found")]
    ItemNotFound { item: ItemId },

    #[error("User {user} not found")]
    UserNotFound { user: UserId },

    #[error("Transaction {tx} not found")]
    TransactionNotFound { tx: TransactionId },

    /// Balance arithmetic would overflow
    #[error("Arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Wallet owner
        user: UserId,
    },

    /// A collaborator (catalog, identity, dispatch) call failed
    #[error("{collaborator} error: {message}")]
    Collaborator {
        /// Which collaborator failed
        collaborator: String,
        /// Description reported by the collaborator
        message: String,
    },

    /// I/O error while reading intents or writing output
    #[error("I/O error: {message}")]
    Io { message: String },

    /// CSV parsing error on the replay path
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

impl From<std::io::Error> for RentalError {
    fn from(error: std::io::Error) -> Self {
        RentalError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for RentalError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        RentalError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl RentalError {
    pub fn validation(message: impl Into<String>) -> Self {
        RentalError::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(item: ItemId, conflicting: RentalId) -> Self {
        RentalError::Conflict { item, conflicting }
    }

    pub fn invalid_state(rental: RentalId, status: RentalStatus, action: &str) -> Self {
        RentalError::InvalidState {
            rental,
            status,
            action: action.to_string(),
        }
    }

    pub fn insufficient_funds(user: UserId, available: Decimal, requested: Decimal) -> Self {
        RentalError::InsufficientFunds {
            user,
            available,
            requested,
        }
    }

    pub fn settlement(message: impl Into<String>) -> Self {
        RentalError::SettlementFailure {
            message: message.into(),
        }
    }

    pub fn rental_not_found(rental: RentalId) -> Self {
        RentalError::RentalNotFound { rental }
    }

    pub fn item_not_found(item: ItemId) -> Self {
        RentalError::ItemNotFound { item }
    }

    pub fn user_not_found(user: UserId) -> Self {
        RentalError::UserNotFound { user }
    }

    pub fn transaction_not_found(tx: TransactionId) -> Self {
        RentalError::TransactionNotFound { tx }
    }

    pub fn arithmetic_overflow(operation: &str, user: UserId) -> Self {
        RentalError::ArithmeticOverflow {
            operation: operation.to_string(),
            user,
        }
    }

    pub fn collaborator(collaborator: &str, message: impl Into<String>) -> Self {
        RentalError::Collaborator {
            collaborator: collaborator.to_string(),
            message: message.into(),
        }
    }

    /// Whether the error was raised before any write was attempted
    ///
    /// Everything except a settlement failure is detected during planning or
    /// validation. Settlement failures are also write-free (the unit is rolled
    /// back), but they signal a problem in a collaborator or in the ledger.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            RentalError::SettlementFailure { .. }
                | RentalError::Collaborator { .. }
                | RentalError::Io { .. }
        )
    }
}
