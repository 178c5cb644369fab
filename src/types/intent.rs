//! Replay intents
//!
//! An intent is one inbound request, as the routing layer would hand it to
//! the engine. The replay path reads intents from CSV; rentals are referred to
//! by a caller-chosen label because the engine assigns the real rental id.

use chrono::Duration;
use rust_decimal::Decimal;

use super::rental::{DeliveryStatus, Interval, ItemId, UserId};

/// Caller-chosen label for a rental in a replay stream
pub type RentalRef = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Register a user with the in-memory identity collaborator
    RegisterUser { user: UserId },

    /// List an item with the in-memory catalog collaborator
    ListItem {
        item: ItemId,
        owner: UserId,
        price: Decimal,
    },

    Request {
        rental: RentalRef,
        item: ItemId,
        renter: UserId,
        interval: Interval,
        total_amount: Decimal,
        security_deposit: Decimal,
    },

    Approve { rental: RentalRef },

    Reject {
        rental: RentalRef,
        reason: Option<String>,
    },

    Delivery {
        rental: RentalRef,
        status: DeliveryStatus,
    },

    Cancel {
        rental: RentalRef,
        reason: Option<String>,
    },

    Extend {
        rental: RentalRef,
        additional: Duration,
    },

    Damage { rental: RentalRef, amount: Decimal },

    Complete { rental: RentalRef },

    Hold { rental: RentalRef },

    Withdraw { user: UserId, amount: Decimal },
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::RegisterUser { .. } => "user",
            Intent::ListItem { .. } => "item",
            Intent::Request { .. } => "request",
            Intent::Approve { .. } => "approve",
            Intent::Reject { .. } => "reject",
            Intent::Delivery { .. } => "delivery",
            Intent::Cancel { .. } => "cancel",
            Intent::Extend { .. } => "extend",
            Intent::Damage { .. } => "damage",
            Intent::Complete { .. } => "complete",
            Intent::Hold { .. } => "hold",
            Intent::Withdraw { .. } => "withdraw",
        }
    }

    /// Rental label this intent acts on, if any
    pub fn rental_ref(&self) -> Option<RentalRef> {
        match self {
            Intent::Request { rental, .. }
            | Intent::Approve { rental }
            | Intent::Reject { rental, .. }
            | Intent::Delivery { rental, .. }
            | Intent::Cancel { rental, .. }
            | Intent::Extend { rental, .. }
            | Intent::Damage { rental, .. }
            | Intent::Complete { rental }
            | Intent::Hold { rental } => Some(*rental),
            Intent::RegisterUser { .. } | Intent::ListItem { .. } | Intent::Withdraw { .. } => {
                None
            }
        }
    }
}
