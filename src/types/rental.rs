//! Rental-related types
//!
//! This module defines the rental record, its status and delivery sub-status,
//! the booking interval, and the catalog/identity records the engine reads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::RentalError;

/// Rental identifier, generated by the engine on request creation
pub type RentalId = Uuid;

/// Catalog item identifier
pub type ItemId = u32;

/// User identifier (renters, owners)
pub type UserId = u32;

/// Booking window from `start` to `end`
///
/// The interval is the single source of truth for a rental's duration.
/// Hour and day counts are derived from it, never stored next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Interval {
    /// Create an interval, rejecting zero-length and inverted windows
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, RentalError> {
        if start >= end {
            return Err(RentalError::validation(format!(
                "interval start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whole hours covered, rounded up
    pub fn duration_hours(&self) -> i64 {
        let secs = self.duration().num_seconds();
        (secs + 3599) / 3600
    }

    /// Whole days covered, rounded up
    pub fn duration_days(&self) -> i64 {
        let secs = self.duration().num_seconds();
        (secs + 86_399) / 86_400
    }

    /// Closed-interval overlap test
    ///
    /// Two windows that merely touch (one ends exactly when the other starts)
    /// are treated as overlapping, so hand-over days cannot be double-booked.
    pub fn overlaps(&self, other: &Interval) -> bool {
        other.start <= self.end && other.end >= self.start
    }

    /// Same start, end pushed out by `additional`
    pub fn extended_by(&self, additional: Duration) -> Result<Self, RentalError> {
        if additional <= Duration::zero() {
            return Err(RentalError::validation(
                "extension duration must be positive",
            ));
        }
        let end = self
            .end
            .checked_add_signed(additional)
            .ok_or_else(|| RentalError::validation("extension overflows the calendar"))?;
        Interval::new(self.start, end)
    }
}

/// Lifecycle status of a rental
///
/// Terminal statuses are `Completed`, `Rejected` and `Cancelled`. Terminal
/// rentals are kept as history, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Requested,
    Confirmed,
    PickedUp,
    Active,
    Returned,
    Completed,
    Rejected,
    Cancelled,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Requested => "requested",
            RentalStatus::Confirmed => "confirmed",
            RentalStatus::PickedUp => "picked_up",
            RentalStatus::Active => "active",
            RentalStatus::Returned => "returned",
            RentalStatus::Completed => "completed",
            RentalStatus::Rejected => "rejected",
            RentalStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RentalStatus::Completed | RentalStatus::Rejected | RentalStatus::Cancelled
        )
    }

    /// Granted rentals occupy the item's calendar
    pub fn is_granted(&self) -> bool {
        matches!(
            self,
            RentalStatus::Confirmed | RentalStatus::PickedUp | RentalStatus::Active
        )
    }
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery sub-status, driven by the external dispatch collaborator
///
/// Variants are declared in delivery order; the derived ordering is used to
/// reject events that would move a delivery backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    NotAssigned,
    Assigned,
    PickedFromSeller,
    InTransitToBuyer,
    DeliveredToBuyer,
    PickedFromBuyer,
    InTransitToSeller,
    ReturnedToSeller,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::NotAssigned => "not_assigned",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::PickedFromSeller => "picked_from_seller",
            DeliveryStatus::InTransitToBuyer => "in_transit_to_buyer",
            DeliveryStatus::DeliveredToBuyer => "delivered_to_buyer",
            DeliveryStatus::PickedFromBuyer => "picked_from_buyer",
            DeliveryStatus::InTransitToSeller => "in_transit_to_seller",
            DeliveryStatus::ReturnedToSeller => "returned_to_seller",
        }
    }

    /// Outbound leg: seller to buyer
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Assigned
                | DeliveryStatus::PickedFromSeller
                | DeliveryStatus::InTransitToBuyer
                | DeliveryStatus::DeliveredToBuyer
        )
    }

    /// Return leg: buyer to seller
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::PickedFromBuyer
                | DeliveryStatus::InTransitToSeller
                | DeliveryStatus::ReturnedToSeller
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = RentalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "not_assigned" => Ok(DeliveryStatus::NotAssigned),
            "assigned" => Ok(DeliveryStatus::Assigned),
            "picked_from_seller" => Ok(DeliveryStatus::PickedFromSeller),
            "in_transit_to_buyer" => Ok(DeliveryStatus::InTransitToBuyer),
            "delivered_to_buyer" => Ok(DeliveryStatus::DeliveredToBuyer),
            "picked_from_buyer" => Ok(DeliveryStatus::PickedFromBuyer),
            "in_transit_to_seller" => Ok(DeliveryStatus::InTransitToSeller),
            "returned_to_seller" => Ok(DeliveryStatus::ReturnedToSeller),
            other => Err(RentalError::validation(format!(
                "unknown delivery status '{}'",
                other
            ))),
        }
    }
}

/// When each status was entered
///
/// Each field is written at most once; re-entering a status (which the
/// transition table never allows) or replaying an event leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTimestamps {
    pub requested_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub active_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    fn slot(&mut self, status: RentalStatus) -> &mut Option<DateTime<Utc>> {
        match status {
            RentalStatus::Requested => &mut self.requested_at,
            RentalStatus::Confirmed => &mut self.confirmed_at,
            RentalStatus::PickedUp => &mut self.picked_up_at,
            RentalStatus::Active => &mut self.active_at,
            RentalStatus::Returned => &mut self.returned_at,
            RentalStatus::Completed => &mut self.completed_at,
            RentalStatus::Rejected => &mut self.rejected_at,
            RentalStatus::Cancelled => &mut self.cancelled_at,
        }
    }

    /// Record entry into `status` unless already recorded
    pub fn stamp(&mut self, status: RentalStatus, at: DateTime<Utc>) {
        self.slot(status).get_or_insert(at);
    }

    pub fn entered(&self, status: RentalStatus) -> Option<DateTime<Utc>> {
        match status {
            RentalStatus::Requested => self.requested_at,
            RentalStatus::Confirmed => self.confirmed_at,
            RentalStatus::PickedUp => self.picked_up_at,
            RentalStatus::Active => self.active_at,
            RentalStatus::Returned => self.returned_at,
            RentalStatus::Completed => self.completed_at,
            RentalStatus::Rejected => self.rejected_at,
            RentalStatus::Cancelled => self.cancelled_at,
        }
    }
}

/// A booking request as received from the routing layer
#[derive(Debug, Clone, PartialEq)]
pub struct RentalRequest {
    pub item: ItemId,
    pub renter: UserId,
    pub interval: Interval,
    pub total_amount: Decimal,
    pub security_deposit: Decimal,
}

impl RentalRequest {
    pub fn new(item: ItemId, renter: UserId, interval: Interval, total_amount: Decimal) -> Self {
        Self {
            item,
            renter,
            interval,
            total_amount,
            security_deposit: Decimal::ZERO,
        }
    }

    pub fn with_deposit(mut self, security_deposit: Decimal) -> Self {
        self.security_deposit = security_deposit;
        self
    }

    /// Amount checks that do not need any stored state
    pub fn validate(&self) -> Result<(), RentalError> {
        if self.total_amount <= Decimal::ZERO {
            return Err(RentalError::validation(format!(
                "total amount must be positive, got {}",
                self.total_amount
            )));
        }
        if self.security_deposit < Decimal::ZERO {
            return Err(RentalError::validation(format!(
                "security deposit cannot be negative, got {}",
                self.security_deposit
            )));
        }
        Ok(())
    }
}

/// The central rental record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rental {
    pub id: RentalId,
    pub item: ItemId,
    pub renter: UserId,
    pub owner: UserId,
    pub interval: Interval,
    pub status: RentalStatus,
    pub delivery_status: DeliveryStatus,

    /// Fixed at creation; only an extension raises it
    pub total_amount: Decimal,
    /// Part of `total_amount` added by extensions, settled at completion
    pub extension_amount: Decimal,
    pub security_deposit: Decimal,
    /// Platform's cut, set when the rental is confirmed
    pub platform_commission: Decimal,
    /// Seller's net after commission and damage, set at completion
    pub final_seller_earning: Decimal,
    /// Applied exactly once, at completion
    pub damage_deduction: Decimal,
    /// Amount returned to the renter on rejection or cancellation
    pub refund_amount: Decimal,

    pub timestamps: StatusTimestamps,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl Rental {
    /// Build a fresh `requested` rental from a validated request
    pub fn from_request(request: &RentalRequest, owner: UserId, now: DateTime<Utc>) -> Self {
        let mut timestamps = StatusTimestamps::default();
        timestamps.stamp(RentalStatus::Requested, now);

        Rental {
            id: Uuid::new_v4(),
            item: request.item,
            renter: request.renter,
            owner,
            interval: request.interval,
            status: RentalStatus::Requested,
            delivery_status: DeliveryStatus::NotAssigned,
            total_amount: request.total_amount,
            extension_amount: Decimal::ZERO,
            security_deposit: request.security_deposit,
            platform_commission: Decimal::ZERO,
            final_seller_earning: Decimal::ZERO,
            damage_deduction: Decimal::ZERO,
            refund_amount: Decimal::ZERO,
            timestamps,
            rejection_reason: None,
            cancellation_reason: None,
        }
    }

    pub fn is_granted(&self) -> bool {
        self.status.is_granted()
    }

    /// Amount approved and paid up front, before any extension
    pub fn approved_amount(&self) -> Decimal {
        self.total_amount - self.extension_amount
    }
}

/// Catalog view of an item, as far as the engine needs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub owner: UserId,
    pub available: bool,
    pub price: Decimal,
}

/// Identity view of a user: existence only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
}
