//! Rental state machine
//!
//! This module owns the transition table of a rental. Given the current
//! record and an event, [`plan`] decides whether the event is legal, which
//! status (and delivery sub-status) it leads to, and which side effects the
//! orchestrator has to carry out. Nothing here writes anything.
//!
//! # Transition Table
//!
//! | From                           | Event                       | To          |
//! |--------------------------------|-----------------------------|-------------|
//! | requested                      | approve                     | confirmed   |
//! | requested                      | reject                      | rejected    |
//! | confirmed                      | delivery: assigned          | confirmed   |
//! | confirmed / picked_up          | delivery: picked_from_seller, in_transit_to_buyer | picked_up |
//! | confirmed / picked_up          | delivery: delivered_to_buyer | active     |
//! | active                         | delivery: picked_from_buyer, in_transit_to_seller | active |
//! | active                         | delivery: returned_to_seller | returned   |
//! | returned                       | complete                    | completed   |
//! | requested / confirmed / picked_up / active | cancel          | cancelled   |
//!
//! # Idempotency
//!
//! An event whose target has already been reached plans to
//! [`Decision::AlreadyApplied`] instead of an error, so a re-delivered event
//! is a no-op. Delivery events that would move the delivery backwards are
//! refused.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::{DeliveryStatus, Interval, Rental, RentalError, RentalStatus};

/// An event applied to one rental
#[derive(Debug, Clone, PartialEq)]
pub enum RentalEvent {
    Approve,
    Reject { reason: Option<String> },
    Delivery(DeliveryStatus),
    Cancel { reason: Option<String> },
    Complete,
}

impl RentalEvent {
    pub fn action(&self) -> &'static str {
        match self {
            RentalEvent::Approve => "approve",
            RentalEvent::Reject { .. } => "reject",
            RentalEvent::Delivery(status) => status.as_str(),
            RentalEvent::Cancel { .. } => "cancel",
            RentalEvent::Complete => "complete",
        }
    }
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Mark the item unavailable
    ReserveItem,
    /// Mark the item available, unless another granted rental still holds it
    ReleaseItem,
    /// Renter payment, seller pending earning, platform fee, deposit hold
    PostApproval,
    /// Reject and refund overlapping `requested` rentals on the item
    RejectSiblings,
    /// Undo an approval: reverse the earning, refund the renter, release the deposit
    ReverseApproval,
    /// Release the earning, settle extensions, damage and deposit
    SettleCompletion,
    /// Start the deferred completion timer
    ScheduleCompletion,
    /// Drop any pending completion timer
    CancelCompletion,
    /// Ask the dispatch collaborator to assign a delivery partner
    AssignDelivery,
}

/// A legal, not yet applied transition
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: RentalStatus,
    pub to: RentalStatus,
    pub delivery: Option<DeliveryStatus>,
    pub reason: Option<String>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn new(from: RentalStatus, to: RentalStatus) -> Self {
        Transition {
            from,
            to,
            delivery: None,
            reason: None,
            effects: Vec::new(),
        }
    }

    fn with_effects(mut self, effects: &[Effect]) -> Self {
        self.effects.extend_from_slice(effects);
        self
    }

    fn with_delivery(mut self, delivery: DeliveryStatus) -> Self {
        self.delivery = Some(delivery);
        self
    }

    fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn has(&self, effect: Effect) -> bool {
        self.effects.contains(&effect)
    }

    /// Write status, delivery sub-status, timestamp and reason to `rental`
    ///
    /// Money fields are left to the orchestrator.
    pub fn apply_to(&self, rental: &mut Rental, now: DateTime<Utc>) {
        if self.to != rental.status {
            rental.status = self.to;
            rental.timestamps.stamp(self.to, now);
        }
        if let Some(delivery) = self.delivery {
            rental.delivery_status = delivery;
        }
        match self.to {
            RentalStatus::Rejected if rental.rejection_reason.is_none() => {
                rental.rejection_reason = self.reason.clone();
            }
            RentalStatus::Cancelled if rental.cancellation_reason.is_none() => {
                rental.cancellation_reason = self.reason.clone();
            }
            _ => {}
        }
    }
}

/// Outcome of planning an event
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The event was already applied; nothing to do
    AlreadyApplied,
    Apply(Transition),
}

/// Decide what `event` does to `rental`
pub fn plan(rental: &Rental, event: &RentalEvent) -> Result<Decision, RentalError> {
    use RentalStatus::*;

    let status = rental.status;
    let refuse = || Err(RentalError::invalid_state(rental.id, status, event.action()));

    match event {
        RentalEvent::Approve => match status {
            Requested => Ok(Decision::Apply(Transition::new(status, Confirmed).with_effects(&[
                Effect::ReserveItem,
                Effect::PostApproval,
                Effect::RejectSiblings,
                Effect::AssignDelivery,
            ]))),
            Confirmed | PickedUp | Active | Returned | Completed => Ok(Decision::AlreadyApplied),
            Rejected | Cancelled => refuse(),
        },

        RentalEvent::Reject { reason } => match status {
            Requested => Ok(Decision::Apply(
                Transition::new(status, Rejected).with_reason(reason.clone()),
            )),
            Rejected => Ok(Decision::AlreadyApplied),
            _ => refuse(),
        },

        RentalEvent::Cancel { reason } => match status {
            Requested => Ok(Decision::Apply(
                Transition::new(status, Cancelled).with_reason(reason.clone()),
            )),
            Confirmed | PickedUp | Active => Ok(Decision::Apply(
                Transition::new(status, Cancelled)
                    .with_reason(reason.clone())
                    .with_effects(&[
                        Effect::ReverseApproval,
                        Effect::ReleaseItem,
                        Effect::CancelCompletion,
                    ]),
            )),
            Cancelled => Ok(Decision::AlreadyApplied),
            Returned | Completed | Rejected => refuse(),
        },

        RentalEvent::Complete => match status {
            Returned => Ok(Decision::Apply(
                Transition::new(status, Completed)
                    .with_effects(&[Effect::SettleCompletion, Effect::CancelCompletion]),
            )),
            Completed => Ok(Decision::AlreadyApplied),
            _ => refuse(),
        },

        RentalEvent::Delivery(delivery) => plan_delivery(rental, *delivery),
    }
}

fn plan_delivery(rental: &Rental, delivery: DeliveryStatus) -> Result<Decision, RentalError> {
    use DeliveryStatus::*;
    use RentalStatus::*;

    let status = rental.status;
    if delivery == rental.delivery_status {
        return Ok(Decision::AlreadyApplied);
    }
    let refuse = || {
        Err(RentalError::invalid_state(
            rental.id,
            status,
            &format!("mark {} for", delivery),
        ))
    };
    if delivery < rental.delivery_status {
        return refuse();
    }

    let transition = match (status, delivery) {
        (Confirmed, Assigned) => Transition::new(status, Confirmed),
        (Confirmed | PickedUp, PickedFromSeller | InTransitToBuyer) => {
            Transition::new(status, PickedUp)
        }
        (Confirmed | PickedUp, DeliveredToBuyer) => {
            Transition::new(status, Active).with_effects(&[Effect::ReserveItem])
        }
        (Active, PickedFromBuyer | InTransitToSeller) => Transition::new(status, Active),
        (Active, ReturnedToSeller) => Transition::new(status, Returned)
            .with_effects(&[Effect::ReleaseItem, Effect::ScheduleCompletion]),
        _ => return refuse(),
    };

    Ok(Decision::Apply(transition.with_delivery(delivery)))
}

/// A planned extension of an active rental
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub interval: Interval,
    /// Prorated cost of the added time
    pub extra_amount: Decimal,
}

/// Plan extending `rental` by `additional`
///
/// Only active rentals can be extended. The added cost is prorated from the
/// current total over the current duration. Checking the new window against
/// other granted rentals is the caller's job.
pub fn plan_extension(rental: &Rental, additional: Duration) -> Result<Extension, RentalError> {
    if rental.status != RentalStatus::Active {
        return Err(RentalError::invalid_state(rental.id, rental.status, "extend"));
    }
    let interval = rental.interval.extended_by(additional)?;

    let current_secs = Decimal::from(rental.interval.duration().num_seconds());
    let added_secs = Decimal::from(additional.num_seconds());
    let extra_amount = rental
        .total_amount
        .checked_mul(added_secs)
        .and_then(|scaled| scaled.checked_div(current_secs))
        .ok_or_else(|| RentalError::validation("extension cost overflows"))?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Ok(Extension {
        interval,
        extra_amount,
    })
}

/// Statuses in which a damage assessment may be recorded
pub fn can_assess_damage(status: RentalStatus) -> bool {
    matches!(status, RentalStatus::Active | RentalStatus::Returned)
}
