//! Settlement orchestrator
//!
//! This module provides the `SettlementEngine`, the only component with
//! knowledge across rentals, items and wallets. Every operation follows the
//! same shape:
//!
//! 1. Take the item lock of the rental's item.
//! 2. Reload the rental and ask the state machine what the event means.
//! 3. Stage the requested side effects into a [`SettlementUnit`].
//! 4. Commit the unit (all writes or none).
//! 5. Run the post-commit actions: timers and delivery assignment.
//!
//! # Architecture
//!
//! ```text
//! SettlementEngine (Clone, Arc inside)
//!     ├── RentalStore           (rental records, per-item index)
//!     ├── Ledger                (wallets + transaction log, per-wallet locks)
//!     ├── KeyedLocks<ItemId>    (per-item serialization)
//!     ├── CompletionScheduler   (cancellable completion timers)
//!     └── Collaborators         (catalog, identity, dispatch)
//! ```
//!
//! # Thread Safety
//!
//! The engine can be cloned and shared across threads and tasks. Approvals
//! and every other transition on an item run under that item's lock, so two
//! overlapping approvals on one item can never both succeed. Wallet locks
//! are only ever taken inside an item lock or on their own.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, warn};

use crate::core::collaborators::Collaborators;
use crate::core::conflict;
use crate::core::ledger::{Ledger, Posting, Reconciliation};
use crate::core::locks::KeyedLocks;
use crate::core::rental_store::RentalStore;
use crate::core::scheduler::{CompletionScheduler, Hold, Scheduled};
use crate::core::settlement::SettlementUnit;
use crate::core::state_machine::{self, Decision, Effect, RentalEvent};
use crate::types::{
    DeliveryStatus, ItemId, Rental, RentalError, RentalId, RentalRequest, RentalStatus,
    Transaction, TransactionStatus, TransactionType, UserId, Wallet,
};

/// Platform commission applied when none is configured: 5%
pub const DEFAULT_COMMISSION_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Settling delay between return and completion
pub const DEFAULT_COMPLETION_DELAY: Duration = Duration::from_secs(30);

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Fraction of `total_amount` kept by the platform, in `[0, 1)`
    pub commission_rate: Decimal,
    /// Delay between `returned` and `completed`; zero completes inline
    pub completion_delay: Duration,
}

impl EngineConfig {
    /// Create a configuration, falling back to the default rate if
    /// `commission_rate` is outside `[0, 1)`
    pub fn new(commission_rate: Decimal, completion_delay: Duration) -> Self {
        let commission_rate = if commission_rate < Decimal::ZERO || commission_rate >= Decimal::ONE
        {
            warn!(
                requested = %commission_rate,
                default = %DEFAULT_COMMISSION_RATE,
                "commission rate must be in [0, 1), using default"
            );
            DEFAULT_COMMISSION_RATE
        } else {
            commission_rate
        };

        Self {
            commission_rate,
            completion_delay,
        }
    }

    /// Platform's cut of `amount`, rounded to cents
    pub fn commission_on(&self, amount: Decimal) -> Decimal {
        (amount * self.commission_rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commission_rate: DEFAULT_COMMISSION_RATE,
            completion_delay: DEFAULT_COMPLETION_DELAY,
        }
    }
}

/// Result of an approval
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalOutcome {
    pub rental: Rental,
    /// Overlapping requests rejected by this approval
    pub rejected_siblings: Vec<Rental>,
}

/// What an executed event left behind
struct Executed {
    rental: Rental,
    rejected_siblings: Vec<Rental>,
    assign_delivery: bool,
}

impl Executed {
    fn unchanged(rental: Rental) -> Self {
        Executed {
            rental,
            rejected_siblings: Vec::new(),
            assign_delivery: false,
        }
    }
}

struct EngineInner {
    config: EngineConfig,
    collaborators: Collaborators,
    rentals: RentalStore,
    ledger: Ledger,
    item_locks: KeyedLocks<ItemId>,
    scheduler: CompletionScheduler,
}

/// Rental booking and settlement orchestrator
#[derive(Clone)]
pub struct SettlementEngine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("config", &self.inner.config)
            .field("rentals", &self.inner.rentals.len())
            .field("pending_completions", &self.inner.scheduler.pending())
            .finish_non_exhaustive()
    }
}

impl SettlementEngine {
    /// Create an engine wired to `collaborators`
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                collaborators,
                rentals: RentalStore::new(),
                ledger: Ledger::new(),
                item_locks: KeyedLocks::new(),
                scheduler: CompletionScheduler::new(),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Create a `requested` rental
    ///
    /// Other `requested` rentals never block a new request; only granted
    /// rentals do.
    ///
    /// # Returns
    ///
    /// * `Ok(Rental)` - The new rental in `requested`
    /// * `Err(RentalError::Validation)` - Bad amounts, or the renter owns the item
    /// * `Err(RentalError::Conflict)` - The interval overlaps a granted rental
    /// * `Err(RentalError::ItemNotFound | UserNotFound)` - Unknown item or renter
    pub fn create_rental_request(&self, request: RentalRequest) -> Result<Rental, RentalError> {
        request.validate()?;
        self.inner.collaborators.identity.get_user(request.renter)?;
        let item = self.inner.collaborators.catalog.get_item(request.item)?;
        if item.owner == request.renter {
            return Err(RentalError::validation(format!(
                "user {} cannot rent their own item {}",
                request.renter, item.id
            )));
        }

        self.inner.item_locks.with_lock(&item.id, || {
            let existing = self.inner.rentals.for_item(item.id);
            conflict::check_available(item.id, &request.interval, &existing, None)?;

            let rental = Rental::from_request(&request, item.owner, Utc::now());
            self.inner.rentals.put(rental.clone());
            info!(
                rental = %rental.id,
                item = rental.item,
                renter = rental.renter,
                total = %rental.total_amount,
                "rental requested"
            );
            Ok(rental)
        })
    }

    /// Approve a `requested` rental
    ///
    /// Confirms the rental, reserves the item, posts the seller's pending
    /// earning and the platform fee, and rejects (with a refund record) every
    /// other `requested` rental on the item whose interval overlaps. All of it
    /// is one settlement unit. Approving an already approved rental is a
    /// no-op.
    pub fn approve_rental(&self, rental: RentalId) -> Result<ApprovalOutcome, RentalError> {
        let executed = self.execute(rental, RentalEvent::Approve)?;
        Ok(ApprovalOutcome {
            rental: executed.rental,
            rejected_siblings: executed.rejected_siblings,
        })
    }

    /// Decline a `requested` rental; no ledger effect
    pub fn reject_rental(
        &self,
        rental: RentalId,
        reason: Option<String>,
    ) -> Result<Rental, RentalError> {
        self.execute(rental, RentalEvent::Reject { reason })
            .map(|executed| executed.rental)
    }

    /// Apply a delivery-status event from the dispatch collaborator
    ///
    /// Re-delivering the current delivery status is a no-op. With a zero
    /// completion delay, `returned_to_seller` completes the rental before
    /// returning.
    pub fn transition_delivery(
        &self,
        rental: RentalId,
        status: DeliveryStatus,
    ) -> Result<Rental, RentalError> {
        self.execute(rental, RentalEvent::Delivery(status))
            .map(|executed| executed.rental)
    }

    /// Cancel a rental that has not been returned yet
    ///
    /// For a granted rental this reverses the pending earning, refunds the
    /// renter, releases any deposit, frees the item and drops any pending
    /// completion timer.
    pub fn cancel_rental(
        &self,
        rental: RentalId,
        reason: Option<String>,
    ) -> Result<Rental, RentalError> {
        self.execute(rental, RentalEvent::Cancel { reason })
            .map(|executed| executed.rental)
    }

    /// Complete a `returned` rental now
    ///
    /// This is what the completion timer calls. Calling it on a completed
    /// rental is a no-op.
    pub fn complete_rental(&self, rental: RentalId) -> Result<Rental, RentalError> {
        self.execute(rental, RentalEvent::Complete)
            .map(|executed| executed.rental)
    }

    /// Stop the pending completion timer of a `returned` rental
    ///
    /// The rental stays `returned` until `complete_rental` is called. Holding
    /// a held rental is a no-op. Fails with `InvalidState` once the timer has
    /// fired, even if the completion has not been committed yet.
    pub fn hold_completion(&self, rental: RentalId) -> Result<Rental, RentalError> {
        let item = self.inner.rentals.get(rental)?.item;
        self.inner.item_locks.with_lock(&item, || {
            let current = self.inner.rentals.get(rental)?;
            if current.status != RentalStatus::Returned {
                return Err(RentalError::invalid_state(
                    rental,
                    current.status,
                    "hold completion of",
                ));
            }
            match self.inner.scheduler.hold(rental) {
                Hold::Held => info!(rental = %rental, "completion held"),
                Hold::AlreadyHeld => debug!(rental = %rental, "completion already held"),
                Hold::NotPending => {
                    return Err(RentalError::invalid_state(
                        rental,
                        current.status,
                        "hold the already fired completion of",
                    ));
                }
            }
            Ok(current)
        })
    }

    /// Extend an `active` rental's end by `additional`
    ///
    /// The prorated cost is added to `total_amount`; the ledger is not
    /// touched until completion.
    pub fn extend_rental(
        &self,
        rental: RentalId,
        additional: chrono::Duration,
    ) -> Result<Rental, RentalError> {
        let item = self.inner.rentals.get(rental)?.item;
        self.inner.item_locks.with_lock(&item, || {
            let current = self.inner.rentals.get(rental)?;
            let extension = state_machine::plan_extension(&current, additional)?;
            let existing = self.inner.rentals.for_item(item);
            conflict::check_available(item, &extension.interval, &existing, Some(rental))?;

            let overflow = || RentalError::arithmetic_overflow("extend rental", current.renter);
            let total_amount = current
                .total_amount
                .checked_add(extension.extra_amount)
                .ok_or_else(overflow)?;
            let extension_amount = current
                .extension_amount
                .checked_add(extension.extra_amount)
                .ok_or_else(overflow)?;

            let mut updated = current;
            updated.interval = extension.interval;
            updated.total_amount = total_amount;
            updated.extension_amount = extension_amount;
            self.inner.rentals.put(updated.clone());

            info!(
                rental = %rental,
                end = %updated.interval.end(),
                extra = %extension.extra_amount,
                "rental extended"
            );
            Ok(updated)
        })
    }

    /// Record the damage deduction applied at completion
    ///
    /// Allowed on `active` and `returned` rentals. The amount may be revised
    /// until completion; it must not exceed the seller's net earning.
    pub fn assess_damage(&self, rental: RentalId, amount: Decimal) -> Result<Rental, RentalError> {
        if amount < Decimal::ZERO {
            return Err(RentalError::validation(format!(
                "damage deduction cannot be negative, got {}",
                amount
            )));
        }

        let item = self.inner.rentals.get(rental)?.item;
        self.inner.item_locks.with_lock(&item, || {
            let mut current = self.inner.rentals.get(rental)?;
            if !state_machine::can_assess_damage(current.status) {
                return Err(RentalError::invalid_state(
                    rental,
                    current.status,
                    "assess damage on",
                ));
            }
            let net = current.total_amount - self.inner.config.commission_on(current.total_amount);
            if amount > net {
                return Err(RentalError::validation(format!(
                    "damage deduction {} exceeds the seller's net earning {}",
                    amount, net
                )));
            }
            if current.damage_deduction == amount {
                return Ok(current);
            }

            current.damage_deduction = amount;
            self.inner.rentals.put(current.clone());
            info!(rental = %rental, damage = %amount, "damage assessed");
            Ok(current)
        })
    }

    /// A user's wallet, created on first reference
    pub fn get_wallet(&self, user: UserId) -> Wallet {
        self.inner.ledger.get_or_create(user)
    }

    /// Cash out `amount` from the user's withdrawable balance
    ///
    /// # Returns
    ///
    /// * `Ok(Transaction)` - The completed withdrawal record
    /// * `Err(RentalError::InsufficientFunds)` - `amount` exceeds the withdrawable balance
    pub fn request_withdrawal(
        &self,
        user: UserId,
        amount: Decimal,
    ) -> Result<Transaction, RentalError> {
        self.inner.collaborators.identity.get_user(user)?;
        let tx = self.inner.ledger.withdraw(user, amount)?;
        info!(user, amount = %amount, "withdrawal completed");
        Ok(tx)
    }

    /// Check a wallet's balances against its transaction records
    pub fn reconcile_wallet(&self, user: UserId) -> Result<Reconciliation, RentalError> {
        self.inner.ledger.reconcile(user)
    }

    pub fn get_rental(&self, rental: RentalId) -> Result<Rental, RentalError> {
        self.inner.rentals.get(rental)
    }

    pub fn rentals_for_item(&self, item: ItemId) -> Vec<Rental> {
        self.inner.rentals.for_item(item)
    }

    pub fn transactions_for_rental(&self, rental: RentalId) -> Vec<Transaction> {
        self.inner.ledger.transactions().for_rental(rental)
    }

    pub fn transactions_for_user(&self, user: UserId) -> Vec<Transaction> {
        self.inner.ledger.transactions().for_user(user)
    }

    /// All wallets, sorted by user id
    pub fn wallets(&self) -> Vec<Wallet> {
        let mut wallets = self.inner.ledger.all_wallets();
        wallets.sort_by_key(|wallet| wallet.user);
        wallets
    }

    /// Completion timers that have neither fired nor been cancelled
    pub fn pending_completions(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Wait until every completion timer has fired or been cancelled
    pub async fn wait_for_completions(&self) {
        self.inner.scheduler.wait_idle().await;
    }

    fn execute(&self, rental: RentalId, event: RentalEvent) -> Result<Executed, RentalError> {
        let item = self.inner.rentals.get(rental)?.item;
        let executed = self
            .inner
            .item_locks
            .with_lock(&item, || self.execute_locked(rental, &event))?;

        if executed.assign_delivery {
            self.assign_delivery(&executed.rental);
        }
        Ok(executed)
    }

    /// Plan, stage and commit `event`; the caller holds the item lock
    fn execute_locked(&self, id: RentalId, event: &RentalEvent) -> Result<Executed, RentalError> {
        let rental = self.inner.rentals.get(id)?;
        let transition = match state_machine::plan(&rental, event)? {
            Decision::AlreadyApplied => {
                debug!(rental = %id, action = event.action(), status = %rental.status, "event already applied");
                return Ok(Executed::unchanged(rental));
            }
            Decision::Apply(transition) => transition,
        };

        let item = rental.item;
        let existing = self.inner.rentals.for_item(item);
        if transition.has(Effect::PostApproval) {
            conflict::check_available(item, &rental.interval, &existing, Some(id))?;
        }

        let now = Utc::now();
        let mut updated = rental;
        transition.apply_to(&mut updated, now);

        let mut unit = SettlementUnit::new();
        let mut rejected_siblings = Vec::new();
        for effect in &transition.effects {
            match effect {
                Effect::ReserveItem => unit.set_availability(item, false),
                Effect::ReleaseItem => {
                    let still_held = existing
                        .iter()
                        .any(|other| other.id != id && other.is_granted());
                    if !still_held {
                        unit.set_availability(item, true);
                    }
                }
                Effect::PostApproval => self.stage_approval(&mut updated, &mut unit),
                Effect::RejectSiblings => {
                    rejected_siblings =
                        self.stage_sibling_rejections(&updated, &existing, now, &mut unit)?;
                }
                Effect::ReverseApproval => self.stage_reversal(&mut updated, &mut unit),
                Effect::SettleCompletion => self.stage_completion(&mut updated, &mut unit),
                Effect::ScheduleCompletion | Effect::CancelCompletion | Effect::AssignDelivery => {}
            }
        }
        unit.put_rental(updated.clone());

        unit.commit(
            &self.inner.ledger,
            self.inner.collaborators.catalog.as_ref(),
            &self.inner.rentals,
        )?;

        info!(
            rental = %id,
            item,
            action = event.action(),
            from = %transition.from,
            to = %transition.to,
            "rental transition committed"
        );
        for sibling in &rejected_siblings {
            info!(
                rental = %sibling.id,
                approved = %id,
                refund = %sibling.refund_amount,
                "overlapping request rejected"
            );
        }

        if transition.has(Effect::CancelCompletion) && self.inner.scheduler.cancel(id) {
            info!(rental = %id, "pending completion cancelled");
        }
        if transition.has(Effect::SettleCompletion) {
            self.inner.scheduler.release_hold(id);
        }

        let mut executed = Executed {
            rental: updated,
            rejected_siblings,
            assign_delivery: transition.has(Effect::AssignDelivery),
        };
        if transition.has(Effect::ScheduleCompletion) {
            if let Some(completed) = self.schedule_completion(id) {
                executed.rental = completed;
            }
        }
        Ok(executed)
    }

    /// Start the completion timer, or complete inline
    ///
    /// Runs under the item lock. Returns the completed rental when the
    /// completion happened inline.
    fn schedule_completion(&self, id: RentalId) -> Option<Rental> {
        let delay = self.inner.config.completion_delay;
        if !delay.is_zero() {
            let engine = self.clone();
            let scheduled = self.inner.scheduler.schedule(id, delay, move || {
                if let Err(e) = engine.complete_rental(id) {
                    warn!(rental = %id, error = %e, "scheduled completion failed");
                }
            });
            match scheduled {
                Scheduled::Started | Scheduled::AlreadyPending => return None,
                Scheduled::NoRuntime => {
                    warn!(rental = %id, "no async runtime for the completion timer, completing now");
                }
            }
        }

        match self.execute_locked(id, &RentalEvent::Complete) {
            Ok(executed) => Some(executed.rental),
            Err(e) => {
                warn!(rental = %id, error = %e, "completion failed, rental stays returned");
                None
            }
        }
    }

    fn assign_delivery(&self, rental: &Rental) {
        if let Err(e) = self.inner.collaborators.dispatcher.assign(rental) {
            warn!(
                rental = %rental.id,
                error = %e,
                "delivery assignment failed, approval stands"
            );
        }
    }

    /// Payment record, pending earning, platform fee and deposit hold
    fn stage_approval(&self, rental: &mut Rental, unit: &mut SettlementUnit) {
        let total = rental.total_amount;
        let commission = self.inner.config.commission_on(total);
        let net = total - commission;
        rental.platform_commission = commission;

        unit.post(Posting::record(rental_tx(
            rental,
            rental.renter,
            TransactionType::RentalPayment,
            -total,
            TransactionStatus::Pending,
        )));
        if net > Decimal::ZERO {
            unit.post(Posting::pending_earning(
                rental_tx(
                    rental,
                    rental.owner,
                    TransactionType::RentalEarning,
                    net,
                    TransactionStatus::Pending,
                )
                .with_meta("gross", total),
            ));
        }
        if commission > Decimal::ZERO {
            unit.post(Posting::record(
                rental_tx(
                    rental,
                    rental.owner,
                    TransactionType::PlatformFee,
                    -commission,
                    TransactionStatus::Completed,
                )
                .with_meta("rate", self.inner.config.commission_rate),
            ));
        }
        if rental.security_deposit > Decimal::ZERO {
            unit.post(Posting::record(rental_tx(
                rental,
                rental.renter,
                TransactionType::SecurityDepositHold,
                -rental.security_deposit,
                TransactionStatus::Pending,
            )));
        }
    }

    /// Reject and refund every `requested` rental overlapping `approved`
    fn stage_sibling_rejections(
        &self,
        approved: &Rental,
        existing: &[Rental],
        now: DateTime<Utc>,
        unit: &mut SettlementUnit,
    ) -> Result<Vec<Rental>, RentalError> {
        let reason = format!("overlapping rental {} approved", approved.id);
        let mut rejected = Vec::new();

        for sibling in conflict::overlapping_requests(approved, existing) {
            let event = RentalEvent::Reject {
                reason: Some(reason.clone()),
            };
            let Decision::Apply(transition) = state_machine::plan(sibling, &event)? else {
                continue;
            };

            let mut sibling = sibling.clone();
            transition.apply_to(&mut sibling, now);
            sibling.refund_amount = sibling.total_amount;
            // A request is never charged, so its refund is audit only.
            unit.post(Posting::record(
                rental_tx(
                    &sibling,
                    sibling.renter,
                    TransactionType::Refund,
                    sibling.total_amount,
                    TransactionStatus::Completed,
                )
                .record_only()
                .with_meta("reason", &reason),
            ));
            unit.put_rental(sibling.clone());
            rejected.push(sibling);
        }

        Ok(rejected)
    }

    /// Undo the approval postings of a granted rental
    fn stage_reversal(&self, rental: &mut Rental, unit: &mut SettlementUnit) {
        let transactions = self.inner.ledger.transactions();

        if let Some(earning) =
            transactions.pending_for_rental(rental.id, TransactionType::RentalEarning)
        {
            unit.post(Posting::reverse(&earning));
        }
        if let Some(payment) =
            transactions.pending_for_rental(rental.id, TransactionType::RentalPayment)
        {
            unit.post(Posting::settle(&payment, TransactionStatus::Reversed));
        }
        for fee in transactions.completed_for_rental(rental.id, TransactionType::PlatformFee) {
            unit.post(Posting::record(
                rental_tx(
                    rental,
                    fee.user,
                    TransactionType::PlatformFee,
                    -fee.amount,
                    TransactionStatus::Completed,
                )
                .with_meta("reverses", fee.id),
            ));
        }

        let refund = rental.approved_amount();
        if refund > Decimal::ZERO {
            rental.refund_amount = refund;
            unit.post(Posting::credit(
                rental_tx(
                    rental,
                    rental.renter,
                    TransactionType::Refund,
                    refund,
                    TransactionStatus::Completed,
                )
                .with_meta("reason", "rental cancelled"),
            ));
        }

        if let Some(hold) =
            transactions.pending_for_rental(rental.id, TransactionType::SecurityDepositHold)
        {
            unit.post(Posting::settle(&hold, TransactionStatus::Completed));
            unit.post(Posting::credit(rental_tx(
                rental,
                rental.renter,
                TransactionType::SecurityDepositRelease,
                -hold.amount,
                TransactionStatus::Completed,
            )));
        }
    }

    /// Release the earning and settle extensions, damage and deposit
    fn stage_completion(&self, rental: &mut Rental, unit: &mut SettlementUnit) {
        let transactions = self.inner.ledger.transactions();

        match transactions.pending_for_rental(rental.id, TransactionType::RentalEarning) {
            Some(earning) => unit.post(Posting::release(&earning)),
            None => warn!(rental = %rental.id, "no pending earning to release"),
        }
        if let Some(payment) =
            transactions.pending_for_rental(rental.id, TransactionType::RentalPayment)
        {
            unit.post(Posting::settle(&payment, TransactionStatus::Completed));
        }

        let extension = rental.extension_amount;
        if extension > Decimal::ZERO {
            let commission = self.inner.config.commission_on(extension);
            let net = extension - commission;
            rental.platform_commission += commission;

            unit.post(Posting::record(
                rental_tx(
                    rental,
                    rental.renter,
                    TransactionType::RentalPayment,
                    -extension,
                    TransactionStatus::Completed,
                )
                .with_meta("extension", true),
            ));
            if net > Decimal::ZERO {
                unit.post(Posting::credit_earning(
                    rental_tx(
                        rental,
                        rental.owner,
                        TransactionType::RentalEarning,
                        net,
                        TransactionStatus::Completed,
                    )
                    .with_meta("extension", true),
                ));
            }
            if commission > Decimal::ZERO {
                unit.post(Posting::record(
                    rental_tx(
                        rental,
                        rental.owner,
                        TransactionType::PlatformFee,
                        -commission,
                        TransactionStatus::Completed,
                    )
                    .with_meta("extension", true),
                ));
            }
        }

        let damage = rental.damage_deduction;
        let hold = transactions.pending_for_rental(rental.id, TransactionType::SecurityDepositHold);
        if damage > Decimal::ZERO {
            unit.post(Posting::deduct(rental_tx(
                rental,
                rental.owner,
                TransactionType::DamageDeduction,
                -damage,
                TransactionStatus::Completed,
            )));
            // Deposit is retained.
            if let Some(hold) = hold {
                unit.post(Posting::settle(&hold, TransactionStatus::Completed));
            }
        } else if let Some(hold) = hold {
            unit.post(Posting::settle(&hold, TransactionStatus::Completed));
            unit.post(Posting::credit(rental_tx(
                rental,
                rental.renter,
                TransactionType::SecurityDepositRelease,
                -hold.amount,
                TransactionStatus::Completed,
            )));
        }

        rental.final_seller_earning = rental.total_amount - rental.platform_commission - damage;
    }
}

fn rental_tx(
    rental: &Rental,
    user: UserId,
    tx_type: TransactionType,
    amount: Decimal,
    status: TransactionStatus,
) -> Transaction {
    Transaction::new(user, tx_type, amount, status).for_rental(rental.id, rental.item)
}
