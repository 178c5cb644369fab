//! Intent replay
//!
//! This module provides the `IntentProcessor`, which applies replay intents
//! to a `SettlementEngine` wired to in-memory collaborators. Replay streams
//! name rentals by caller-chosen labels; the processor maps each label to the
//! rental id the engine assigned when the `request` intent was applied.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::core::collaborators::{Collaborators, InMemoryCatalog, InMemoryIdentity};
use crate::core::engine::{EngineConfig, SettlementEngine};
use crate::types::{Intent, RentalError, RentalId, RentalRef, RentalRequest, Wallet};

/// Applies intents to an engine, one at a time
///
/// Cloning is cheap; clones share the engine and the label map.
#[derive(Debug, Clone)]
pub struct IntentProcessor {
    engine: SettlementEngine,
    catalog: Arc<InMemoryCatalog>,
    identity: Arc<InMemoryIdentity>,
    labels: Arc<DashMap<RentalRef, RentalId>>,
}

impl IntentProcessor {
    /// Create a processor over a fresh engine with in-memory collaborators
    pub fn new(config: EngineConfig) -> Self {
        let (collaborators, catalog, identity) = Collaborators::in_memory();
        Self {
            engine: SettlementEngine::new(config, collaborators),
            catalog,
            identity,
            labels: Arc::new(DashMap::new()),
        }
    }

    pub fn engine(&self) -> &SettlementEngine {
        &self.engine
    }

    /// Rental id behind a replay label
    pub fn rental_id(&self, label: RentalRef) -> Result<RentalId, RentalError> {
        self.labels
            .get(&label)
            .map(|entry| *entry.value())
            .ok_or_else(|| RentalError::validation(format!("unknown rental label {}", label)))
    }

    /// Apply one intent
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The intent was applied (or was an idempotent no-op)
    /// * `Err(RentalError)` - The engine refused the intent; nothing was written
    pub fn process(&self, intent: Intent) -> Result<(), RentalError> {
        debug!(kind = intent.kind(), rental = ?intent.rental_ref(), "applying intent");

        match intent {
            Intent::RegisterUser { user } => {
                self.identity.register(user);
            }
            Intent::ListItem { item, owner, price } => {
                self.identity.register(owner);
                self.catalog.list_item(item, owner, price);
            }
            Intent::Request {
                rental,
                item,
                renter,
                interval,
                total_amount,
                security_deposit,
            } => {
                if self.labels.contains_key(&rental) {
                    return Err(RentalError::validation(format!(
                        "rental label {} already used",
                        rental
                    )));
                }
                let request = RentalRequest::new(item, renter, interval, total_amount)
                    .with_deposit(security_deposit);
                let created = self.engine.create_rental_request(request)?;
                self.labels.insert(rental, created.id);
            }
            Intent::Approve { rental } => {
                self.engine.approve_rental(self.rental_id(rental)?)?;
            }
            Intent::Reject { rental, reason } => {
                self.engine.reject_rental(self.rental_id(rental)?, reason)?;
            }
            Intent::Delivery { rental, status } => {
                self.engine
                    .transition_delivery(self.rental_id(rental)?, status)?;
            }
            Intent::Cancel { rental, reason } => {
                self.engine.cancel_rental(self.rental_id(rental)?, reason)?;
            }
            Intent::Extend { rental, additional } => {
                self.engine.extend_rental(self.rental_id(rental)?, additional)?;
            }
            Intent::Damage { rental, amount } => {
                self.engine.assess_damage(self.rental_id(rental)?, amount)?;
            }
            Intent::Complete { rental } => {
                self.engine.complete_rental(self.rental_id(rental)?)?;
            }
            Intent::Hold { rental } => {
                self.engine.hold_completion(self.rental_id(rental)?)?;
            }
            Intent::Withdraw { user, amount } => {
                self.engine.request_withdrawal(user, amount)?;
            }
        }
        Ok(())
    }

    /// Final wallets, sorted by user id
    pub fn wallets(&self) -> Vec<Wallet> {
        self.engine.wallets()
    }
}
