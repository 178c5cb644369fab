//! In-memory collaborators
//!
//! Implementations of the collaborator ports backed by `DashMap`, used by the
//! replay path and by tests.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::debug;

use crate::core::traits::{Catalog, DeliveryDispatcher, Identity};
use crate::types::{Item, ItemId, Rental, RentalError, User, UserId};

/// The set of collaborators an engine is wired to
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn Catalog>,
    pub identity: Arc<dyn Identity>,
    pub dispatcher: Arc<dyn DeliveryDispatcher>,
}

impl Collaborators {
    /// Fresh in-memory catalog and identity, no-op dispatcher
    ///
    /// The concrete handles are returned too so callers can list items and
    /// register users.
    pub fn in_memory() -> (Self, Arc<InMemoryCatalog>, Arc<InMemoryIdentity>) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let identity = Arc::new(InMemoryIdentity::new());
        let collaborators = Collaborators {
            catalog: catalog.clone(),
            identity: identity.clone(),
            dispatcher: Arc::new(NoopDispatcher),
        };
        (collaborators, catalog, identity)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    items: DashMap<ItemId, Item>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// List an item as available; re-listing keeps the current flag
    pub fn list_item(&self, item: ItemId, owner: UserId, price: Decimal) {
        self.items
            .entry(item)
            .and_modify(|existing| {
                existing.owner = owner;
                existing.price = price;
            })
            .or_insert(Item {
                id: item,
                owner,
                available: true,
                price,
            });
    }
}

impl Catalog for InMemoryCatalog {
    fn get_item(&self, item: ItemId) -> Result<Item, RentalError> {
        self.items
            .get(&item)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RentalError::item_not_found(item))
    }

    fn set_availability(&self, item: ItemId, available: bool) -> Result<(), RentalError> {
        let mut entry = self
            .items
            .get_mut(&item)
            .ok_or_else(|| RentalError::item_not_found(item))?;
        entry.value_mut().available = available;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryIdentity {
    users: DashMap<UserId, User>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user: UserId) {
        self.users.entry(user).or_insert(User { id: user });
    }
}

impl Identity for InMemoryIdentity {
    fn get_user(&self, user: UserId) -> Result<User, RentalError> {
        self.users
            .get(&user)
            .map(|entry| *entry.value())
            .ok_or_else(|| RentalError::user_not_found(user))
    }
}

/// Dispatcher that accepts every assignment
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

impl DeliveryDispatcher for NoopDispatcher {
    fn assign(&self, rental: &Rental) -> Result<(), RentalError> {
        debug!(rental = %rental.id, "delivery assignment skipped");
        Ok(())
    }
}
