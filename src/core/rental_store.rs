//! Rental records
//!
//! Keeps every rental ever created, indexed by item. Records are never
//! deleted; terminal rentals stay as history. Writes for a rental happen
//! under its item's lock, so a read-plan-write sequence on an item sees a
//! stable view of that item's rentals.

use dashmap::DashMap;

use crate::types::{ItemId, Rental, RentalError, RentalId};

#[derive(Debug, Default)]
pub struct RentalStore {
    rentals: DashMap<RentalId, Rental>,
    by_item: DashMap<ItemId, Vec<RentalId>>,
}

impl RentalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new or updated rental
    pub fn put(&self, rental: Rental) {
        let id = rental.id;
        let item = rental.item;
        if self.rentals.insert(id, rental).is_none() {
            self.by_item.entry(item).or_default().push(id);
        }
    }

    pub fn get(&self, rental: RentalId) -> Result<Rental, RentalError> {
        self.rentals
            .get(&rental)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RentalError::rental_not_found(rental))
    }

    /// Every rental on `item`, in creation order
    pub fn for_item(&self, item: ItemId) -> Vec<Rental> {
        let ids = self
            .by_item
            .get(&item)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.rentals.get(&id).map(|entry| entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rentals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rentals.is_empty()
    }
}
