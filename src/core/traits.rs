//! Collaborator ports
//!
//! The engine depends on three external systems: the catalog (items and their
//! availability flag), identity (does this user exist), and delivery dispatch
//! (assigning a delivery partner once a rental is confirmed). Each is a trait
//! so the engine can be wired to in-memory implementations for replay and
//! tests, or to real services behind the routing layer.

use crate::types::{Item, ItemId, Rental, RentalError, User, UserId};

/// Product catalog
pub trait Catalog: Send + Sync {
    /// Look up an item
    ///
    /// # Returns
    ///
    /// * `Err(RentalError::ItemNotFound)` - If the catalog does not know the item
    fn get_item(&self, item: ItemId) -> Result<Item, RentalError>;

    /// Flip the item's availability flag
    ///
    /// This is the only catalog write the engine performs. It is part of the
    /// settlement unit, so an error here aborts the whole unit.
    fn set_availability(&self, item: ItemId, available: bool) -> Result<(), RentalError>;
}

/// User identity, existence check only
pub trait Identity: Send + Sync {
    fn get_user(&self, user: UserId) -> Result<User, RentalError>;
}

/// Delivery dispatch
///
/// Assignment is not part of any settlement unit: a failure is logged and the
/// approval stands.
pub trait DeliveryDispatcher: Send + Sync {
    fn assign(&self, rental: &Rental) -> Result<(), RentalError>;
}
