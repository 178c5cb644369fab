//! Settlement units
//!
//! A settlement unit is every write one transition needs: updated rental
//! records, the item availability flip, and the ledger postings. The
//! orchestrator stages a unit while planning and then commits it in one go.
//!
//! # Commit Order
//!
//! 1. Lock every wallet the postings touch (ascending user id).
//! 2. Validate all postings against working copies of those wallets.
//! 3. Flip the item's availability in the catalog. This is the only write
//!    that can fail; if it does, nothing has been written.
//! 4. Apply the ledger writes and store the rental records. Neither can fail
//!    once validation has passed.
//!
//! The caller holds the item lock for the whole commit.

use tracing::{debug, warn};

use crate::core::ledger::{Ledger, Posting};
use crate::core::rental_store::RentalStore;
use crate::core::traits::Catalog;
use crate::types::{ItemId, Rental, RentalError, UserId};

#[derive(Debug, Clone, Default)]
pub struct SettlementUnit {
    rentals: Vec<Rental>,
    availability: Option<(ItemId, bool)>,
    postings: Vec<Posting>,
}

impl SettlementUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a rental record write
    pub fn put_rental(&mut self, rental: Rental) {
        self.rentals.push(rental);
    }

    /// Stage an availability flip; the last one staged wins
    pub fn set_availability(&mut self, item: ItemId, available: bool) {
        self.availability = Some((item, available));
    }

    pub fn post(&mut self, posting: Posting) {
        self.postings.push(posting);
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    pub fn rentals(&self) -> &[Rental] {
        &self.rentals
    }

    pub fn availability(&self) -> Option<(ItemId, bool)> {
        self.availability
    }

    /// Write everything or nothing
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every staged write was applied
    /// * `Err(RentalError::SettlementFailure)` - A step failed; nothing was applied
    pub fn commit(
        self,
        ledger: &Ledger,
        catalog: &dyn Catalog,
        rentals: &RentalStore,
    ) -> Result<(), RentalError> {
        let users: Vec<UserId> = self.postings.iter().map(|posting| posting.user).collect();

        ledger.with_wallet_locks(users, || {
            let prepared = ledger.prepare(self.postings).map_err(|e| {
                warn!(error = %e, "settlement postings rejected");
                RentalError::settlement(format!("ledger postings rejected: {}", e))
            })?;

            if let Some((item, available)) = self.availability {
                catalog.set_availability(item, available).map_err(|e| {
                    warn!(item, error = %e, "availability update failed");
                    RentalError::settlement(format!(
                        "could not set availability of item {}: {}",
                        item, e
                    ))
                })?;
            }

            let appended = prepared.appended().len();
            ledger.apply(prepared);
            let written = self.rentals.len();
            for rental in self.rentals {
                rentals.put(rental);
            }

            debug!(appended, rentals = written, "settlement unit committed");
            Ok(())
        })
    }
}
