//! Interval conflict resolution
//!
//! Pure functions over an item's existing rentals. Only granted rentals
//! (`confirmed`, `picked_up`, `active`) occupy the calendar; `requested`
//! rentals may overlap each other freely until one of them is approved.

use crate::types::{Interval, ItemId, Rental, RentalError, RentalId, RentalStatus};

/// First granted rental on `item` whose interval overlaps `requested`
///
/// `exclude` skips one rental id, so a rental can be checked against its
/// neighbours without colliding with itself (approval, extension).
pub fn find_conflict<'a>(
    item: ItemId,
    requested: &Interval,
    existing: impl IntoIterator<Item = &'a Rental>,
    exclude: Option<RentalId>,
) -> Option<&'a Rental> {
    existing.into_iter().find(|rental| {
        rental.item == item
            && rental.is_granted()
            && Some(rental.id) != exclude
            && rental.interval.overlaps(requested)
    })
}

/// `Ok(())` if `requested` is free on `item`, else a conflict error naming
/// the granted rental in the way
pub fn check_available<'a>(
    item: ItemId,
    requested: &Interval,
    existing: impl IntoIterator<Item = &'a Rental>,
    exclude: Option<RentalId>,
) -> Result<(), RentalError> {
    match find_conflict(item, requested, existing, exclude) {
        Some(conflicting) => Err(RentalError::conflict(item, conflicting.id)),
        None => Ok(()),
    }
}

/// `requested` rentals on the same item that overlap `granted`
///
/// These are the siblings an approval has to reject.
pub fn overlapping_requests<'a>(
    granted: &Rental,
    existing: impl IntoIterator<Item = &'a Rental>,
) -> Vec<&'a Rental> {
    existing
        .into_iter()
        .filter(|rental| {
            rental.item == granted.item
                && rental.id != granted.id
                && rental.status == RentalStatus::Requested
                && rental.interval.overlaps(&granted.interval)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RentalRequest;
    use chrono::{DateTime, TimeZone, Utc};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 0, 0, 0).unwrap()
    }

    fn rental(item: ItemId, from: u32, to: u32, status: RentalStatus) -> Rental {
        let interval = Interval::new(day(from), day(to)).unwrap();
        let request = RentalRequest::new(item, 2, interval, dec!(100));
        let mut rental = Rental::from_request(&request, 1, day(1));
        rental.status = status;
        rental
    }

    #[rstest]
    #[case::confirmed(RentalStatus::Confirmed, true)]
    #[case::picked_up(RentalStatus::PickedUp, true)]
    #[case::active(RentalStatus::Active, true)]
    #[case::requested(RentalStatus::Requested, false)]
    #[case::returned(RentalStatus::Returned, false)]
    #[case::cancelled(RentalStatus::Cancelled, false)]
    #[case::rejected(RentalStatus::Rejected, false)]
    fn test_only_granted_rentals_block(#[case] status: RentalStatus, #[case] blocks: bool) {
        let existing = vec![rental(1, 1, 3, status)];
        let requested = Interval::new(day(2), day(4)).unwrap();

        let result = check_available(1, &requested, &existing, None);

        assert_eq!(result.is_err(), blocks);
    }

    #[test]
    fn test_conflict_names_blocking_rental() {
        let existing = vec![
            rental(1, 1, 3, RentalStatus::Confirmed),
            rental(1, 10, 12, RentalStatus::Active),
        ];
        let requested = Interval::new(day(11), day(13)).unwrap();

        let result = check_available(1, &requested, &existing, None);

        assert_eq!(result, Err(RentalError::conflict(1, existing[1].id)));
    }

    #[test]
    fn test_touching_intervals_conflict() {
        let existing = vec![rental(1, 1, 3, RentalStatus::Confirmed)];
        let requested = Interval::new(day(3), day(5)).unwrap();

        assert!(find_conflict(1, &requested, &existing, None).is_some());
    }

    #[test]
    fn test_other_items_and_excluded_rental_ignored() {
        let existing = vec![
            rental(2, 1, 3, RentalStatus::Confirmed),
            rental(1, 1, 3, RentalStatus::Active),
        ];
        let requested = Interval::new(day(1), day(5)).unwrap();

        assert!(find_conflict(1, &requested, &existing, Some(existing[1].id)).is_none());
    }

    #[test]
    fn test_overlapping_requests_selects_siblings() {
        let granted = rental(1, 1, 3, RentalStatus::Confirmed);
        let existing = vec![
            granted.clone(),
            rental(1, 2, 4, RentalStatus::Requested),
            rental(1, 1, 3, RentalStatus::Requested),
            rental(1, 5, 7, RentalStatus::Requested),
            rental(1, 2, 3, RentalStatus::Rejected),
            rental(2, 1, 3, RentalStatus::Requested),
        ];

        let siblings = overlapping_requests(&granted, &existing);

        let ids: Vec<_> = siblings.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![existing[1].id, existing[2].id]);
    }
}
