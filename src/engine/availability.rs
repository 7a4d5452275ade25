use ulid::Ulid;

use crate::model::*;

// ── Overlap / Availability Resolver ──────────────────────────────
//
// Pure date-range logic over a room's ledger. Two stays conflict when they
// share at least one night under the half-open `[check_in, check_out)` rule;
// cancelled bookings never conflict, every other status does (a checked-out
// stay is still the record of who held those nights).

/// First non-cancelled booking on the room whose stay overlaps `stay`,
/// skipping `exclude` if given.
pub fn first_conflict<'a>(
    rs: &'a RoomState,
    stay: &StayRange,
    exclude: Option<Ulid>,
) -> Option<&'a Booking> {
    rs.overlapping(stay)
        .find(|b| b.status.blocks_dates() && Some(b.id) != exclude)
}

/// True iff no non-cancelled booking on the room overlaps `stay`.
/// Room status is deliberately not consulted — this is the pure date answer.
pub fn is_free(rs: &RoomState, stay: &StayRange) -> bool {
    first_conflict(rs, stay, None).is_none()
}

/// Stage-1 predicate for room search: occupied and maintenance rooms are
/// excluded unconditionally, even when their ledgers would not conflict with
/// the requested window. This is a coarse status-driven exclusion, not a date
/// computation.
pub fn is_bookable_status(status: RoomStatus) -> bool {
    matches!(status, RoomStatus::Available | RoomStatus::Reserved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn stay(a: (i32, u32, u32), b: (i32, u32, u32)) -> StayRange {
        StayRange::new(d(a.0, a.1, a.2), d(b.0, b.1, b.2))
    }

    fn room() -> Room {
        Room {
            id: Ulid::new(),
            room_number: "101".into(),
            kind: RoomType::Double,
            price: 12_000,
            capacity: 2,
            status: RoomStatus::Available,
            amenities: vec![],
            images: vec![],
            description: None,
        }
    }

    fn booking(s: StayRange, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            room_id: Ulid::new(),
            guest_id: Ulid::new(),
            stay: s,
            status,
            total_amount: 24_000,
            paid_amount: 0,
            special_requests: None,
        }
    }

    fn state(bookings: Vec<Booking>) -> RoomState {
        let mut rs = RoomState::new(room());
        for b in bookings {
            rs.insert_booking(b);
        }
        rs
    }

    #[test]
    fn empty_ledger_is_free() {
        let rs = state(vec![]);
        assert!(is_free(&rs, &stay((2025, 3, 10), (2025, 3, 12))));
    }

    #[test]
    fn confirmed_booking_blocks_overlap() {
        let rs = state(vec![booking(
            stay((2025, 3, 10), (2025, 3, 12)),
            BookingStatus::Confirmed,
        )]);
        // Overlap at the night of the 11th.
        assert!(!is_free(&rs, &stay((2025, 3, 11), (2025, 3, 13))));
        // Same-day turnover on the 12th is allowed.
        assert!(is_free(&rs, &stay((2025, 3, 12), (2025, 3, 14))));
        // Checking out as the existing stay checks in is likewise allowed.
        assert!(is_free(&rs, &stay((2025, 3, 8), (2025, 3, 10))));
    }

    #[test]
    fn cancelled_booking_does_not_block() {
        let rs = state(vec![booking(
            stay((2025, 3, 10), (2025, 3, 12)),
            BookingStatus::Cancelled,
        )]);
        assert!(is_free(&rs, &stay((2025, 3, 10), (2025, 3, 12))));
    }

    #[test]
    fn checked_out_booking_still_blocks() {
        let rs = state(vec![booking(
            stay((2025, 3, 10), (2025, 3, 12)),
            BookingStatus::CheckedOut,
        )]);
        assert!(!is_free(&rs, &stay((2025, 3, 11), (2025, 3, 13))));
    }

    #[test]
    fn first_conflict_reports_the_blocking_booking() {
        let blocking = booking(stay((2025, 3, 10), (2025, 3, 12)), BookingStatus::CheckedIn);
        let blocking_id = blocking.id;
        let rs = state(vec![
            booking(stay((2025, 3, 1), (2025, 3, 3)), BookingStatus::Cancelled),
            blocking,
        ]);
        let hit = first_conflict(&rs, &stay((2025, 3, 11), (2025, 3, 13)), None).unwrap();
        assert_eq!(hit.id, blocking_id);
    }

    #[test]
    fn exclude_skips_self() {
        let existing = booking(stay((2025, 3, 10), (2025, 3, 12)), BookingStatus::Confirmed);
        let id = existing.id;
        let rs = state(vec![existing]);
        // Re-checking the same booking's own window against itself passes.
        assert!(first_conflict(&rs, &stay((2025, 3, 10), (2025, 3, 13)), Some(id)).is_none());
        // But another booking still conflicts.
        assert!(first_conflict(&rs, &stay((2025, 3, 10), (2025, 3, 13)), None).is_some());
    }

    #[test]
    fn bookable_statuses() {
        assert!(is_bookable_status(RoomStatus::Available));
        assert!(is_bookable_status(RoomStatus::Reserved));
        assert!(!is_bookable_status(RoomStatus::Occupied));
        assert!(!is_bookable_status(RoomStatus::Maintenance));
    }
}
