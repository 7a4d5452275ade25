use chrono::NaiveDate;

use crate::limits::*;
use crate::model::*;

use super::EngineError;
use super::availability::first_conflict;

/// The property's calendar day, in server-local time. Lifecycle rules that
/// depend on "today" (reserving a room for a same-day arrival) evaluate this
/// once per mutation and record the outcome in the journal event, so replay
/// never consults the clock.
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub(crate) fn validate_stay(stay: &StayRange) -> Result<(), EngineError> {
    if stay.check_in >= stay.check_out {
        return Err(EngineError::Validation(
            "check-in date must be before check-out date",
        ));
    }
    if stay.check_in < min_valid_date() || stay.check_out > max_valid_date() {
        return Err(EngineError::LimitExceeded("stay date out of range"));
    }
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// Reject the stay if any non-cancelled booking on the room overlaps it.
/// `exclude` skips one booking id, for date changes on an existing booking.
/// Callers hold the room's write lock, so a passing check stays true until
/// the insert commits.
pub(crate) fn check_no_conflict(
    rs: &RoomState,
    stay: &StayRange,
    exclude: Option<ulid::Ulid>,
) -> Result<(), EngineError> {
    if let Some(existing) = first_conflict(rs, stay, exclude) {
        return Err(EngineError::Conflict {
            room_id: rs.room.id,
            booking_id: existing.id,
        });
    }
    Ok(())
}
