use ulid::Ulid;

use crate::model::BookingStatus;

/// Error conditions surfaced by the engine. Conflicts are always a
/// distinguishable variant, never a boolean, so callers can present an
/// accurate message. The request boundary maps these onto status codes:
/// `NotFound` → 404, `Store` → 500, everything else → 400.
#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    DuplicateRoomNumber(String),
    /// The requested stay overlaps an existing non-cancelled booking.
    Conflict {
        room_id: Ulid,
        booking_id: Ulid,
    },
    InvalidTransition {
        booking_id: Ulid,
        from: BookingStatus,
    },
    HasActiveBookings(Ulid),
    Validation(&'static str),
    LimitExceeded(&'static str),
    /// The journal (the persistence layer) failed.
    Store(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::DuplicateRoomNumber(number) => {
                write!(f, "room number already exists: {number}")
            }
            EngineError::Conflict { room_id, booking_id } => {
                write!(
                    f,
                    "room {room_id} not available for requested dates: conflicts with booking {booking_id}"
                )
            }
            EngineError::InvalidTransition { booking_id, from } => {
                write!(f, "booking {booking_id} cannot transition from {from:?}")
            }
            EngineError::HasActiveBookings(id) => {
                write!(f, "cannot delete room {id}: it has active bookings")
            }
            EngineError::Validation(msg) => write!(f, "{msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Store(e) => write!(f, "store failure: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
