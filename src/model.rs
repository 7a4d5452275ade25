use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Amounts in minor currency units — the only money type.
pub type Money = i64;

/// Half-open stay `[check_in, check_out)`, in calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "stay check-in must precede check-out");
        Self { check_in, check_out }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Half-open overlap: checking out on day D and checking in on day D
    /// share the room key for an hour, not a night, so it is not a conflict.
    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Single,
    Double,
    Twin,
    Suite,
    Deluxe,
    Presidential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
    Reserved,
}

impl RoomStatus {
    pub fn parse(s: &str) -> Option<RoomStatus> {
        match s {
            "available" => Some(RoomStatus::Available),
            "occupied" => Some(RoomStatus::Occupied),
            "maintenance" => Some(RoomStatus::Maintenance),
            "reserved" => Some(RoomStatus::Reserved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookingStatus {
    /// Checked-out and cancelled admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::CheckedOut | BookingStatus::Cancelled)
    }

    /// Every status except cancelled keeps the booking in the overlap set.
    pub fn blocks_dates(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdProofType {
    Passport,
    DriversLicense,
    NationalId,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Ulid,
    /// Unique, immutable key for uniqueness checks (the id stays stable
    /// across renumbering).
    pub room_number: String,
    #[serde(rename = "type")]
    pub kind: RoomType,
    pub price: Money,
    pub capacity: u32,
    pub status: RoomStatus,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoOccupant {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub id: Ulid,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub gender: Gender,
    pub id_proof_type: IdProofType,
    pub id_number: String,
    /// Reference into the document store; opaque to this engine.
    pub id_proof_file: String,
    pub vehicle_number: Option<String>,
    pub additional_guests: Vec<CoOccupant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub guest_id: Ulid,
    pub stay: StayRange,
    pub status: BookingStatus,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub special_requests: Option<String>,
}

impl Booking {
    pub fn nights(&self) -> i64 {
        self.stay.nights()
    }

    /// May be negative: overpayment is accepted, not validated away.
    pub fn balance(&self) -> Money {
        self.total_amount - self.paid_amount
    }
}

/// A room plus every booking that references it, sorted by check-in date.
/// Keeping the ledger under the room's lock is what lets the conflict check
/// and the insert commit as one unit.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    pub ledger: Vec<Booking>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            ledger: Vec::new(),
        }
    }

    /// Insert a booking maintaining sort order by check-in date.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .ledger
            .binary_search_by_key(&booking.stay.check_in, |b| b.stay.check_in)
            .unwrap_or_else(|e| e);
        self.ledger.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.ledger.iter().position(|b| b.id == id)?;
        Some(self.ledger.remove(pos))
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.ledger.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.ledger.iter_mut().find(|b| b.id == id)
    }

    /// Bookings whose stay overlaps the query window, any status.
    /// Binary search skips entries checking in at or after `query.check_out`.
    pub fn overlapping(&self, query: &StayRange) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .ledger
            .partition_point(|b| b.stay.check_in < query.check_out);
        self.ledger[..right_bound]
            .iter()
            .filter(move |b| b.stay.check_out > query.check_in)
    }
}

/// The event types — flat, no nesting beyond the record structs. This is the
/// journal record format; applying an event must be deterministic, so events
/// that carry a synchronizer decision (room-status side effect) record it
/// explicitly instead of re-deriving it from the clock at replay time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        room: Room,
    },
    RoomUpdated {
        room: Room,
    },
    RoomDeleted {
        id: Ulid,
    },
    RoomStatusSet {
        id: Ulid,
        status: RoomStatus,
    },
    GuestRegistered {
        guest: Guest,
    },
    GuestUpdated {
        guest: Guest,
    },
    GuestDeleted {
        id: Ulid,
    },
    BookingCreated {
        booking: Booking,
        /// Room status written by the synchronizer at creation time
        /// (reserved when the stay begins today), if any.
        room_status: Option<RoomStatus>,
    },
    BookingUpdated {
        booking: Booking,
    },
    BookingCancelled {
        id: Ulid,
        room_id: Ulid,
        room_status: Option<RoomStatus>,
    },
    BookingCheckedIn {
        id: Ulid,
        room_id: Ulid,
    },
    BookingCheckedOut {
        id: Ulid,
        room_id: Ulid,
    },
    BookingDeleted {
        id: Ulid,
        room_id: Ulid,
    },
}

// ── Query parameter types ────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RoomFilter {
    pub kind: Option<RoomType>,
    pub status: Option<RoomStatus>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
}

impl RoomFilter {
    pub fn matches(&self, room: &Room) -> bool {
        if let Some(kind) = self.kind
            && room.kind != kind {
                return false;
            }
        if let Some(status) = self.status
            && room.status != status {
                return false;
            }
        if let Some(min) = self.min_price
            && room.price < min {
                return false;
            }
        if let Some(max) = self.max_price
            && room.price > max {
                return false;
            }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub room_id: Option<Ulid>,
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(room_id) = self.room_id
            && booking.room_id != room_id {
                return false;
            }
        if let Some(status) = self.status
            && booking.status != status {
                return false;
            }
        true
    }
}
