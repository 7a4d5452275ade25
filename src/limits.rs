//! Hard caps checked at mutation entry. Generous for a single property;
//! they exist to bound memory and journal growth, not to model business
//! rules.

use chrono::NaiveDate;

pub const MAX_ROOMS: usize = 10_000;
pub const MAX_GUESTS: usize = 100_000;
pub const MAX_BOOKINGS_PER_ROOM: usize = 10_000;

pub const MAX_ROOM_NUMBER_LEN: usize = 16;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_TEXT_LEN: usize = 2_048;
pub const MAX_AMENITIES: usize = 64;
pub const MAX_IMAGES: usize = 32;
pub const MAX_CO_OCCUPANTS: usize = 16;

pub const MAX_STAY_NIGHTS: i64 = 365;

pub fn min_valid_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid constant date")
}

pub fn max_valid_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2100, 1, 1).expect("valid constant date")
}
