use std::collections::HashSet;

use ulid::Ulid;

use crate::model::*;

use super::availability::{is_bookable_status, is_free};
use super::{Engine, EngineError};

impl Engine {
    pub async fn room(&self, id: Ulid) -> Option<Room> {
        let rs = self.get_room_state(&id)?;
        let guard = rs.read().await;
        Some(guard.room.clone())
    }

    /// Filtered listing, ordered by room number ascending.
    pub async fn list_rooms(&self, filter: &RoomFilter) -> Vec<Room> {
        let states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut rooms = Vec::with_capacity(states.len());
        for rs in states {
            let guard = rs.read().await;
            if filter.matches(&guard.room) {
                rooms.push(guard.room.clone());
            }
        }
        rooms.sort_by(|a, b| a.room_number.cmp(&b.room_number));
        rooms
    }

    /// Pure date answer for one room: true iff no non-cancelled booking
    /// overlaps the stay. Room status is not consulted here.
    pub async fn is_room_available(
        &self,
        room_id: Ulid,
        stay: &StayRange,
    ) -> Result<bool, EngineError> {
        let rs = self
            .get_room_state(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.read().await;
        Ok(is_free(&guard, stay))
    }

    /// Two-stage availability search:
    /// 1. candidate rooms by status (available/reserved only — occupied and
    ///    maintenance are excluded regardless of their ledgers), optionally
    ///    narrowed by type;
    /// 2. one sweep across the whole ledger collecting the ids of rooms with
    ///    a conflicting non-cancelled booking, then subtract.
    /// Result order is registry iteration order; callers wanting room-number
    /// order re-sort, as the listing operation does.
    pub async fn find_available_rooms(
        &self,
        stay: &StayRange,
        kind: Option<RoomType>,
    ) -> Vec<Room> {
        let states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();

        let mut candidates: Vec<Room> = Vec::new();
        let mut conflicting: HashSet<Ulid> = HashSet::new();
        for rs in &states {
            let guard = rs.read().await;
            if guard
                .overlapping(stay)
                .any(|b| b.status.blocks_dates())
            {
                conflicting.insert(guard.room.id);
            }
            if is_bookable_status(guard.room.status)
                && kind.is_none_or(|k| guard.room.kind == k)
            {
                candidates.push(guard.room.clone());
            }
        }

        candidates.retain(|room| !conflicting.contains(&room.id));
        candidates
    }

    pub async fn booking(&self, id: Ulid) -> Option<Booking> {
        let room_id = self.room_id_for_booking(&id)?;
        let rs = self.get_room_state(&room_id)?;
        let guard = rs.read().await;
        guard.booking(id).cloned()
    }

    /// All bookings matching the filter, ordered by check-in date.
    pub async fn list_bookings(&self, filter: &BookingFilter) -> Vec<Booking> {
        let states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut bookings = Vec::new();
        for rs in states {
            let guard = rs.read().await;
            if let Some(room_id) = filter.room_id
                && guard.room.id != room_id {
                    continue;
                }
            bookings.extend(guard.ledger.iter().filter(|b| filter.matches(b)).cloned());
        }
        bookings.sort_by_key(|b| b.stay.check_in);
        bookings
    }

    pub fn guest(&self, id: Ulid) -> Option<Guest> {
        self.guests.get(&id).map(|e| e.value().clone())
    }

    pub fn list_guests(&self) -> Vec<Guest> {
        let mut guests: Vec<Guest> = self.guests.iter().map(|e| e.value().clone()).collect();
        guests.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        guests
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
