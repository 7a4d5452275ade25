use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use tokio::sync::{RwLock, oneshot};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::is_bookable_status;
use super::conflict::{check_no_conflict, today, validate_stay};
use super::{Engine, EngineError, JournalCommand};

/// Field set for room create/update. `status` defaults to available on
/// create and to the room's current status on update.
#[derive(Debug, Clone)]
pub struct RoomDraft {
    pub room_number: String,
    pub kind: RoomType,
    pub price: Money,
    pub capacity: u32,
    pub status: Option<RoomStatus>,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GuestDraft {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub gender: Gender,
    pub id_proof_type: IdProofType,
    pub id_number: String,
    pub id_proof_file: String,
    pub vehicle_number: Option<String>,
    pub additional_guests: Vec<CoOccupant>,
}

#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub room_id: Ulid,
    pub guest_id: Ulid,
    pub stay: StayRange,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub special_requests: Option<String>,
}

/// Fields a booking update may change. The room reference is immutable;
/// re-homing a stay is delete + create.
#[derive(Debug, Clone, Default)]
pub struct BookingPatch {
    pub stay: Option<StayRange>,
    pub total_amount: Option<Money>,
    pub paid_amount: Option<Money>,
    pub special_requests: Option<Option<String>>,
}

fn validate_room_draft(draft: &RoomDraft) -> Result<(), EngineError> {
    if draft.room_number.trim().is_empty() {
        return Err(EngineError::Validation("room number is required"));
    }
    if draft.room_number.len() > MAX_ROOM_NUMBER_LEN {
        return Err(EngineError::LimitExceeded("room number too long"));
    }
    if draft.price < 0 {
        return Err(EngineError::Validation("price must not be negative"));
    }
    if draft.capacity < 1 {
        return Err(EngineError::Validation("capacity must be at least 1"));
    }
    if draft.amenities.len() > MAX_AMENITIES {
        return Err(EngineError::LimitExceeded("too many amenities"));
    }
    if draft.images.len() > MAX_IMAGES {
        return Err(EngineError::LimitExceeded("too many images"));
    }
    if draft
        .description
        .as_ref()
        .is_some_and(|d| d.len() > MAX_TEXT_LEN)
    {
        return Err(EngineError::LimitExceeded("description too long"));
    }
    Ok(())
}

fn validate_guest_draft(draft: &GuestDraft) -> Result<(), EngineError> {
    if draft.name.trim().is_empty() {
        return Err(EngineError::Validation("guest name is required"));
    }
    if draft.name.len() > MAX_NAME_LEN
        || draft.address.len() > MAX_TEXT_LEN
        || draft.id_number.len() > MAX_NAME_LEN
    {
        return Err(EngineError::LimitExceeded("guest field too long"));
    }
    if draft.additional_guests.len() > MAX_CO_OCCUPANTS {
        return Err(EngineError::LimitExceeded("too many co-occupants"));
    }
    Ok(())
}

impl Engine {
    // ── Room Registry ────────────────────────────────────────

    pub async fn create_room(&self, draft: RoomDraft) -> Result<Room, EngineError> {
        validate_room_draft(&draft)?;
        if self.rooms.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }

        let id = Ulid::new();
        // Atomic claim on the number index: of two concurrent creates with
        // the same number, exactly one sees the vacant entry.
        match self.room_numbers.entry(draft.room_number.clone()) {
            Entry::Occupied(_) => {
                return Err(EngineError::DuplicateRoomNumber(draft.room_number));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(id);
            }
        }

        let room = Room {
            id,
            room_number: draft.room_number,
            kind: draft.kind,
            price: draft.price,
            capacity: draft.capacity,
            status: draft.status.unwrap_or(RoomStatus::Available),
            amenities: draft.amenities,
            images: draft.images,
            description: draft.description,
        };

        let event = Event::RoomCreated { room: room.clone() };
        if let Err(e) = self.journal_append(&event).await {
            self.room_numbers.remove(&room.room_number);
            return Err(e);
        }
        self.rooms
            .insert(id, Arc::new(RwLock::new(RoomState::new(room.clone()))));
        self.notify.publish(id, &event);
        metrics::counter!(crate::observability::ROOMS_CREATED_TOTAL).increment(1);
        Ok(room)
    }

    /// Full-field update. The duplicate-number guard runs only when the
    /// number actually changes; updating a room in place with its own number
    /// always passes.
    pub async fn update_room(&self, id: Ulid, draft: RoomDraft) -> Result<Room, EngineError> {
        validate_room_draft(&draft)?;
        let rs = self
            .get_room_state(&id)
            .ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;

        let old_number = guard.room.room_number.clone();
        let renumbered = draft.room_number != old_number;
        if renumbered {
            match self.room_numbers.entry(draft.room_number.clone()) {
                Entry::Occupied(_) => {
                    return Err(EngineError::DuplicateRoomNumber(draft.room_number));
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(id);
                }
            }
        }

        let room = Room {
            id,
            room_number: draft.room_number.clone(),
            kind: draft.kind,
            price: draft.price,
            capacity: draft.capacity,
            status: draft.status.unwrap_or(guard.room.status),
            amenities: draft.amenities,
            images: draft.images,
            description: draft.description,
        };

        let event = Event::RoomUpdated { room: room.clone() };
        match self.persist_and_apply(id, &mut guard, &event).await {
            Ok(()) => {
                if renumbered {
                    self.room_numbers.remove(&old_number);
                }
                Ok(room)
            }
            Err(e) => {
                if renumbered {
                    self.room_numbers.remove(&draft.room_number);
                }
                Err(e)
            }
        }
    }

    /// Deletion is refused while a confirmed or checked-in booking still
    /// references the room. Terminal bookings are dropped with it.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let rs = self
            .get_room_state(&id)
            .ok_or(EngineError::NotFound(id))?;
        let guard = rs.write().await;
        if guard.ledger.iter().any(|b| !b.status.is_terminal()) {
            return Err(EngineError::HasActiveBookings(id));
        }

        let event = Event::RoomDeleted { id };
        self.journal_append(&event).await?;
        self.rooms.remove(&id);
        self.room_numbers.remove(&guard.room.room_number);
        for b in &guard.ledger {
            self.booking_rooms.remove(&b.id);
        }
        drop(guard);
        self.notify.publish(id, &event);
        self.notify.remove(&id);
        Ok(())
    }

    /// Direct administrative status write. No transition validation: any
    /// status may follow any other, and the next lifecycle event will
    /// overwrite a manual value again.
    pub async fn set_room_status(
        &self,
        id: Ulid,
        status: RoomStatus,
    ) -> Result<Room, EngineError> {
        let rs = self
            .get_room_state(&id)
            .ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;
        let event = Event::RoomStatusSet { id, status };
        self.persist_and_apply(id, &mut guard, &event).await?;
        Ok(guard.room.clone())
    }

    // ── Guests ───────────────────────────────────────────────

    pub async fn register_guest(&self, draft: GuestDraft) -> Result<Guest, EngineError> {
        validate_guest_draft(&draft)?;
        if self.guests.len() >= MAX_GUESTS {
            return Err(EngineError::LimitExceeded("too many guests"));
        }
        let guest = Guest {
            id: Ulid::new(),
            name: draft.name,
            address: draft.address,
            phone: draft.phone,
            gender: draft.gender,
            id_proof_type: draft.id_proof_type,
            id_number: draft.id_number,
            id_proof_file: draft.id_proof_file,
            vehicle_number: draft.vehicle_number,
            additional_guests: draft.additional_guests,
        };
        let event = Event::GuestRegistered { guest: guest.clone() };
        self.journal_append(&event).await?;
        self.guests.insert(guest.id, guest.clone());
        Ok(guest)
    }

    pub async fn update_guest(&self, id: Ulid, draft: GuestDraft) -> Result<Guest, EngineError> {
        validate_guest_draft(&draft)?;
        if !self.guests.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        let guest = Guest {
            id,
            name: draft.name,
            address: draft.address,
            phone: draft.phone,
            gender: draft.gender,
            id_proof_type: draft.id_proof_type,
            id_number: draft.id_number,
            id_proof_file: draft.id_proof_file,
            vehicle_number: draft.vehicle_number,
            additional_guests: draft.additional_guests,
        };
        let event = Event::GuestUpdated { guest: guest.clone() };
        self.journal_append(&event).await?;
        self.guests.insert(id, guest.clone());
        Ok(guest)
    }

    pub async fn delete_guest(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.guests.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::GuestDeleted { id };
        self.journal_append(&event).await?;
        self.guests.remove(&id);
        Ok(())
    }

    // ── Booking Ledger ───────────────────────────────────────

    /// Create a booking. The conflict check and the insert happen under the
    /// room's write lock with a single journal event as the commit point, so two
    /// concurrent requests for overlapping dates serialize: one commits, the
    /// other observes the conflict.
    ///
    /// Synchronizer rule: a stay beginning today reserves the room (from
    /// available or reserved); any other start date leaves room status alone.
    pub async fn create_booking(&self, draft: BookingDraft) -> Result<Booking, EngineError> {
        validate_stay(&draft.stay)?;
        if draft.total_amount < 0 || draft.paid_amount < 0 {
            return Err(EngineError::Validation("amounts must not be negative"));
        }
        if draft
            .special_requests
            .as_ref()
            .is_some_and(|s| s.len() > MAX_TEXT_LEN)
        {
            return Err(EngineError::LimitExceeded("special requests too long"));
        }
        if !self.guests.contains_key(&draft.guest_id) {
            return Err(EngineError::NotFound(draft.guest_id));
        }
        let rs = self
            .get_room_state(&draft.room_id)
            .ok_or(EngineError::NotFound(draft.room_id))?;
        let mut guard = rs.write().await;
        if guard.ledger.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        if let Err(e) = check_no_conflict(&guard, &draft.stay, None) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let booking = Booking {
            id: Ulid::new(),
            room_id: draft.room_id,
            guest_id: draft.guest_id,
            stay: draft.stay,
            status: BookingStatus::Confirmed,
            total_amount: draft.total_amount,
            paid_amount: draft.paid_amount,
            special_requests: draft.special_requests,
        };

        let room_status = (draft.stay.check_in == today()
            && is_bookable_status(guard.room.status))
        .then_some(RoomStatus::Reserved);

        let event = Event::BookingCreated {
            booking: booking.clone(),
            room_status,
        };
        self.persist_and_apply(draft.room_id, &mut guard, &event)
            .await?;
        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        Ok(booking)
    }

    /// Amounts and requests may change at any point before a terminal state;
    /// dates may only change while the booking is still confirmed, and a date
    /// change re-runs the conflict check with the booking itself excluded.
    pub async fn update_booking(
        &self,
        id: Ulid,
        patch: BookingPatch,
    ) -> Result<Booking, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let current = guard.booking(id).ok_or(EngineError::NotFound(id))?.clone();
        if current.status.is_terminal() {
            return Err(EngineError::InvalidTransition {
                booking_id: id,
                from: current.status,
            });
        }

        let mut updated = current.clone();
        if let Some(stay) = patch.stay {
            validate_stay(&stay)?;
            if current.status != BookingStatus::Confirmed {
                return Err(EngineError::InvalidTransition {
                    booking_id: id,
                    from: current.status,
                });
            }
            check_no_conflict(&guard, &stay, Some(id))?;
            updated.stay = stay;
        }
        if let Some(total) = patch.total_amount {
            if total < 0 {
                return Err(EngineError::Validation("amounts must not be negative"));
            }
            updated.total_amount = total;
        }
        if let Some(paid) = patch.paid_amount {
            if paid < 0 {
                return Err(EngineError::Validation("amounts must not be negative"));
            }
            updated.paid_amount = paid;
        }
        if let Some(requests) = patch.special_requests {
            if requests.as_ref().is_some_and(|s| s.len() > MAX_TEXT_LEN) {
                return Err(EngineError::LimitExceeded("special requests too long"));
            }
            updated.special_requests = requests;
        }

        let event = Event::BookingUpdated { booking: updated.clone() };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(updated)
    }

    /// Remove the booking record entirely, whatever its status.
    pub async fn delete_booking(&self, id: Ulid) -> Result<(), EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        if guard.booking(id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::BookingDeleted { id, room_id };
        self.persist_and_apply(room_id, &mut guard, &event).await
    }

    /// Confirmed → checked-in; the same event marks the room occupied.
    pub async fn check_in(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        if booking.status != BookingStatus::Confirmed {
            return Err(EngineError::InvalidTransition {
                booking_id: id,
                from: booking.status,
            });
        }
        let event = Event::BookingCheckedIn { id, room_id };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(guard.booking(id).expect("booking present after apply").clone())
    }

    /// Checked-in → checked-out; the same event frees the room.
    pub async fn check_out(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        if booking.status != BookingStatus::CheckedIn {
            return Err(EngineError::InvalidTransition {
                booking_id: id,
                from: booking.status,
            });
        }
        let event = Event::BookingCheckedOut { id, room_id };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(guard.booking(id).expect("booking present after apply").clone())
    }

    /// Confirmed → cancelled. If this booking reserved the room for a
    /// same-day arrival (room still reserved, stay starting today), the
    /// cancellation releases that reservation.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        if booking.status != BookingStatus::Confirmed {
            return Err(EngineError::InvalidTransition {
                booking_id: id,
                from: booking.status,
            });
        }
        let room_status = (guard.room.status == RoomStatus::Reserved
            && booking.stay.check_in == today())
        .then_some(RoomStatus::Available);

        let event = Event::BookingCancelled {
            id,
            room_id,
            room_status,
        };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(crate::observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        Ok(guard.booking(id).expect("booking present after apply").clone())
    }

    // ── Journal maintenance ──────────────────────────────────

    /// Compact the journal down to a snapshot of the current state: every
    /// guest, then every room with its ledger (terminal bookings included —
    /// they are records, not noise).
    pub async fn compact_journal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        for entry in self.guests.iter() {
            events.push(Event::GuestRegistered {
                guest: entry.value().clone(),
            });
        }

        let room_states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        for rs in room_states {
            let guard = rs.read().await;
            events.push(Event::RoomCreated {
                room: guard.room.clone(),
            });
            for booking in &guard.ledger {
                events.push(Event::BookingCreated {
                    booking: booking.clone(),
                    room_status: None,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Store("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Store("journal writer dropped response".into()))?
            .map_err(|e| EngineError::Store(e.to_string()))
    }

    pub async fn journal_entries_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .journal_tx
            .send(JournalCommand::EntriesSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
