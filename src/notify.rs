use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::{Event, RoomStatus};

const CHANNEL_CAPACITY: usize = 256;

/// Digest of one committed change on one room, as delivered to front-desk
/// subscribers. Carries what a board needs in order to refresh its view of
/// the room — not the raw journal record, which is a persistence detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomUpdate {
    /// Room added to the inventory.
    Listed,
    /// Room fields edited (number, type, price, ...).
    Details,
    /// Room removed from the inventory.
    Delisted,
    /// Direct administrative status write.
    Status(RoomStatus),
    BookingConfirmed(Ulid),
    BookingAmended(Ulid),
    BookingCancelled(Ulid),
    GuestCheckedIn(Ulid),
    GuestCheckedOut(Ulid),
    BookingRemoved(Ulid),
}

impl RoomUpdate {
    /// Digest a journal event. Guest-record events are not room-scoped and
    /// produce nothing.
    fn digest(event: &Event) -> Option<RoomUpdate> {
        Some(match event {
            Event::RoomCreated { .. } => RoomUpdate::Listed,
            Event::RoomUpdated { .. } => RoomUpdate::Details,
            Event::RoomDeleted { .. } => RoomUpdate::Delisted,
            Event::RoomStatusSet { status, .. } => RoomUpdate::Status(*status),
            Event::BookingCreated { booking, .. } => RoomUpdate::BookingConfirmed(booking.id),
            Event::BookingUpdated { booking } => RoomUpdate::BookingAmended(booking.id),
            Event::BookingCancelled { id, .. } => RoomUpdate::BookingCancelled(*id),
            Event::BookingCheckedIn { id, .. } => RoomUpdate::GuestCheckedIn(*id),
            Event::BookingCheckedOut { id, .. } => RoomUpdate::GuestCheckedOut(*id),
            Event::BookingDeleted { id, .. } => RoomUpdate::BookingRemoved(*id),
            Event::GuestRegistered { .. }
            | Event::GuestUpdated { .. }
            | Event::GuestDeleted { .. } => return None,
        })
    }
}

/// Per-room broadcast of committed updates.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<RoomUpdate>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to updates for a room. Creates the channel if needed.
    pub fn subscribe(&self, room_id: Ulid) -> broadcast::Receiver<RoomUpdate> {
        self.channels
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Digest a committed event and fan it out. No-op when the event is not
    /// room-scoped or nobody is listening.
    pub fn publish(&self, room_id: Ulid, event: &Event) {
        let Some(update) = RoomUpdate::digest(event) else {
            return;
        };
        if let Some(sender) = self.channels.get(&room_id) {
            let _ = sender.send(update);
        }
    }

    /// Drop a room's channel once the room is gone.
    pub fn remove(&self, room_id: &Ulid) {
        self.channels.remove(room_id);
    }
}
