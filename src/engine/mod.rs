mod availability;
mod conflict;
mod error;
mod journal;
mod mutations;
mod queries;

pub use availability::{first_conflict, is_bookable_status, is_free};
pub use error::EngineError;
pub use mutations::{BookingDraft, BookingPatch, GuestDraft, RoomDraft};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use journal::Journal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Journal writer channel ───────────────────────────────

pub(super) enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    EntriesSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the journal and group-commits appends: block on
/// the first append, drain whatever else is already queued into the same
/// batch, then fsync once for all of them and answer every sender. A
/// non-append command found mid-drain waits until the batch has committed.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(first) = rx.recv().await {
        let (event, response) = match first {
            JournalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut journal, other);
                continue;
            }
        };

        let mut batch: Vec<PendingAppend> = vec![(event, response)];
        let mut deferred = None;
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                JournalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }

        commit_batch(&mut journal, batch);
        if let Some(cmd) = deferred {
            handle_non_append(&mut journal, cmd);
        }
    }
}

/// Append the whole batch, fsync once, answer every sender with the shared
/// outcome. The commit runs even when an append failed, so partially
/// buffered bytes don't leak into the next batch (these callers were all
/// told the batch failed).
fn commit_batch(journal: &mut Journal, batch: Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::JOURNAL_COMMIT_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let mut outcome = Ok(());
    for (event, _) in &batch {
        if let Err(e) = journal.append(event) {
            outcome = Err(e);
            break;
        }
    }
    outcome = match (outcome, journal.commit()) {
        (Ok(()), committed) => committed,
        (append_err, _) => append_err,
    };

    metrics::histogram!(crate::observability::JOURNAL_COMMIT_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    for (_, tx) in batch {
        let _ = tx.send(match &outcome {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        });
    }
}

fn handle_non_append(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Compact { events, response } => {
            let _ = response.send(journal.compact(&events));
        }
        JournalCommand::EntriesSinceCompact { response } => {
            let _ = response.send(journal.entries_since_compact());
        }
        JournalCommand::Append { .. } => unreachable!(),
    }
}

/// Room inventory and booking ledger. Every booking lives in its room's
/// `RoomState` behind one `RwLock`; ledger mutations hold that write lock
/// from conflict check through apply, which is what makes a passed
/// availability check still valid at commit time.
pub struct Engine {
    pub(super) rooms: DashMap<Ulid, SharedRoomState>,
    /// Uniqueness index: room number → room id. Claimed atomically on
    /// create/renumber via the entry API.
    pub(super) room_numbers: DashMap<String, Ulid>,
    pub(super) guests: DashMap<Ulid, Guest>,
    /// Reverse lookup: booking id → room id.
    pub(super) booking_rooms: DashMap<Ulid, Ulid>,
    pub(super) journal_tx: mpsc::Sender<JournalCommand>,
    pub notify: Arc<NotifyHub>,
}

/// Apply an event directly to a RoomState (no locking — caller holds the lock).
/// Booking transitions and their room-status side effects land here together:
/// one event, both records.
fn apply_to_room(rs: &mut RoomState, event: &Event, booking_rooms: &DashMap<Ulid, Ulid>) {
    match event {
        Event::RoomUpdated { room } => {
            rs.room = room.clone();
        }
        Event::RoomStatusSet { status, .. } => {
            rs.room.status = *status;
        }
        Event::BookingCreated { booking, room_status } => {
            rs.insert_booking(booking.clone());
            if let Some(status) = room_status {
                rs.room.status = *status;
            }
            booking_rooms.insert(booking.id, booking.room_id);
        }
        Event::BookingUpdated { booking } => {
            rs.remove_booking(booking.id);
            rs.insert_booking(booking.clone());
            booking_rooms.insert(booking.id, booking.room_id);
        }
        Event::BookingCancelled { id, room_status, .. } => {
            if let Some(b) = rs.booking_mut(*id) {
                b.status = BookingStatus::Cancelled;
            }
            if let Some(status) = room_status {
                rs.room.status = *status;
            }
        }
        Event::BookingCheckedIn { id, .. } => {
            if let Some(b) = rs.booking_mut(*id) {
                b.status = BookingStatus::CheckedIn;
            }
            rs.room.status = RoomStatus::Occupied;
        }
        Event::BookingCheckedOut { id, .. } => {
            if let Some(b) = rs.booking_mut(*id) {
                b.status = BookingStatus::CheckedOut;
            }
            rs.room.status = RoomStatus::Available;
        }
        Event::BookingDeleted { id, .. } => {
            rs.remove_booking(*id);
            booking_rooms.remove(id);
        }
        // Room create/delete and guest events are handled at the map level
        Event::RoomCreated { .. }
        | Event::RoomDeleted { .. }
        | Event::GuestRegistered { .. }
        | Event::GuestUpdated { .. }
        | Event::GuestDeleted { .. } => {}
    }
}

impl Engine {
    pub fn new(journal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Journal::load(&journal_path)?;
        let journal = Journal::open(&journal_path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let engine = Self {
            rooms: DashMap::new(),
            room_numbers: DashMap::new(),
            guests: DashMap::new(),
            booking_rooms: DashMap::new(),
            journal_tx,
            notify,
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        for event in &events {
            match event {
                Event::RoomCreated { room } => {
                    engine.room_numbers.insert(room.room_number.clone(), room.id);
                    engine
                        .rooms
                        .insert(room.id, Arc::new(RwLock::new(RoomState::new(room.clone()))));
                }
                Event::RoomDeleted { id } => {
                    if let Some((_, rs)) = engine.rooms.remove(id) {
                        let guard = rs.try_read().expect("replay: uncontended read");
                        engine.room_numbers.remove(&guard.room.room_number);
                        for b in &guard.ledger {
                            engine.booking_rooms.remove(&b.id);
                        }
                    }
                }
                Event::GuestRegistered { guest } | Event::GuestUpdated { guest } => {
                    engine.guests.insert(guest.id, guest.clone());
                }
                Event::GuestDeleted { id } => {
                    engine.guests.remove(id);
                }
                other => {
                    if let Some(room_id) = event_room_id(other)
                        && let Some(entry) = engine.rooms.get(&room_id) {
                            let rs_arc = entry.value().clone();
                            drop(entry);
                            let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                            let old_number = matches!(other, Event::RoomUpdated { .. })
                                .then(|| guard.room.room_number.clone());
                            apply_to_room(&mut guard, other, &engine.booking_rooms);
                            // Renumbering must move the uniqueness index too.
                            if let Some(old) = old_number
                                && old != guard.room.room_number {
                                    engine.room_numbers.remove(&old);
                                    engine
                                        .room_numbers
                                        .insert(guard.room.room_number.clone(), room_id);
                                }
                        }
                }
            }
        }

        Ok(engine)
    }

    /// Write event to the journal via the background group-commit writer.
    async fn journal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Store("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Store("journal writer dropped response".into()))?
            .map_err(|e| EngineError::Store(e.to_string()))
    }

    pub fn get_room_state(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn room_id_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_rooms.get(booking_id).map(|e| *e.value())
    }

    /// Journal append + apply + publish in one call. The append is the
    /// commit point; the in-memory apply only runs once the event is durable.
    pub(super) async fn persist_and_apply(
        &self,
        room_id: Ulid,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.journal_append(event).await?;
        apply_to_room(rs, event, &self.booking_rooms);
        self.notify.publish(room_id, event);
        Ok(())
    }

    /// Lookup booking → room, get room state, acquire write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .room_id_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let rs = self
            .get_room_state(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.write_owned().await;
        Ok((room_id, guard))
    }
}

/// Extract the room id from an event that routes to a room's state.
fn event_room_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::RoomUpdated { room } => Some(room.id),
        Event::RoomStatusSet { id, .. } => Some(*id),
        Event::BookingCreated { booking, .. } | Event::BookingUpdated { booking } => {
            Some(booking.room_id)
        }
        Event::BookingCancelled { room_id, .. }
        | Event::BookingCheckedIn { room_id, .. }
        | Event::BookingCheckedOut { room_id, .. }
        | Event::BookingDeleted { room_id, .. } => Some(*room_id),
        Event::RoomCreated { .. }
        | Event::RoomDeleted { .. }
        | Event::GuestRegistered { .. }
        | Event::GuestUpdated { .. }
        | Event::GuestDeleted { .. } => None,
    }
}
