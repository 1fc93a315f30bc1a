mod availability;
mod conflict;
mod error;
mod ids;
mod mutations;
mod queries;
mod reconcile;
mod slots;

pub use error::EngineError;
pub use reconcile::SETTLE_TOLERANCE;
pub use slots::GuestSlots;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::model::*;
use crate::wal::Wal;

use ids::IdAllocator;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The reservation and reconciliation engine: the seven logical tables,
/// rebuilt from the WAL at startup. Each room's booking set sits behind its
/// own lock; catalog tables are concurrent maps.
pub struct Engine {
    pub(super) room_types: DashMap<RoomTypeId, RoomType>,
    pub(super) clients: DashMap<ClientId, Client>,
    pub(super) services: DashMap<ServiceId, Service>,
    pub(super) rooms: DashMap<RoomId, SharedRoomState>,
    /// Reverse lookup: booking id → room id.
    pub(super) booking_rooms: DashMap<BookingId, RoomId>,
    /// Type → rooms index for cascade deletes.
    pub(super) rooms_by_type: DashMap<RoomTypeId, Vec<RoomId>>,
    pub(super) ids: IdAllocator,
    /// Catalog mutations (creates, updates, cascade deletes) take this
    /// write-side; booking commits take it read-side. Bookings on
    /// different rooms still run in parallel, but a cascade can never
    /// interleave with a booking's existence checks.
    pub(super) catalog_lock: RwLock<()>,
    wal_tx: mpsc::Sender<WalCommand>,
}

/// Apply a booking-level event to one room's state (no locking — caller
/// holds the write guard).
fn apply_room_event(
    rs: &mut RoomState,
    event: &Event,
    booking_rooms: &DashMap<BookingId, RoomId>,
) {
    match event {
        Event::BookingCreated { booking, guests } => {
            booking_rooms.insert(booking.id, booking.room_id);
            rs.insert_booking(BookingRecord {
                booking: booking.clone(),
                guests: guests.clone(),
                services: Vec::new(),
            });
        }
        Event::BookingDeleted { id } => {
            rs.remove_booking(*id);
            booking_rooms.remove(id);
        }
        Event::ServicesAttached { booking_id, rows } => {
            if let Some(rec) = rs.booking_mut(*booking_id) {
                rec.services.extend(rows.iter().cloned());
            }
        }
        _ => {}
    }
}

/// Remove one client's guest links from every booking in this room.
fn strip_client_links(rs: &mut RoomState, client_id: ClientId) {
    for rec in &mut rs.bookings {
        rec.guests.retain(|g| g.client_id != client_id);
    }
}

/// Remove one service's unit rows from every booking in this room.
fn strip_service_links(rs: &mut RoomState, service_id: ServiceId) {
    for rec in &mut rs.bookings {
        rec.services.retain(|s| s.service_id != service_id);
    }
}

impl Engine {
    /// Replay the WAL and start the group-commit writer. Must be called
    /// inside a tokio runtime.
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            room_types: DashMap::new(),
            clients: DashMap::new(),
            services: DashMap::new(),
            rooms: DashMap::new(),
            booking_rooms: DashMap::new(),
            rooms_by_type: DashMap::new(),
            ids: IdAllocator::new(),
            catalog_lock: RwLock::new(()),
            wal_tx,
        };

        for event in &events {
            engine.ids.observe_event(event);
            engine.replay_apply(event);
        }

        Ok(engine)
    }

    /// Apply one replayed event. We are the sole owner of every room Arc
    /// here, so try_write always succeeds instantly. Never use
    /// blocking_write — replay may run inside an async context.
    fn replay_apply(&self, event: &Event) {
        match event {
            Event::RoomTypeCreated { row } => {
                self.rooms_by_type.entry(row.id).or_default();
                self.room_types.insert(row.id, row.clone());
            }
            Event::RoomTypeUpdated {
                id,
                name,
                nightly_rate,
                capacity,
            } => {
                if let Some(mut rt) = self.room_types.get_mut(id) {
                    rt.name = name.clone();
                    rt.nightly_rate = *nightly_rate;
                    rt.capacity = *capacity;
                }
            }
            Event::RoomTypeDeleted { id } => {
                let room_ids = self
                    .rooms_by_type
                    .remove(id)
                    .map(|(_, v)| v)
                    .unwrap_or_default();
                for rid in room_ids {
                    self.drop_room_state(rid);
                }
                self.room_types.remove(id);
            }
            Event::RoomCreated { row } => {
                self.rooms_by_type.entry(row.type_id).or_default().push(row.id);
                self.rooms
                    .insert(row.id, Arc::new(RwLock::new(RoomState::new(row.clone()))));
            }
            Event::RoomDeleted { id } => {
                if let Some(entry) = self.rooms.get(id) {
                    let type_id = entry
                        .try_read()
                        .expect("replay: uncontended read")
                        .room
                        .type_id;
                    if let Some(mut siblings) = self.rooms_by_type.get_mut(&type_id) {
                        siblings.retain(|r| r != id);
                    }
                }
                self.drop_room_state(*id);
            }
            Event::ClientCreated { row } => {
                self.clients.insert(row.id, row.clone());
            }
            Event::ClientDeleted { id } => {
                for entry in self.rooms.iter() {
                    let rs = entry.value().clone();
                    let mut guard = rs.try_write().expect("replay: uncontended write");
                    strip_client_links(&mut guard, *id);
                }
                self.clients.remove(id);
            }
            Event::ServiceCreated { row } => {
                self.services.insert(row.id, row.clone());
            }
            Event::ServiceDeleted { id } => {
                for entry in self.rooms.iter() {
                    let rs = entry.value().clone();
                    let mut guard = rs.try_write().expect("replay: uncontended write");
                    strip_service_links(&mut guard, *id);
                }
                self.services.remove(id);
            }
            Event::BookingCreated { booking, .. } => {
                if let Some(entry) = self.rooms.get(&booking.room_id) {
                    let rs = entry.value().clone();
                    let mut guard = rs.try_write().expect("replay: uncontended write");
                    apply_room_event(&mut guard, event, &self.booking_rooms);
                }
            }
            Event::BookingDeleted { id } | Event::ServicesAttached { booking_id: id, .. } => {
                let Some(room_id) = self.booking_rooms.get(id).map(|e| *e.value()) else {
                    return;
                };
                if let Some(entry) = self.rooms.get(&room_id) {
                    let rs = entry.value().clone();
                    let mut guard = rs.try_write().expect("replay: uncontended write");
                    apply_room_event(&mut guard, event, &self.booking_rooms);
                }
            }
        }
    }

    /// Remove a room and every booking mapping it holds. Used by room and
    /// room-type cascades (replay path; live mutations hold their own
    /// guards and do the same inline).
    fn drop_room_state(&self, room_id: RoomId) {
        if let Some((_, rs)) = self.rooms.remove(&room_id) {
            let guard = rs.try_read().expect("replay: uncontended read");
            for rec in &guard.bookings {
                self.booking_rooms.remove(&rec.booking.id);
            }
        }
    }

    /// Write an event to the WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    /// WAL-append + apply under an already-held room write guard. Nothing
    /// is applied if the append fails, so state never runs ahead of the log.
    pub(super) async fn persist_and_apply_room(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_room_event(rs, event, &self.booking_rooms);
        Ok(())
    }

    pub(super) fn room(&self, id: RoomId) -> Result<SharedRoomState, EngineError> {
        self.rooms
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::UnknownRoom(id))
    }

    /// Resolve a booking id to its room and take the write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: BookingId,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let room_id = self
            .booking_rooms
            .get(&booking_id)
            .map(|e| *e.value())
            .ok_or(EngineError::BookingNotFound(booking_id))?;
        let rs = self
            .room(room_id)
            .map_err(|_| EngineError::BookingNotFound(booking_id))?;
        let guard = rs.write_owned().await;
        // The booking may have been cascaded away while we waited.
        if guard.booking(booking_id).is_none() {
            return Err(EngineError::BookingNotFound(booking_id));
        }
        Ok(guard)
    }

    /// Write-lock every room in ascending id order. Multi-room cascades go
    /// through here so two of them can never deadlock.
    pub(super) async fn lock_all_rooms(
        &self,
    ) -> Vec<tokio::sync::OwnedRwLockWriteGuard<RoomState>> {
        let mut ids: Vec<RoomId> = self.rooms.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            // Clone the Arc out before awaiting — never hold a map shard
            // across a lock acquisition.
            let Some(rs) = self.rooms.get(&id).map(|e| e.value().clone()) else {
                continue;
            };
            guards.push(rs.write_owned().await);
        }
        guards
    }

    /// Rewrite the WAL with only the events needed to recreate current
    /// state. Explicit maintenance — the engine never compacts on its own.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        // Quiesce everything — catalog and every room — so no append can
        // land between snapshot construction and the file swap and be lost.
        let _cat = self.catalog_lock.write().await;
        let guards = self.lock_all_rooms().await;

        let mut events = Vec::new();
        let mut type_ids: Vec<RoomTypeId> = self.room_types.iter().map(|e| *e.key()).collect();
        type_ids.sort_unstable();
        for id in type_ids {
            if let Some(rt) = self.room_types.get(&id) {
                events.push(Event::RoomTypeCreated { row: rt.clone() });
            }
        }

        let mut client_ids: Vec<ClientId> = self.clients.iter().map(|e| *e.key()).collect();
        client_ids.sort_unstable();
        for id in client_ids {
            if let Some(c) = self.clients.get(&id) {
                events.push(Event::ClientCreated { row: c.clone() });
            }
        }

        let mut service_ids: Vec<ServiceId> = self.services.iter().map(|e| *e.key()).collect();
        service_ids.sort_unstable();
        for id in service_ids {
            if let Some(s) = self.services.get(&id) {
                events.push(Event::ServiceCreated { row: s.clone() });
            }
        }

        for guard in &guards {
            events.push(Event::RoomCreated {
                row: guard.room.clone(),
            });
            for rec in &guard.bookings {
                events.push(Event::BookingCreated {
                    booking: rec.booking.clone(),
                    guests: rec.guests.clone(),
                });
                if !rec.services.is_empty() {
                    events.push(Event::ServicesAttached {
                        booking_id: rec.booking.id,
                        rows: rec.services.clone(),
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
