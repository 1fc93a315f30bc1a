use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::limits::*;
use crate::model::*;
use crate::observability::{record_op, BOOKINGS_REJECTED_TOTAL};

use super::conflict::{check_room_free, validate_money, validate_name, validate_stay};
use super::ids::EntityKind;
use super::{Engine, EngineError};

fn validate_guests(guests: &[ClientId]) -> Result<(), EngineError> {
    if guests.is_empty() {
        return Err(EngineError::InvalidGuestList("empty guest list"));
    }
    if guests.len() > MAX_GUESTS_PER_BOOKING {
        return Err(EngineError::LimitExceeded("too many guests"));
    }
    for (i, id) in guests.iter().enumerate() {
        if guests[..i].contains(id) {
            return Err(EngineError::InvalidGuestList("duplicate guest"));
        }
    }
    Ok(())
}

impl Engine {
    // ── Catalog creates/updates ──────────────────────────────────

    pub async fn create_room_type(
        &self,
        name: &str,
        nightly_rate: Money,
        capacity: u32,
    ) -> Result<RoomTypeId, EngineError> {
        validate_name(name, MAX_NAME_LEN, "room type name")?;
        validate_money(nightly_rate, "negative nightly rate")?;
        if capacity == 0 {
            return Err(EngineError::InvalidValue("zero capacity"));
        }

        let _cat = self.catalog_lock.write().await;
        let id = self.ids.next(EntityKind::RoomType);
        let row = RoomType {
            id,
            name: name.trim().to_string(),
            nightly_rate,
            capacity,
        };
        self.wal_append(&Event::RoomTypeCreated { row: row.clone() })
            .await?;
        self.rooms_by_type.entry(id).or_default();
        self.room_types.insert(id, row);
        Ok(id)
    }

    /// Edit a room type. Existing bookings keep the rate they snapshotted
    /// at creation; only future bookings see the new price.
    pub async fn update_room_type(
        &self,
        id: RoomTypeId,
        name: &str,
        nightly_rate: Money,
        capacity: u32,
    ) -> Result<(), EngineError> {
        validate_name(name, MAX_NAME_LEN, "room type name")?;
        validate_money(nightly_rate, "negative nightly rate")?;
        if capacity == 0 {
            return Err(EngineError::InvalidValue("zero capacity"));
        }

        let _cat = self.catalog_lock.write().await;
        if !self.room_types.contains_key(&id) {
            return Err(EngineError::UnknownRoomType(id));
        }
        self.wal_append(&Event::RoomTypeUpdated {
            id,
            name: name.trim().to_string(),
            nightly_rate,
            capacity,
        })
        .await?;
        if let Some(mut rt) = self.room_types.get_mut(&id) {
            rt.name = name.trim().to_string();
            rt.nightly_rate = nightly_rate;
            rt.capacity = capacity;
        }
        Ok(())
    }

    pub async fn create_room(
        &self,
        type_id: RoomTypeId,
        room_number: &str,
    ) -> Result<RoomId, EngineError> {
        validate_name(room_number, MAX_ROOM_NUMBER_LEN, "room number")?;

        let _cat = self.catalog_lock.write().await;
        if !self.room_types.contains_key(&type_id) {
            return Err(EngineError::UnknownRoomType(type_id));
        }
        if self.rooms.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }

        let id = self.ids.next(EntityKind::Room);
        let row = Room {
            id,
            type_id,
            room_number: room_number.trim().to_string(),
            status: RoomStatus::Free,
        };
        self.wal_append(&Event::RoomCreated { row: row.clone() })
            .await?;
        self.rooms_by_type.entry(type_id).or_default().push(id);
        self.rooms.insert(
            id,
            std::sync::Arc::new(tokio::sync::RwLock::new(RoomState::new(row))),
        );
        Ok(id)
    }

    pub async fn create_client(
        &self,
        full_name: &str,
        passport_number: &str,
        prepayment: Money,
    ) -> Result<ClientId, EngineError> {
        validate_name(full_name, MAX_NAME_LEN, "client name")?;
        validate_name(passport_number, MAX_PASSPORT_LEN, "passport number")?;
        validate_money(prepayment, "negative prepayment")?;

        let _cat = self.catalog_lock.write().await;
        let id = self.ids.next(EntityKind::Client);
        let row = Client {
            id,
            full_name: full_name.trim().to_string(),
            passport_number: passport_number.trim().to_string(),
            prepayment,
        };
        self.wal_append(&Event::ClientCreated { row: row.clone() })
            .await?;
        self.clients.insert(id, row);
        Ok(id)
    }

    pub async fn create_service(
        &self,
        name: &str,
        price: Money,
        description: &str,
    ) -> Result<ServiceId, EngineError> {
        validate_name(name, MAX_NAME_LEN, "service name")?;
        validate_money(price, "negative service price")?;
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(EngineError::LimitExceeded("service description"));
        }

        let _cat = self.catalog_lock.write().await;
        let id = self.ids.next(EntityKind::Service);
        let row = Service {
            id,
            name: name.trim().to_string(),
            price,
            description: description.to_string(),
        };
        self.wal_append(&Event::ServiceCreated { row: row.clone() })
            .await?;
        self.services.insert(id, row);
        Ok(id)
    }

    // ── Booking creation ─────────────────────────────────────────

    /// Validate and commit a new booking with its guest links as one
    /// atomic unit.
    ///
    /// Preconditions fail fast, in order, each with its own error kind:
    /// range, guest list, guest existence, room existence, availability.
    /// The availability check runs under the room's write lock and the
    /// lock is held through the WAL append and the state apply, so a prior
    /// `free_rooms` answer is never trusted — the race window between
    /// "show available rooms" and "commit" is closed here.
    pub async fn create_booking(
        &self,
        room_id: RoomId,
        start: NaiveDate,
        end: NaiveDate,
        fee: Option<Money>,
        guests: &[ClientId],
    ) -> Result<BookingId, EngineError> {
        let started = Instant::now();
        let result = self
            .create_booking_inner(room_id, start, end, fee, guests)
            .await;
        record_op("create_booking", started, result.is_ok());
        result
    }

    async fn create_booking_inner(
        &self,
        room_id: RoomId,
        start: NaiveDate,
        end: NaiveDate,
        fee: Option<Money>,
        guests: &[ClientId],
    ) -> Result<BookingId, EngineError> {
        let stay = validate_stay(start, end)?;
        validate_guests(guests)?;
        if let Some(f) = fee {
            validate_money(f, "negative booking fee")?;
        }

        // Catalog read lock: keeps guest existence and the rate snapshot
        // stable against concurrent cascade deletes. Bookings on different
        // rooms still commit in parallel.
        let _cat = self.catalog_lock.read().await;
        for &client_id in guests {
            if !self.clients.contains_key(&client_id) {
                return Err(EngineError::UnknownClient(client_id));
            }
        }

        let rs = self.room(room_id)?;
        let mut guard = rs.write().await;

        if let Err(e) = check_room_free(&guard, &stay) {
            metrics::counter!(BOOKINGS_REJECTED_TOTAL).increment(1);
            debug!(room_id, "booking rejected: room unavailable");
            return Err(e);
        }

        let nightly_rate = self
            .room_types
            .get(&guard.room.type_id)
            .map(|rt| rt.nightly_rate)
            .ok_or_else(|| EngineError::Storage("room references missing type".into()))?;

        let booking_id = self.ids.next(EntityKind::Booking);
        let guest_rows: Vec<BookingGuest> = guests
            .iter()
            .map(|&client_id| BookingGuest {
                id: self.ids.next(EntityKind::GuestLink),
                booking_id,
                client_id,
            })
            .collect();
        let booking = Booking {
            id: booking_id,
            room_id,
            stay,
            fee,
            nightly_rate,
        };

        let event = Event::BookingCreated {
            booking,
            guests: guest_rows,
        };
        self.persist_and_apply_room(&mut guard, &event).await?;

        info!(booking_id, room_id, nights = stay.nights(), "booking created");
        Ok(booking_id)
    }

    /// Attach `units` units of a service to a booking — one link row per
    /// unit, inserted as one atomic event. Rows are never mutated
    /// afterwards; they only disappear with their booking or service.
    pub async fn attach_service(
        &self,
        booking_id: BookingId,
        service_id: ServiceId,
        units: usize,
    ) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self
            .attach_service_inner(booking_id, service_id, units)
            .await;
        record_op("attach_service", started, result.is_ok());
        result
    }

    async fn attach_service_inner(
        &self,
        booking_id: BookingId,
        service_id: ServiceId,
        units: usize,
    ) -> Result<(), EngineError> {
        if units == 0 {
            return Err(EngineError::InvalidValue("zero service units"));
        }
        if units > MAX_UNITS_PER_ATTACH {
            return Err(EngineError::LimitExceeded("too many service units"));
        }

        let _cat = self.catalog_lock.read().await;
        if !self.services.contains_key(&service_id) {
            return Err(EngineError::UnknownService(service_id));
        }

        let mut guard = self.resolve_booking_write(booking_id).await?;
        let rows: Vec<BookingService> = (0..units)
            .map(|_| BookingService {
                id: self.ids.next(EntityKind::ServiceLink),
                booking_id,
                service_id,
            })
            .collect();
        let event = Event::ServicesAttached { booking_id, rows };
        self.persist_and_apply_room(&mut guard, &event).await
    }

    // ── Deletes (cascading, each one atomic event) ───────────────

    pub async fn delete_booking(&self, id: BookingId) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = async {
            let mut guard = self.resolve_booking_write(id).await?;
            let event = Event::BookingDeleted { id };
            self.persist_and_apply_room(&mut guard, &event).await?;
            info!(booking_id = id, "booking deleted");
            Ok(())
        }
        .await;
        record_op("delete_booking", started, result.is_ok());
        result
    }

    /// Delete a room and, through it, every booking it holds (links
    /// included). The room's lock is held across the append and the
    /// removal so no booking can slip in mid-delete.
    pub async fn delete_room(&self, id: RoomId) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self.delete_room_inner(id).await;
        record_op("delete_room", started, result.is_ok());
        result
    }

    async fn delete_room_inner(&self, id: RoomId) -> Result<(), EngineError> {
        let _cat = self.catalog_lock.write().await;
        let rs = self.room(id)?;
        let guard = rs.write().await;

        self.wal_append(&Event::RoomDeleted { id }).await?;
        for rec in &guard.bookings {
            self.booking_rooms.remove(&rec.booking.id);
        }
        if let Some(mut siblings) = self.rooms_by_type.get_mut(&guard.room.type_id) {
            siblings.retain(|r| r != &id);
        }
        self.rooms.remove(&id);
        info!(room_id = id, "room deleted");
        Ok(())
    }

    /// Delete a room type and cascade through all its rooms and their
    /// bookings. All affected room locks are taken in ascending id order
    /// before the single event is appended.
    pub async fn delete_room_type(&self, id: RoomTypeId) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self.delete_room_type_inner(id).await;
        record_op("delete_room_type", started, result.is_ok());
        result
    }

    async fn delete_room_type_inner(&self, id: RoomTypeId) -> Result<(), EngineError> {
        let _cat = self.catalog_lock.write().await;
        if !self.room_types.contains_key(&id) {
            return Err(EngineError::UnknownRoomType(id));
        }

        let mut room_ids: Vec<RoomId> = self
            .rooms_by_type
            .get(&id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        room_ids.sort_unstable();

        let mut guards = Vec::with_capacity(room_ids.len());
        for rid in &room_ids {
            let Some(rs) = self.rooms.get(rid).map(|e| e.value().clone()) else {
                continue;
            };
            guards.push(rs.write_owned().await);
        }

        self.wal_append(&Event::RoomTypeDeleted { id }).await?;
        for guard in &guards {
            for rec in &guard.bookings {
                self.booking_rooms.remove(&rec.booking.id);
            }
            self.rooms.remove(&guard.room.id);
        }
        self.rooms_by_type.remove(&id);
        self.room_types.remove(&id);
        info!(type_id = id, rooms = guards.len(), "room type deleted");
        Ok(())
    }

    /// Delete a client. Only that client's guest links are cascaded;
    /// bookings themselves stay (possibly with fewer guests), matching
    /// the ownership rules of the data model.
    pub async fn delete_client(&self, id: ClientId) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self.delete_client_inner(id).await;
        record_op("delete_client", started, result.is_ok());
        result
    }

    async fn delete_client_inner(&self, id: ClientId) -> Result<(), EngineError> {
        let _cat = self.catalog_lock.write().await;
        if !self.clients.contains_key(&id) {
            return Err(EngineError::UnknownClient(id));
        }

        let mut guards = self.lock_all_rooms().await;
        self.wal_append(&Event::ClientDeleted { id }).await?;
        for guard in &mut guards {
            super::strip_client_links(guard, id);
        }
        self.clients.remove(&id);
        info!(client_id = id, "client deleted");
        Ok(())
    }

    /// Delete a service and every unit row referencing it, then the
    /// service itself.
    pub async fn delete_service(&self, id: ServiceId) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self.delete_service_inner(id).await;
        record_op("delete_service", started, result.is_ok());
        result
    }

    async fn delete_service_inner(&self, id: ServiceId) -> Result<(), EngineError> {
        let _cat = self.catalog_lock.write().await;
        if !self.services.contains_key(&id) {
            return Err(EngineError::UnknownService(id));
        }

        let mut guards = self.lock_all_rooms().await;
        self.wal_append(&Event::ServiceDeleted { id }).await?;
        for guard in &mut guards {
            super::strip_service_links(guard, id);
        }
        self.services.remove(&id);
        info!(service_id = id, "service deleted");
        Ok(())
    }
}
