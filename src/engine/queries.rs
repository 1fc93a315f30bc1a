use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub fn list_room_types(&self) -> Vec<RoomType> {
        let mut types: Vec<RoomType> = self.room_types.iter().map(|e| e.value().clone()).collect();
        types.sort_by_key(|t| t.id);
        types
    }

    pub fn list_clients(&self) -> Vec<Client> {
        let mut clients: Vec<Client> = self.clients.iter().map(|e| e.value().clone()).collect();
        clients.sort_by_key(|c| c.id);
        clients
    }

    pub fn list_services(&self) -> Vec<Service> {
        let mut services: Vec<Service> = self.services.iter().map(|e| e.value().clone()).collect();
        services.sort_by_key(|s| s.id);
        services
    }

    /// Every room joined with its type, ordered by room id.
    pub async fn list_rooms(&self) -> Result<Vec<RoomInfo>, EngineError> {
        let mut room_ids: Vec<RoomId> = self.rooms.iter().map(|e| *e.key()).collect();
        room_ids.sort_unstable();

        let mut rooms = Vec::with_capacity(room_ids.len());
        for id in room_ids {
            let Some(entry) = self.rooms.get(&id) else {
                continue;
            };
            let rs = entry.value().clone();
            drop(entry);
            let guard = rs.read().await;
            let rt = self
                .room_types
                .get(&guard.room.type_id)
                .ok_or_else(|| EngineError::Storage("room references missing type".into()))?;
            rooms.push(RoomInfo {
                room_id: guard.room.id,
                room_number: guard.room.room_number.clone(),
                type_id: guard.room.type_id,
                type_name: rt.name.clone(),
                status: guard.room.status,
                nightly_rate: rt.nightly_rate,
                capacity: rt.capacity,
            });
        }
        Ok(rooms)
    }

    /// Every booking with its room number and guest count, ordered by
    /// booking id.
    pub async fn list_bookings(&self) -> Result<Vec<BookingInfo>, EngineError> {
        let mut room_ids: Vec<RoomId> = self.rooms.iter().map(|e| *e.key()).collect();
        room_ids.sort_unstable();

        let mut bookings = Vec::new();
        for id in room_ids {
            let Some(entry) = self.rooms.get(&id) else {
                continue;
            };
            let rs = entry.value().clone();
            drop(entry);
            let guard = rs.read().await;
            for rec in &guard.bookings {
                bookings.push(BookingInfo {
                    booking_id: rec.booking.id,
                    room_id: rec.booking.room_id,
                    room_number: guard.room.room_number.clone(),
                    stay: rec.booking.stay,
                    fee: rec.booking.fee,
                    guest_count: rec.guests.len(),
                });
            }
        }
        bookings.sort_by_key(|b| b.booking_id);
        Ok(bookings)
    }

    /// The full client rows of a booking's guests, ordered by client id.
    pub async fn booking_guests(&self, booking_id: BookingId) -> Result<Vec<Client>, EngineError> {
        let room_id = self
            .booking_rooms
            .get(&booking_id)
            .map(|e| *e.value())
            .ok_or(EngineError::BookingNotFound(booking_id))?;
        let rs = self
            .room(room_id)
            .map_err(|_| EngineError::BookingNotFound(booking_id))?;
        let guard = rs.read().await;
        let rec = guard
            .booking(booking_id)
            .ok_or(EngineError::BookingNotFound(booking_id))?;

        let mut guests = Vec::with_capacity(rec.guests.len());
        for link in &rec.guests {
            let client = self
                .clients
                .get(&link.client_id)
                .map(|c| c.value().clone())
                .ok_or_else(|| EngineError::Storage("booking references missing client".into()))?;
            guests.push(client);
        }
        guests.sort_by_key(|c| c.id);
        Ok(guests)
    }

    /// A booking's services aggregated across unit rows, ordered by
    /// service id.
    pub async fn booking_services(
        &self,
        booking_id: BookingId,
    ) -> Result<Vec<ServiceLine>, EngineError> {
        let room_id = self
            .booking_rooms
            .get(&booking_id)
            .map(|e| *e.value())
            .ok_or(EngineError::BookingNotFound(booking_id))?;
        let rs = self
            .room(room_id)
            .map_err(|_| EngineError::BookingNotFound(booking_id))?;
        let guard = rs.read().await;
        let rec = guard
            .booking(booking_id)
            .ok_or(EngineError::BookingNotFound(booking_id))?;

        let mut units_by_service: std::collections::BTreeMap<ServiceId, usize> =
            std::collections::BTreeMap::new();
        for row in &rec.services {
            *units_by_service.entry(row.service_id).or_default() += 1;
        }

        let mut lines = Vec::with_capacity(units_by_service.len());
        for (service_id, units) in units_by_service {
            let service = self
                .services
                .get(&service_id)
                .map(|s| s.value().clone())
                .ok_or_else(|| EngineError::Storage("booking references missing service".into()))?;
            lines.push(ServiceLine {
                service_id,
                name: service.name,
                unit_price: service.price,
                units,
                line_total: service.price * Money::from(units as i64),
            });
        }
        Ok(lines)
    }
}
