use std::time::Instant;

use chrono::NaiveDate;

use crate::model::*;
use crate::observability::record_op;

use super::conflict::validate_stay;
use super::{Engine, EngineError};

impl Engine {
    /// Rooms with no booking overlapping `[start, end)`, joined with their
    /// type for display, ordered by room id. Answers are point-in-time: a
    /// caller must never treat them as a hold — `create_booking` re-checks
    /// under the room lock.
    ///
    /// Restricted callers cannot read booking data; they get
    /// `PermissionDenied` instead of a room list that only looks free.
    pub async fn free_rooms(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        access: Access,
    ) -> Result<Vec<FreeRoom>, EngineError> {
        let started = Instant::now();
        let result = self.free_rooms_inner(start, end, access).await;
        record_op("free_rooms", started, result.is_ok());
        result
    }

    /// The single-date report form: which rooms are free on the night of
    /// `day`. A room booked `[a, b)` is occupied on `a..b-1` and free
    /// again on its checkout day `b`.
    pub async fn free_rooms_on(
        &self,
        day: NaiveDate,
        access: Access,
    ) -> Result<Vec<FreeRoom>, EngineError> {
        let end = day.succ_opt().ok_or(EngineError::InvalidRange)?;
        self.free_rooms(day, end, access).await
    }

    async fn free_rooms_inner(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        access: Access,
    ) -> Result<Vec<FreeRoom>, EngineError> {
        if access == Access::Restricted {
            return Err(EngineError::PermissionDenied);
        }
        let stay = validate_stay(start, end)?;

        let mut room_ids: Vec<RoomId> = self.rooms.iter().map(|e| *e.key()).collect();
        room_ids.sort_unstable();

        let mut free = Vec::new();
        for id in room_ids {
            let Some(entry) = self.rooms.get(&id) else {
                continue; // deleted while we scanned
            };
            let rs = entry.value().clone();
            drop(entry);
            let guard = rs.read().await;
            if guard.overlapping(&stay).next().is_some() {
                continue;
            }
            let rt = self
                .room_types
                .get(&guard.room.type_id)
                .ok_or_else(|| EngineError::Storage("room references missing type".into()))?;
            free.push(FreeRoom {
                room_id: guard.room.id,
                room_number: guard.room.room_number.clone(),
                type_name: rt.name.clone(),
                nightly_rate: rt.nightly_rate,
                capacity: rt.capacity,
            });
        }
        Ok(free)
    }
}
