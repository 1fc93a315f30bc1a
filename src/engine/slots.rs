use crate::limits::MAX_GUESTS_PER_BOOKING;
use crate::model::ClientId;

use super::EngineError;

/// The booking wizard's guest positions: the caller declares a guest count
/// up front, then fills each slot with exactly one client. A filled slot is
/// locked against re-selection.
///
/// The duplicate check here is advisory — it gives the wizard an early,
/// friendly rejection. The engine re-verifies the final list in
/// `create_booking` regardless of what this type reported.
#[derive(Debug, Clone)]
pub struct GuestSlots {
    slots: Vec<Option<ClientId>>,
}

impl GuestSlots {
    pub fn new(count: usize) -> Result<Self, EngineError> {
        if count == 0 {
            return Err(EngineError::InvalidGuestList("guest count must be at least 1"));
        }
        if count > MAX_GUESTS_PER_BOOKING {
            return Err(EngineError::LimitExceeded("too many guests"));
        }
        Ok(Self {
            slots: vec![None; count],
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fill one slot with a client. Fails if the slot index is out of
    /// range, the slot is already locked, or the client sits in another
    /// slot.
    pub fn fill(&mut self, slot: usize, client_id: ClientId) -> Result<(), EngineError> {
        if slot >= self.slots.len() {
            return Err(EngineError::InvalidGuestList("no such slot"));
        }
        if self.slots[slot].is_some() {
            return Err(EngineError::InvalidGuestList("slot already filled"));
        }
        if self.slots.iter().any(|s| *s == Some(client_id)) {
            return Err(EngineError::InvalidGuestList("client already in another slot"));
        }
        self.slots[slot] = Some(client_id);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }

    /// Empty every slot, keeping the declared count.
    pub fn clear(&mut self) {
        for s in &mut self.slots {
            *s = None;
        }
    }

    /// The final guest list, only once every slot is filled.
    pub fn client_ids(&self) -> Result<Vec<ClientId>, EngineError> {
        self.slots
            .iter()
            .map(|s| s.ok_or(EngineError::InvalidGuestList("unfilled slot")))
            .collect()
    }
}
