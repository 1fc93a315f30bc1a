use chrono::NaiveDate;

use crate::limits::MAX_STAY_NIGHTS;
use crate::model::{Money, RoomState, StayRange};

use super::EngineError;

/// Validate and build a stay interval from raw dates.
pub(crate) fn validate_stay(start: NaiveDate, end: NaiveDate) -> Result<StayRange, EngineError> {
    if start >= end {
        return Err(EngineError::InvalidRange);
    }
    let stay = StayRange::new(start, end);
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(stay)
}

pub(crate) fn validate_money(amount: Money, what: &'static str) -> Result<(), EngineError> {
    if amount < Money::ZERO {
        return Err(EngineError::InvalidValue(what));
    }
    Ok(())
}

pub(crate) fn validate_name(
    name: &str,
    max_len: usize,
    what: &'static str,
) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::InvalidValue(what));
    }
    if name.len() > max_len {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

/// The commit-time overlap re-check. Caller must hold the room's write
/// lock so nothing can slip in between this check and the insert.
pub(crate) fn check_room_free(rs: &RoomState, stay: &StayRange) -> Result<(), EngineError> {
    if rs.overlapping(stay).next().is_some() {
        return Err(EngineError::RoomUnavailable(rs.room.id));
    }
    Ok(())
}
