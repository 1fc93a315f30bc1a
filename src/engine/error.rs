use crate::model::{BookingId, ClientId, RoomId, RoomTypeId, ServiceId};

#[derive(Debug)]
pub enum EngineError {
    /// Stay start is not strictly before stay end.
    InvalidRange,
    /// Guest list empty or containing a duplicate client.
    InvalidGuestList(&'static str),
    UnknownClient(ClientId),
    UnknownRoom(RoomId),
    UnknownRoomType(RoomTypeId),
    UnknownService(ServiceId),
    /// An overlapping booking exists — including races caught at commit.
    RoomUnavailable(RoomId),
    /// Caller's capability cannot read booking data.
    PermissionDenied,
    BookingNotFound(BookingId),
    /// Field-level validation failure (negative money, empty name, ...).
    InvalidValue(&'static str),
    LimitExceeded(&'static str),
    /// Transport or durability failure from the storage layer.
    Storage(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange => write!(f, "invalid date range: start must be before end"),
            EngineError::InvalidGuestList(why) => write!(f, "invalid guest list: {why}"),
            EngineError::UnknownClient(id) => write!(f, "unknown client: {id}"),
            EngineError::UnknownRoom(id) => write!(f, "unknown room: {id}"),
            EngineError::UnknownRoomType(id) => write!(f, "unknown room type: {id}"),
            EngineError::UnknownService(id) => write!(f, "unknown service: {id}"),
            EngineError::RoomUnavailable(id) => {
                write!(f, "room {id} is not available for the requested dates")
            }
            EngineError::PermissionDenied => {
                write!(f, "permission denied: booking data is not readable")
            }
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::InvalidValue(what) => write!(f, "invalid value: {what}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
