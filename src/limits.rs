//! Hard caps on inputs. Everything here is enforced at the engine boundary
//! and surfaced as `EngineError::LimitExceeded`.

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_DESCRIPTION_LEN: usize = 512;
pub const MAX_ROOM_NUMBER_LEN: usize = 16;
pub const MAX_PASSPORT_LEN: usize = 32;

/// Longest stay (and widest availability query window), in nights.
pub const MAX_STAY_NIGHTS: i64 = 1_000;

pub const MAX_GUESTS_PER_BOOKING: usize = 16;

/// Most units of one service attachable in a single call.
pub const MAX_UNITS_PER_ATTACH: usize = 100;

pub const MAX_ROOMS: usize = 10_000;
