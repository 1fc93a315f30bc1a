use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fixed-point money — never binary floating point.
pub type Money = Decimal;

// Per-kind integer identifiers, allocated by `engine::ids::IdAllocator`.
pub type RoomTypeId = i64;
pub type RoomId = i64;
pub type ClientId = i64;
pub type ServiceId = i64;
pub type BookingId = i64;
pub type GuestLinkId = i64;
pub type ServiceLinkId = i64;

/// Half-open stay interval `[start, end)` in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StayRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "StayRange start must be before end");
        Self { start, end }
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Occupancy on a single night: `start <= day < end`.
    /// The checkout day is free.
    pub fn covers_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }
}

/// Caller capability for availability queries. Restricted callers cannot
/// read booking data, so the index refuses rather than reporting every
/// room as free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Full,
    Restricted,
}

// ── Entity records ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: RoomTypeId,
    pub name: String,
    pub nightly_rate: Money,
    pub capacity: u32,
}

/// Informational only — availability is always derived from bookings,
/// never from this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Free,
    Occupied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub type_id: RoomTypeId,
    pub room_number: String,
    pub status: RoomStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub full_name: String,
    pub passport_number: String,
    pub prepayment: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub price: Money,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub room_id: RoomId,
    pub stay: StayRange,
    pub fee: Option<Money>,
    /// Rate snapshotted from the room's type at creation time. Later price
    /// edits never change the financials of an existing booking.
    pub nightly_rate: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingGuest {
    pub id: GuestLinkId,
    pub booking_id: BookingId,
    pub client_id: ClientId,
}

/// One row per unit consumed; quantity is modeled as repeated rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingService {
    pub id: ServiceLinkId,
    pub booking_id: BookingId,
    pub service_id: ServiceId,
}

// ── Per-room state ───────────────────────────────────────────────

/// A booking together with the link rows it owns. Dropping the record
/// drops the links — cascade by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRecord {
    pub booking: Booking,
    pub guests: Vec<BookingGuest>,
    pub services: Vec<BookingService>,
}

/// A room and its booking set. The engine wraps this in one `RwLock`;
/// holding the write guard is the serialization scope for every
/// check-then-insert on this room.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    /// Sorted by `stay.start`.
    pub bookings: Vec<BookingRecord>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            bookings: Vec::new(),
        }
    }

    /// Insert keeping sort order by stay start.
    pub fn insert_booking(&mut self, record: BookingRecord) {
        let pos = self
            .bookings
            .binary_search_by_key(&record.booking.stay.start, |r| r.booking.stay.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, record);
    }

    pub fn remove_booking(&mut self, id: BookingId) -> Option<BookingRecord> {
        if let Some(pos) = self.bookings.iter().position(|r| r.booking.id == id) {
            Some(self.bookings.remove(pos))
        } else {
            None
        }
    }

    pub fn booking(&self, id: BookingId) -> Option<&BookingRecord> {
        self.bookings.iter().find(|r| r.booking.id == id)
    }

    pub fn booking_mut(&mut self, id: BookingId) -> Option<&mut BookingRecord> {
        self.bookings.iter_mut().find(|r| r.booking.id == id)
    }

    /// Bookings whose stay overlaps the query window. Binary search skips
    /// everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &StayRange) -> impl Iterator<Item = &BookingRecord> {
        let right_bound = self
            .bookings
            .partition_point(|r| r.booking.stay.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |r| r.booking.stay.end > query.start)
    }
}

/// The WAL record format — flat, no nesting. Multi-row operations
/// (a booking plus its guest links, a cascade delete) are one event, so
/// their application is all-or-nothing by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomTypeCreated {
        row: RoomType,
    },
    RoomTypeUpdated {
        id: RoomTypeId,
        name: String,
        nightly_rate: Money,
        capacity: u32,
    },
    RoomTypeDeleted {
        id: RoomTypeId,
    },
    RoomCreated {
        row: Room,
    },
    RoomDeleted {
        id: RoomId,
    },
    ClientCreated {
        row: Client,
    },
    ClientDeleted {
        id: ClientId,
    },
    ServiceCreated {
        row: Service,
    },
    ServiceDeleted {
        id: ServiceId,
    },
    BookingCreated {
        booking: Booking,
        guests: Vec<BookingGuest>,
    },
    BookingDeleted {
        id: BookingId,
    },
    ServicesAttached {
        booking_id: BookingId,
        rows: Vec<BookingService>,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeRoom {
    pub room_id: RoomId,
    pub room_number: String,
    pub type_name: String,
    pub nightly_rate: Money,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub room_number: String,
    pub type_id: RoomTypeId,
    pub type_name: String,
    pub status: RoomStatus,
    pub nightly_rate: Money,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingInfo {
    pub booking_id: BookingId,
    pub room_id: RoomId,
    pub room_number: String,
    pub stay: StayRange,
    pub fee: Option<Money>,
    pub guest_count: usize,
}

/// One service aggregated across its unit rows on a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLine {
    pub service_id: ServiceId,
    pub name: String,
    pub unit_price: Money,
    pub units: usize,
    pub line_total: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Balance within the settlement tolerance.
    Settled,
    Overpaid,
    Underpaid,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Settled => write!(f, "OK"),
            PaymentStatus::Overpaid => write!(f, "overpaid"),
            PaymentStatus::Underpaid => write!(f, "underpaid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingSummary {
    pub booking_id: BookingId,
    pub nights: i64,
    pub room_total: Money,
    pub services_total: Money,
    pub fee: Money,
    pub grand_total: Money,
    pub prepayments_total: Money,
    pub balance: Money,
    pub status: PaymentStatus,
}
