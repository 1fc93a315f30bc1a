use std::time::Instant;

use rust_decimal_macros::dec;

use crate::model::*;
use crate::observability::record_op;

use super::{Engine, EngineError};

/// A balance within ±this is considered settled. Carried over from the
/// accounting rules of the desk-clerk workflow: small discrepancies from
/// rounding on partial prepayments are not chased.
pub const SETTLE_TOLERANCE: Money = dec!(1.00);

fn classify(balance: Money) -> PaymentStatus {
    if balance > SETTLE_TOLERANCE {
        PaymentStatus::Overpaid
    } else if balance < -SETTLE_TOLERANCE {
        PaymentStatus::Underpaid
    } else {
        PaymentStatus::Settled
    }
}

impl Engine {
    /// The authoritative financial reconciliation for one booking, always
    /// derived fresh from current state — never cached, no side effects.
    ///
    /// Room charge uses the nightly rate snapshotted into the booking;
    /// service charges and guest prepayments are read live (one unit per
    /// service row, one shared prepayment value per client record).
    pub async fn summarize(&self, booking_id: BookingId) -> Result<BookingSummary, EngineError> {
        let started = Instant::now();
        let result = self.summarize_inner(booking_id).await;
        record_op("summarize", started, result.is_ok());
        result
    }

    async fn summarize_inner(
        &self,
        booking_id: BookingId,
    ) -> Result<BookingSummary, EngineError> {
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

        let nights = rec.booking.stay.nights();
        let room_total = Money::from(nights) * rec.booking.nightly_rate;

        let mut services_total = Money::ZERO;
        for row in &rec.services {
            let price = self
                .services
                .get(&row.service_id)
                .map(|s| s.price)
                .ok_or_else(|| EngineError::Storage("booking references missing service".into()))?;
            services_total += price;
        }

        let fee = rec.booking.fee.unwrap_or(Money::ZERO);
        let grand_total = room_total + fee + services_total;

        let mut prepayments_total = Money::ZERO;
        for link in &rec.guests {
            let prepayment = self
                .clients
                .get(&link.client_id)
                .map(|c| c.prepayment)
                .ok_or_else(|| EngineError::Storage("booking references missing client".into()))?;
            prepayments_total += prepayment;
        }

        let balance = prepayments_total - grand_total;

        Ok(BookingSummary {
            booking_id,
            nights,
            room_total,
            services_total,
            fee,
            grand_total,
            prepayments_total,
            balance,
            status: classify(balance),
        })
    }

    /// Reconcile every booking on file, in booking-id order. Feeds the
    /// payments report.
    pub async fn summarize_all(&self) -> Result<Vec<BookingSummary>, EngineError> {
        let mut ids: Vec<BookingId> = self.booking_rooms.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();

        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            match self.summarize_inner(id).await {
                Ok(s) => summaries.push(s),
                // Deleted between the id scan and the read — skip.
                Err(EngineError::BookingNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries() {
        assert_eq!(classify(Money::ZERO), PaymentStatus::Settled);
        assert_eq!(classify(dec!(1.00)), PaymentStatus::Settled);
        assert_eq!(classify(dec!(-1.00)), PaymentStatus::Settled);
        assert_eq!(classify(dec!(1.01)), PaymentStatus::Overpaid);
        assert_eq!(classify(dec!(-1.01)), PaymentStatus::Underpaid);
        assert_eq!(classify(dec!(250.00)), PaymentStatus::Overpaid);
        assert_eq!(classify(dec!(-50.00)), PaymentStatus::Underpaid);
    }
}
