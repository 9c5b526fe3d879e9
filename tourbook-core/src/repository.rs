use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::booking::{Booking, BookingLimit, BookingTally};
use crate::CoreResult;

/// Fields written when a booking is cancelled.
#[derive(Debug, Clone)]
pub struct Cancellation {
    pub reason: Option<String>,
    pub refund_requested: bool,
    pub cancelled_at: DateTime<Utc>,
}

/// Result of the `confirmed -> cancelled` transition.
#[derive(Debug, Clone)]
pub enum CancelTransition {
    Cancelled(Booking),
    AlreadyCancelled,
    NotFound,
}

/// Refund bookkeeping merged into a booking.
#[derive(Debug, Clone, PartialEq)]
pub enum RefundUpdate {
    Pending,
    Completed {
        refund_id: String,
        refunded_at: DateTime<Utc>,
        mock_response: bool,
    },
    Failed {
        error: String,
    },
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    /// Count and sum the party size of confirmed bookings for a tour/day.
    async fn tally_confirmed(&self, tour_slug: &str, date: NaiveDate) -> CoreResult<BookingTally>;

    /// Atomically move a confirmed booking to cancelled. Bookings that are
    /// already cancelled are left untouched.
    async fn mark_cancelled(
        &self,
        id: Uuid,
        cancellation: &Cancellation,
    ) -> CoreResult<CancelTransition>;

    async fn update_refund(&self, id: Uuid, update: &RefundUpdate) -> CoreResult<()>;
}

/// Repository trait for capacity limits
#[async_trait]
pub trait BookingLimitRepository: Send + Sync {
    async fn find_limit(&self, tour_slug: &str, date: NaiveDate) -> CoreResult<Option<BookingLimit>>;

    async fn upsert_limit(&self, limit: &BookingLimit) -> CoreResult<BookingLimit>;

    async fn list_limits(&self, date: NaiveDate) -> CoreResult<Vec<BookingLimit>>;

    /// Returns `false` when there was nothing to delete.
    async fn delete_limit(&self, tour_slug: &str, date: NaiveDate) -> CoreResult<bool>;
}
