use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tourbook_core::repository::{
    BookingLimitRepository, BookingRepository, CancelTransition, Cancellation, RefundUpdate,
};
use tourbook_core::{
    Booking, BookingLimit, BookingStatus, BookingTally, CoreError, CoreResult, RefundStatus,
};
use uuid::Uuid;

/// In-memory bookings and limits, for local runs without Postgres and for tests.
#[derive(Default)]
pub struct InMemoryStore {
    bookings: RwLock<HashMap<Uuid, Booking>>,
    limits: RwLock<HashMap<(String, NaiveDate), BookingLimit>>,
    offline: AtomicBool,
    read_only: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_booking(&self, booking: Booking) -> Uuid {
        let id = booking.id;
        self.bookings.write().await.insert(id, booking);
        id
    }

    pub async fn booking(&self, id: Uuid) -> Option<Booking> {
        self.bookings.read().await.get(&id).cloned()
    }

    /// Every call fails with `StorageUnavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Writes fail with `PersistenceFailure` while set; reads still work.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_online(&self) -> CoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::StorageUnavailable("store is offline".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self) -> CoreResult<()> {
        self.check_online()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(CoreError::PersistenceFailure("store is read-only".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn find_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        self.check_online()?;
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn tally_confirmed(&self, tour_slug: &str, date: NaiveDate) -> CoreResult<BookingTally> {
        self.check_online()?;
        let bookings = self.bookings.read().await;
        let tally = bookings
            .values()
            .filter(|b| b.date == date && b.tour_slug == tour_slug && b.counts_toward_capacity())
            .fold(BookingTally::default(), |acc, b| BookingTally {
                bookings: acc.bookings + 1,
                party_size: acc.party_size.saturating_add(b.party_size),
            });
        Ok(tally)
    }

    async fn mark_cancelled(
        &self,
        id: Uuid,
        cancellation: &Cancellation,
    ) -> CoreResult<CancelTransition> {
        self.check_writable()?;
        let mut bookings = self.bookings.write().await;
        let Some(booking) = bookings.get_mut(&id) else {
            return Ok(CancelTransition::NotFound);
        };

        if booking.status != BookingStatus::Confirmed {
            return Ok(CancelTransition::AlreadyCancelled);
        }

        booking.status = BookingStatus::Cancelled;
        booking.cancellation_reason = cancellation.reason.clone();
        booking.refund_issued = cancellation.refund_requested;
        booking.cancelled_at = Some(cancellation.cancelled_at);
        Ok(CancelTransition::Cancelled(booking.clone()))
    }

    async fn update_refund(&self, id: Uuid, update: &RefundUpdate) -> CoreResult<()> {
        self.check_writable()?;
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", id)))?;

        match update {
            RefundUpdate::Pending => {
                booking.refund_status = Some(RefundStatus::Pending);
                booking.refund_error = None;
            }
            RefundUpdate::Completed {
                refund_id,
                refunded_at,
                mock_response,
            } => {
                booking.refund_status = Some(RefundStatus::Completed);
                booking.refund_id = Some(refund_id.clone());
                booking.refunded_at = Some(*refunded_at);
                booking.refund_mock = *mock_response;
                booking.refund_error = None;
            }
            RefundUpdate::Failed { error } => {
                booking.refund_status = Some(RefundStatus::Failed);
                booking.refund_error = Some(error.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BookingLimitRepository for InMemoryStore {
    async fn find_limit(&self, tour_slug: &str, date: NaiveDate) -> CoreResult<Option<BookingLimit>> {
        self.check_online()?;
        Ok(self
            .limits
            .read()
            .await
            .get(&(tour_slug.to_string(), date))
            .cloned())
    }

    async fn upsert_limit(&self, limit: &BookingLimit) -> CoreResult<BookingLimit> {
        self.check_writable()?;
        self.limits
            .write()
            .await
            .insert((limit.tour_slug.clone(), limit.date), limit.clone());
        Ok(limit.clone())
    }

    async fn list_limits(&self, date: NaiveDate) -> CoreResult<Vec<BookingLimit>> {
        self.check_online()?;
        let mut limits: Vec<BookingLimit> = self
            .limits
            .read()
            .await
            .values()
            .filter(|l| l.date == date)
            .cloned()
            .collect();
        limits.sort_by(|a, b| a.tour_slug.cmp(&b.tour_slug));
        Ok(limits)
    }

    async fn delete_limit(&self, tour_slug: &str, date: NaiveDate) -> CoreResult<bool> {
        self.check_writable()?;
        Ok(self
            .limits
            .write()
            .await
            .remove(&(tour_slug.to_string(), date))
            .is_some())
    }
}
