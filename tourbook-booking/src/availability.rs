use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tourbook_core::repository::{BookingLimitRepository, BookingRepository};
use tourbook_core::{normalize_date, CoreError, CoreResult, DEFAULT_LIMIT_SLUG};
use tracing::{debug, error};

/// Participant ceiling used when neither a tour nor a default limit exists.
pub const FALLBACK_CAPACITY: u32 = 10;

/// Remaining capacity for one tour on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub date: NaiveDate,
    pub tour_slug: String,
    pub max_bookings: u32,
    pub total_bookings: u32,
    pub total_party_size: u32,
    pub available_places: u32,
    pub is_available: bool,
}

impl Availability {
    fn compute(date: NaiveDate, tour_slug: &str, ceiling: u32, bookings: u32, party_size: u32) -> Self {
        let available_places = ceiling.saturating_sub(party_size);
        Self {
            date,
            tour_slug: tour_slug.to_string(),
            max_bookings: ceiling,
            total_bookings: bookings,
            total_party_size: party_size,
            available_places,
            is_available: available_places > 0,
        }
    }
}

/// Answers "how many more participants fit on tour T on day D".
pub struct AvailabilityService {
    bookings: Arc<dyn BookingRepository>,
    limits: Arc<dyn BookingLimitRepository>,
    fallback_capacity: u32,
}

impl AvailabilityService {
    pub fn new(bookings: Arc<dyn BookingRepository>, limits: Arc<dyn BookingLimitRepository>) -> Self {
        Self {
            bookings,
            limits,
            fallback_capacity: FALLBACK_CAPACITY,
        }
    }

    pub fn with_fallback_capacity(mut self, capacity: u32) -> Self {
        self.fallback_capacity = capacity;
        self
    }

    /// Tour-specific limit, then the day's default limit, then the fallback.
    pub async fn ceiling(&self, tour_slug: &str, date: NaiveDate) -> CoreResult<u32> {
        if let Some(limit) = self.limits.find_limit(tour_slug, date).await? {
            return Ok(limit.max_bookings);
        }
        if tour_slug != DEFAULT_LIMIT_SLUG {
            if let Some(limit) = self.limits.find_limit(DEFAULT_LIMIT_SLUG, date).await? {
                return Ok(limit.max_bookings);
            }
        }
        Ok(self.fallback_capacity)
    }

    pub async fn get_availability(&self, date: &str, tour_slug: &str) -> CoreResult<Availability> {
        let tour_slug = tour_slug.trim();
        if date.trim().is_empty() {
            return Err(CoreError::InvalidArgument("date is required".to_string()));
        }
        if tour_slug.is_empty() {
            return Err(CoreError::InvalidArgument("tourSlug is required".to_string()));
        }
        let day = normalize_date(date)?;

        let tally = self
            .bookings
            .tally_confirmed(tour_slug, day)
            .await
            .inspect_err(|e| error!("Failed to tally bookings for {} on {}: {}", tour_slug, day, e))?;
        let ceiling = self
            .ceiling(tour_slug, day)
            .await
            .inspect_err(|e| error!("Failed to read booking limit for {} on {}: {}", tour_slug, day, e))?;

        let availability = Availability::compute(day, tour_slug, ceiling, tally.bookings, tally.party_size);
        debug!(
            "Availability for {} on {}: {}/{} taken, {} left",
            tour_slug, day, tally.party_size, ceiling, availability.available_places
        );
        Ok(availability)
    }
}
