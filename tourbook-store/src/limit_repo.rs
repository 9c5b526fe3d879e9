use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tourbook_core::repository::BookingLimitRepository;
use tourbook_core::{BookingLimit, CoreError, CoreResult};

pub struct StoreBookingLimitRepository {
    pool: PgPool,
}

impl StoreBookingLimitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LimitRow {
    tour_slug: String,
    date: NaiveDate,
    max_bookings: i32,
}

impl From<LimitRow> for BookingLimit {
    fn from(row: LimitRow) -> Self {
        BookingLimit::new(row.tour_slug, row.date, row.max_bookings.max(0) as u32)
    }
}

#[async_trait]
impl BookingLimitRepository for StoreBookingLimitRepository {
    async fn find_limit(&self, tour_slug: &str, date: NaiveDate) -> CoreResult<Option<BookingLimit>> {
        let row = sqlx::query_as::<_, LimitRow>(
            "SELECT tour_slug, date, max_bookings FROM booking_limits WHERE tour_slug = $1 AND date = $2",
        )
        .bind(tour_slug)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::StorageUnavailable(e.to_string()))?;

        Ok(row.map(BookingLimit::from))
    }

    async fn upsert_limit(&self, limit: &BookingLimit) -> CoreResult<BookingLimit> {
        let max_bookings = i32::try_from(limit.max_bookings).map_err(|_| {
            CoreError::InvalidArgument(format!("maxBookings {} is too large", limit.max_bookings))
        })?;

        let row = sqlx::query_as::<_, LimitRow>(
            r#"
            INSERT INTO booking_limits (tour_slug, date, max_bookings)
            VALUES ($1, $2, $3)
            ON CONFLICT (tour_slug, date)
            DO UPDATE SET max_bookings = EXCLUDED.max_bookings, updated_at = NOW()
            RETURNING tour_slug, date, max_bookings
            "#,
        )
        .bind(&limit.tour_slug)
        .bind(limit.date)
        .bind(max_bookings)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::PersistenceFailure(e.to_string()))?;

        Ok(row.into())
    }

    async fn list_limits(&self, date: NaiveDate) -> CoreResult<Vec<BookingLimit>> {
        let rows = sqlx::query_as::<_, LimitRow>(
            "SELECT tour_slug, date, max_bookings FROM booking_limits WHERE date = $1 ORDER BY tour_slug",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::StorageUnavailable(e.to_string()))?;

        Ok(rows.into_iter().map(BookingLimit::from).collect())
    }

    async fn delete_limit(&self, tour_slug: &str, date: NaiveDate) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM booking_limits WHERE tour_slug = $1 AND date = $2")
            .bind(tour_slug)
            .bind(date)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::PersistenceFailure(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
