use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tourbook_core::repository::{BookingRepository, CancelTransition, Cancellation, RefundUpdate};
use tourbook_core::{
    Booking, BookingStatus, BookingTally, CoreError, CoreResult, PaymentMethod, RefundStatus,
};
use tourbook_shared::Masked;
use tracing::warn;
use uuid::Uuid;

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = "id, tour_slug, tour_id, date, party_size, participants, status, \
    payment_method, transaction_id, capture_id, paypal_order_id, payment_reference_kind, \
    amount_cents, currency, customer_name, email, language, cancellation_reason, refund_issued, \
    cancelled_at, refund_status, refund_id, refund_error, refunded_at, refund_mock, created_at";

/// Raw row, legacy columns included. Only [`BookingRow::into_booking`] reads it.
#[derive(sqlx::FromRow, Debug, Clone, Default)]
pub(crate) struct BookingRow {
    pub id: Uuid,
    pub tour_slug: Option<String>,
    pub tour_id: Option<String>,
    pub date: NaiveDate,
    pub party_size: Option<i32>,
    pub participants: Option<i32>,
    pub status: String,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub capture_id: Option<String>,
    pub paypal_order_id: Option<String>,
    pub payment_reference_kind: Option<String>,
    pub amount_cents: i64,
    pub currency: Option<String>,
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub language: Option<String>,
    pub cancellation_reason: Option<String>,
    pub refund_issued: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refund_status: Option<String>,
    pub refund_id: Option<String>,
    pub refund_error: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_mock: bool,
    pub created_at: DateTime<Utc>,
}

fn first_non_empty(candidates: &[&Option<String>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

impl BookingRow {
    /// Map any legacy field layout into the canonical booking.
    pub(crate) fn into_booking(self) -> CoreResult<Booking> {
        let tour_slug = first_non_empty(&[&self.tour_slug, &self.tour_id]).ok_or_else(|| {
            CoreError::StorageUnavailable(format!("booking {} has no tour identifier", self.id))
        })?;

        // Same precedence as the SQL aggregate in `tally_confirmed`.
        let party_size = self
            .party_size
            .or(self.participants)
            .unwrap_or(1)
            .max(0) as u32;

        let status = self.status.parse::<BookingStatus>().map_err(|e| {
            CoreError::StorageUnavailable(format!("booking {}: {}", self.id, e))
        })?;

        let refund_status = match self.refund_status.as_deref() {
            Some(raw) => match raw.parse::<RefundStatus>() {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!("Ignoring refund status on booking {}: {}", self.id, e);
                    None
                }
            },
            None => None,
        };

        let payment_reference_kind = self
            .payment_reference_kind
            .as_deref()
            .and_then(|raw| raw.parse().ok());

        Ok(Booking {
            id: self.id,
            transaction_id: first_non_empty(&[
                &self.transaction_id,
                &self.capture_id,
                &self.paypal_order_id,
            ]),
            tour_slug,
            date: self.date,
            party_size,
            status,
            payment_method: self.payment_method.as_deref().and_then(PaymentMethod::parse),
            payment_reference_kind,
            amount_cents: self.amount_cents,
            currency: self.currency,
            customer_name: self.customer_name,
            email: self.email.filter(|e| !e.trim().is_empty()).map(Masked::new),
            language: self.language,
            cancellation_reason: self.cancellation_reason,
            refund_issued: self.refund_issued,
            cancelled_at: self.cancelled_at,
            refund_status,
            refund_id: self.refund_id,
            refund_error: self.refund_error,
            refunded_at: self.refunded_at,
            refund_mock: self.refund_mock,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TallyRow {
    bookings: i64,
    party_size: i64,
}

fn read_error(e: sqlx::Error) -> CoreError {
    CoreError::StorageUnavailable(e.to_string())
}

fn write_error(e: sqlx::Error) -> CoreError {
    CoreError::PersistenceFailure(e.to_string())
}

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn find_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn tally_confirmed(&self, tour_slug: &str, date: NaiveDate) -> CoreResult<BookingTally> {
        let row = sqlx::query_as::<_, TallyRow>(
            r#"
            SELECT COUNT(*)::BIGINT AS bookings,
                   COALESCE(SUM(GREATEST(COALESCE(party_size, participants, 1), 0)), 0)::BIGINT AS party_size
            FROM bookings
            WHERE date = $1
              AND lower(trim(status)) = 'confirmed'
              AND (tour_slug = $2 OR tour_id = $2)
            "#,
        )
        .bind(date)
        .bind(tour_slug)
        .fetch_one(&self.pool)
        .await
        .map_err(read_error)?;

        Ok(BookingTally {
            bookings: u32::try_from(row.bookings).unwrap_or(u32::MAX),
            party_size: u32::try_from(row.party_size).unwrap_or(u32::MAX),
        })
    }

    async fn mark_cancelled(
        &self,
        id: Uuid,
        cancellation: &Cancellation,
    ) -> CoreResult<CancelTransition> {
        let sql = format!(
            r#"
            UPDATE bookings
            SET status = 'cancelled',
                cancellation_reason = $2,
                refund_issued = $3,
                cancelled_at = $4,
                updated_at = NOW()
            WHERE id = $1 AND lower(trim(status)) = 'confirmed'
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let updated = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .bind(cancellation.reason.as_deref())
            .bind(cancellation.refund_requested)
            .bind(cancellation.cancelled_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error)?;

        if let Some(row) = updated {
            return Ok(CancelTransition::Cancelled(row.into_booking()?));
        }

        let exists: Option<(String,)> = sqlx::query_as("SELECT status FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error)?;

        Ok(match exists {
            Some(_) => CancelTransition::AlreadyCancelled,
            None => CancelTransition::NotFound,
        })
    }

    async fn update_refund(&self, id: Uuid, update: &RefundUpdate) -> CoreResult<()> {
        let query = match update {
            RefundUpdate::Pending => sqlx::query(
                "UPDATE bookings SET refund_status = 'pending', refund_error = NULL, updated_at = NOW() WHERE id = $1",
            )
            .bind(id),
            RefundUpdate::Completed {
                refund_id,
                refunded_at,
                mock_response,
            } => sqlx::query(
                r#"
                UPDATE bookings
                SET refund_status = 'completed', refund_id = $2, refunded_at = $3,
                    refund_mock = $4, refund_error = NULL, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(refund_id.as_str())
            .bind(*refunded_at)
            .bind(*mock_response),
            RefundUpdate::Failed { error } => sqlx::query(
                "UPDATE bookings SET refund_status = 'failed', refund_error = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(error.as_str()),
        };

        let result = query.execute(&self.pool).await.map_err(write_error)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("booking {}", id)));
        }
        Ok(())
    }
}
