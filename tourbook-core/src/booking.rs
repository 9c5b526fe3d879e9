use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tourbook_shared::Masked;
use uuid::Uuid;

/// Tour identifier of the blanket per-day limit.
pub const DEFAULT_LIMIT_SLUG: &str = "default";

/// Booking status. Only `Confirmed` bookings consume capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

/// Payment processor the booking was paid through.
///
/// Unknown values are kept verbatim so the refund flow can report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
    #[serde(untagged)]
    Other(String),
}

impl PaymentMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" => None,
            "stripe" => Some(PaymentMethod::Stripe),
            "paypal" => Some(PaymentMethod::Paypal),
            _ => Some(PaymentMethod::Other(raw.trim().to_string())),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Stripe => write!(f, "stripe"),
            PaymentMethod::Paypal => write!(f, "paypal"),
            PaymentMethod::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// Which PayPal object the stored transaction id refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentReferenceKind {
    Order,
    Capture,
    Authorization,
}

impl fmt::Display for PaymentReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentReferenceKind::Order => write!(f, "order"),
            PaymentReferenceKind::Capture => write!(f, "capture"),
            PaymentReferenceKind::Authorization => write!(f, "authorization"),
        }
    }
}

impl FromStr for PaymentReferenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "order" => Ok(PaymentReferenceKind::Order),
            "capture" => Ok(PaymentReferenceKind::Capture),
            "authorization" => Ok(PaymentReferenceKind::Authorization),
            other => Err(format!("unknown payment reference kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefundStatus::Pending => write!(f, "pending"),
            RefundStatus::Completed => write!(f, "completed"),
            RefundStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RefundStatus::Pending),
            "completed" => Ok(RefundStatus::Completed),
            "failed" => Ok(RefundStatus::Failed),
            other => Err(format!("unknown refund status: {}", other)),
        }
    }
}

/// Canonical booking record. Storage adapters map every legacy layout into
/// this shape before business logic sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub tour_slug: String,
    pub date: NaiveDate,
    pub party_size: u32,
    pub status: BookingStatus,
    pub payment_method: Option<PaymentMethod>,
    pub transaction_id: Option<String>,
    pub payment_reference_kind: Option<PaymentReferenceKind>,
    pub amount_cents: i64,
    pub currency: Option<String>,
    pub customer_name: Option<String>,
    pub email: Option<Masked<String>>,
    pub language: Option<String>,
    pub cancellation_reason: Option<String>,
    pub refund_issued: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refund_status: Option<RefundStatus>,
    pub refund_id: Option<String>,
    pub refund_error: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_mock: bool,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(tour_slug: impl Into<String>, date: NaiveDate, party_size: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            tour_slug: tour_slug.into(),
            date,
            party_size,
            status: BookingStatus::Confirmed,
            payment_method: None,
            transaction_id: None,
            payment_reference_kind: None,
            amount_cents: 0,
            currency: None,
            customer_name: None,
            email: None,
            language: None,
            cancellation_reason: None,
            refund_issued: false,
            cancelled_at: None,
            refund_status: None,
            refund_id: None,
            refund_error: None,
            refunded_at: None,
            refund_mock: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_payment(
        mut self,
        method: PaymentMethod,
        transaction_id: Option<&str>,
        amount_cents: i64,
    ) -> Self {
        self.payment_method = Some(method);
        self.transaction_id = transaction_id.map(str::to_string);
        self.amount_cents = amount_cents;
        self
    }

    pub fn with_contact(mut self, email: &str, language: Option<&str>) -> Self {
        self.email = Some(Masked::new(email.to_string()));
        self.language = language.map(str::to_string);
        self
    }

    pub fn counts_toward_capacity(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }
}

/// Participant ceiling for a tour on a day, or for every tour on that day
/// when `tour_slug` is [`DEFAULT_LIMIT_SLUG`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookingLimit {
    pub tour_slug: String,
    pub date: NaiveDate,
    pub max_bookings: u32,
}

impl BookingLimit {
    pub fn new(tour_slug: impl Into<String>, date: NaiveDate, max_bookings: u32) -> Self {
        Self {
            tour_slug: tour_slug.into(),
            date,
            max_bookings,
        }
    }
}

/// Aggregate of confirmed bookings for one (tour, date).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingTally {
    pub bookings: u32,
    pub party_size: u32,
}
