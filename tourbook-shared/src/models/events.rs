use chrono::NaiveDate;
use uuid::Uuid;

pub const BOOKING_CANCELLED_TOPIC: &str = "booking.cancelled";
pub const BOOKING_REFUNDED_TOPIC: &str = "booking.refunded";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub tour_slug: String,
    pub date: NaiveDate,
    pub party_size: u32,
    pub refund_requested: bool,
    pub reason: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingRefundedEvent {
    pub booking_id: Uuid,
    pub refund_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub mock_response: bool,
    pub timestamp: i64,
}
