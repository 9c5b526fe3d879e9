pub mod booking;
pub mod date;
pub mod events;
pub mod notification;
pub mod payment;
pub mod repository;

use uuid::Uuid;

pub use booking::{
    Booking, BookingLimit, BookingStatus, BookingTally, PaymentMethod, PaymentReferenceKind,
    RefundStatus, DEFAULT_LIMIT_SLUG,
};
pub use date::normalize_date;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
    #[error("Booking {0} is already cancelled")]
    AlreadyCancelled(Uuid),
}

pub type CoreResult<T> = Result<T, CoreError>;
