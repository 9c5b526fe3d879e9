use std::sync::Arc;
use tourbook_booking::{AvailabilityService, CancellationCoordinator};
use tourbook_core::repository::BookingLimitRepository;
use tourbook_store::RedisClient;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub availability: Arc<AvailabilityService>,
    pub cancellations: Arc<CancellationCoordinator>,
    pub limits: Arc<dyn BookingLimitRepository>,
    /// Rate limiting is skipped when absent.
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
}
