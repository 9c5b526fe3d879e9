pub mod availability;
pub mod cancellation;
pub mod notification;
pub mod orchestrator;

pub use availability::{Availability, AvailabilityService, FALLBACK_CAPACITY};
pub use cancellation::{CancellationCoordinator, CancellationOutcome, CancellationStatus};
pub use notification::render_cancellation_email;
pub use orchestrator::RefundOrchestrator;
