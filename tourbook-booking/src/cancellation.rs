use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tourbook_core::events::EventPublisher;
use tourbook_core::notification::Mailer;
use tourbook_core::payment::RefundResult;
use tourbook_core::repository::{BookingRepository, CancelTransition, Cancellation, RefundUpdate};
use tourbook_core::{Booking, CoreError};
use tourbook_shared::models::events::{
    BookingCancelledEvent, BookingRefundedEvent, BOOKING_CANCELLED_TOPIC, BOOKING_REFUNDED_TOPIC,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::notification::render_cancellation_email;
use crate::orchestrator::RefundOrchestrator;

/// How a cancellation request ended, for callers that map it onto a
/// transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancellationStatus {
    #[default]
    Cancelled,
    NotFound,
    AlreadyCancelled,
    Failed,
}

/// `success` means the cancellation itself was recorded; a failed refund
/// still reports `success: true` with `refund_result.success == false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_result: Option<RefundResult>,
    #[serde(skip)]
    pub status: CancellationStatus,
}

impl CancellationOutcome {
    fn rejected(status: CancellationStatus, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            refund_result: None,
            status,
        }
    }
}

pub struct CancellationCoordinator {
    bookings: Arc<dyn BookingRepository>,
    orchestrator: RefundOrchestrator,
    mailer: Arc<dyn Mailer>,
    publisher: Arc<dyn EventPublisher>,
    default_language: String,
}

impl CancellationCoordinator {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        orchestrator: RefundOrchestrator,
        mailer: Arc<dyn Mailer>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            bookings,
            orchestrator,
            mailer,
            publisher,
            default_language: "en".to_string(),
        }
    }

    pub fn with_default_language(mut self, language: &str) -> Self {
        self.default_language = language.to_string();
        self
    }

    /// Cancel a confirmed booking, optionally refund it, and notify the
    /// customer. Never returns an error: every failure becomes an outcome.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        should_refund: bool,
        reason: Option<String>,
    ) -> CancellationOutcome {
        match self.bookings.find_booking(booking_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return CancellationOutcome::rejected(CancellationStatus::NotFound, "Booking not found")
            }
            Err(e) => {
                error!("Failed to load booking {}: {}", booking_id, e);
                return CancellationOutcome::rejected(
                    CancellationStatus::Failed,
                    format!("Failed to cancel booking: {}", e),
                );
            }
        }

        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let cancellation = Cancellation {
            reason: reason.clone(),
            refund_requested: should_refund,
            cancelled_at: Utc::now(),
        };

        let booking = match self.bookings.mark_cancelled(booking_id, &cancellation).await {
            Ok(CancelTransition::Cancelled(booking)) => booking,
            Ok(CancelTransition::NotFound) => {
                return CancellationOutcome::rejected(CancellationStatus::NotFound, "Booking not found")
            }
            Ok(CancelTransition::AlreadyCancelled) => {
                warn!("Booking {} is already cancelled, nothing to do", booking_id);
                return CancellationOutcome::rejected(
                    CancellationStatus::AlreadyCancelled,
                    CoreError::AlreadyCancelled(booking_id).to_string(),
                );
            }
            Err(e) => {
                error!("Failed to mark booking {} cancelled: {}", booking_id, e);
                return CancellationOutcome::rejected(
                    CancellationStatus::Failed,
                    format!("Failed to cancel booking: {}", e),
                );
            }
        };
        info!("Booking {} cancelled (refund requested: {})", booking_id, should_refund);
        self.publish_cancelled(&booking, &cancellation).await;

        let refund_result = if should_refund {
            match self.refund(&booking).await {
                Ok(result) => Some(result),
                Err(outcome) => return outcome,
            }
        } else {
            None
        };

        self.notify(&booking, refund_result.as_ref()).await;

        let message = match &refund_result {
            None => "Booking cancelled successfully".to_string(),
            Some(r) if r.success => "Booking cancelled and refund processed successfully".to_string(),
            Some(r) => format!(
                "Booking cancelled but refund failed: {}",
                r.error.as_deref().unwrap_or("unknown error")
            ),
        };

        CancellationOutcome {
            success: true,
            message,
            refund_result,
            status: CancellationStatus::Cancelled,
        }
    }

    /// Run the refund and record each step. `Err` carries the outcome to
    /// return when the bookkeeping itself could not be written.
    async fn refund(&self, booking: &Booking) -> Result<RefundResult, CancellationOutcome> {
        if let Err(e) = self.bookings.update_refund(booking.id, &RefundUpdate::Pending).await {
            error!("Failed to mark refund pending for booking {}: {}", booking.id, e);
            return Err(CancellationOutcome::rejected(
                CancellationStatus::Failed,
                format!("Booking cancelled but refund could not be started: {}", e),
            ));
        }

        let result = self.orchestrator.refund_booking(booking).await;
        let update = match (&result.refund_id, result.success) {
            (Some(refund_id), true) => RefundUpdate::Completed {
                refund_id: refund_id.clone(),
                refunded_at: Utc::now(),
                mock_response: result.mock_response,
            },
            _ => RefundUpdate::Failed {
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "refund failed".to_string()),
            },
        };

        if let Err(e) = self.bookings.update_refund(booking.id, &update).await {
            error!("Failed to record refund outcome for booking {}: {}", booking.id, e);
            return Err(CancellationOutcome {
                success: false,
                message: format!("Booking cancelled but refund outcome could not be saved: {}", e),
                refund_result: Some(result),
                status: CancellationStatus::Failed,
            });
        }

        if let RefundUpdate::Completed { refund_id, .. } = &update {
            info!("Refund {} recorded for booking {}", refund_id, booking.id);
            self.publish_refunded(booking, refund_id, result.mock_response).await;
        } else {
            warn!(
                "Refund failed for booking {}: {}",
                booking.id,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(result)
    }

    async fn notify(&self, cancelled: &Booking, refund: Option<&RefundResult>) {
        let booking = match self.bookings.find_booking(cancelled.id).await {
            Ok(Some(reloaded)) => reloaded,
            Ok(None) => cancelled.clone(),
            Err(e) => {
                warn!("Could not reload booking {} for notification: {}", cancelled.id, e);
                cancelled.clone()
            }
        };

        let Some(message) = render_cancellation_email(
            &booking,
            refund,
            &self.default_language,
            self.orchestrator.default_currency(),
        ) else {
            warn!("Booking {} has no email address, skipping notification", booking.id);
            return;
        };

        match self.mailer.send(&message).await {
            Ok(()) => info!("Cancellation email sent for booking {}", booking.id),
            Err(e) => warn!("Cancellation email for booking {} failed: {}", booking.id, e),
        }
    }

    async fn publish_cancelled(&self, booking: &Booking, cancellation: &Cancellation) {
        let event = BookingCancelledEvent {
            booking_id: booking.id,
            tour_slug: booking.tour_slug.clone(),
            date: booking.date,
            party_size: booking.party_size,
            refund_requested: cancellation.refund_requested,
            reason: cancellation.reason.clone(),
            timestamp: cancellation.cancelled_at.timestamp(),
        };
        self.publish(BOOKING_CANCELLED_TOPIC, booking.id, &event).await;
    }

    async fn publish_refunded(&self, booking: &Booking, refund_id: &str, mock_response: bool) {
        let event = BookingRefundedEvent {
            booking_id: booking.id,
            refund_id: refund_id.to_string(),
            amount_cents: booking.amount_cents,
            currency: booking
                .currency
                .clone()
                .unwrap_or_else(|| self.orchestrator.default_currency().to_string()),
            mock_response,
            timestamp: Utc::now().timestamp(),
        };
        self.publish(BOOKING_REFUNDED_TOPIC, booking.id, &event).await;
    }

    async fn publish<T: Serialize>(&self, topic: &str, booking_id: Uuid, event: &T) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize {} event: {}", topic, e);
                return;
            }
        };
        if let Err(e) = self
            .publisher
            .publish(topic, &booking_id.to_string(), &payload)
            .await
        {
            warn!("Failed to publish {} event for booking {}: {}", topic, booking_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use tourbook_core::notification::{EmailMessage, NotificationError};
    use tourbook_core::payment::{RefundError, RefundProvider, RefundReceipt, RefundRequest};
    use tourbook_core::{BookingStatus, PaymentMethod, RefundStatus};
    use tourbook_store::InMemoryStore;

    struct ScriptedProvider {
        outcome: Result<RefundReceipt, RefundError>,
        calls: Mutex<Vec<RefundRequest>>,
    }

    impl ScriptedProvider {
        fn ok(refund_id: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(RefundReceipt {
                    refund_id: refund_id.to_string(),
                    mock_response: false,
                }),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: RefundError) -> Arc<Self> {
            Arc::new(Self {
                outcome: Err(error),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RefundProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "paypal"
        }

        async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, RefundError> {
            self.calls.lock().unwrap().push(request.clone());
            self.outcome.clone()
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
            self.sent.lock().unwrap().push(message.clone());
            if self.fail {
                return Err(NotificationError::Transport("relay down".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        topics: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, topic: &str, _key: &str, _payload: &str) -> Result<(), String> {
            self.topics.lock().unwrap().push(topic.to_string());
            if self.fail {
                return Err("broker unreachable".to_string());
            }
            Ok(())
        }
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        provider: Arc<ScriptedProvider>,
        mailer: Arc<RecordingMailer>,
        publisher: Arc<RecordingPublisher>,
        coordinator: CancellationCoordinator,
    }

    fn harness(provider: Arc<ScriptedProvider>, mailer: RecordingMailer) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(mailer);
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator = CancellationCoordinator::new(
            store.clone(),
            RefundOrchestrator::new(provider.clone(), "EUR"),
            mailer.clone(),
            publisher.clone(),
        );
        Harness {
            store,
            provider,
            mailer,
            publisher,
            coordinator,
        }
    }

    fn booking(method: PaymentMethod, transaction_id: Option<&str>) -> Booking {
        Booking::new("cave-tour", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), 3)
            .with_payment(method, transaction_id, 5000)
            .with_contact("guest@example.com", Some("en"))
    }

    #[tokio::test]
    async fn test_paypal_refund_completes() {
        let h = harness(ScriptedProvider::ok("RF-1"), RecordingMailer::default());
        let id = h
            .store
            .insert_booking(booking(PaymentMethod::Paypal, Some("CAP-1")))
            .await;

        let outcome = h
            .coordinator
            .cancel_booking(id, true, Some("Flooding".to_string()))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.status, CancellationStatus::Cancelled);
        assert_eq!(outcome.message, "Booking cancelled and refund processed successfully");
        assert_eq!(outcome.refund_result.as_ref().unwrap().refund_id.as_deref(), Some("RF-1"));

        let stored = h.store.booking(id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert!(stored.refund_issued);
        assert_eq!(stored.refund_status, Some(RefundStatus::Completed));
        assert_eq!(stored.refund_id.as_deref(), Some("RF-1"));
        assert!(stored.refunded_at.is_some());
        assert_eq!(stored.cancellation_reason.as_deref(), Some("Flooding"));

        let sent = h.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("50.00 EUR"));
        assert_eq!(
            *h.publisher.topics.lock().unwrap(),
            vec![BOOKING_CANCELLED_TOPIC.to_string(), BOOKING_REFUNDED_TOPIC.to_string()]
        );
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_cancellation() {
        let store = Arc::new(InMemoryStore::new());
        let publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..Default::default()
        });
        let coordinator = CancellationCoordinator::new(
            store.clone(),
            RefundOrchestrator::new(ScriptedProvider::ok("RF-1"), "EUR"),
            Arc::new(RecordingMailer::default()),
            publisher.clone(),
        );
        let id = store
            .insert_booking(booking(PaymentMethod::Paypal, Some("CAP-1")))
            .await;

        let outcome = coordinator.cancel_booking(id, true, None).await;

        assert!(outcome.success);
        assert_eq!(outcome.message, "Booking cancelled and refund processed successfully");
        assert_eq!(publisher.topics.lock().unwrap().len(), 2);
        let stored = store.booking(id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(stored.refund_status, Some(RefundStatus::Completed));
    }

    #[tokio::test]
    async fn test_stripe_refund_is_reported_not_implemented() {
        let h = harness(ScriptedProvider::ok("RF-1"), RecordingMailer::default());
        let id = h.store.insert_booking(booking(PaymentMethod::Stripe, Some("pi_1"))).await;

        let outcome = h.coordinator.cancel_booking(id, true, None).await;

        assert!(outcome.success);
        assert_eq!(
            outcome.refund_result,
            Some(RefundResult {
                success: false,
                refund_id: None,
                error: Some("Stripe refunds not yet implemented".to_string()),
                mock_response: false,
            })
        );
        assert_eq!(
            outcome.message,
            "Booking cancelled but refund failed: Stripe refunds not yet implemented"
        );
        assert_eq!(h.provider.call_count(), 0);

        let stored = h.store.booking(id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(stored.refund_status, Some(RefundStatus::Failed));
        assert_eq!(stored.refund_error.as_deref(), Some("Stripe refunds not yet implemented"));
        assert_eq!(h.mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_without_refund() {
        let h = harness(ScriptedProvider::ok("RF-1"), RecordingMailer::default());
        let id = h
            .store
            .insert_booking(booking(PaymentMethod::Paypal, Some("CAP-1")))
            .await;

        let outcome = h.coordinator.cancel_booking(id, false, None).await;

        assert!(outcome.success);
        assert_eq!(outcome.message, "Booking cancelled successfully");
        assert!(outcome.refund_result.is_none());
        assert_eq!(h.provider.call_count(), 0);

        let stored = h.store.booking(id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert!(!stored.refund_issued);
        assert_eq!(stored.refund_status, None);
        assert_eq!(h.mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_cancellation() {
        let h = harness(
            ScriptedProvider::failing(RefundError::AlreadyRefunded),
            RecordingMailer::default(),
        );
        let id = h
            .store
            .insert_booking(booking(PaymentMethod::Paypal, Some("CAP-1")))
            .await;

        let outcome = h.coordinator.cancel_booking(id, true, None).await;

        assert!(outcome.success);
        let refund = outcome.refund_result.unwrap();
        assert!(!refund.success);
        assert_eq!(refund.error.as_deref(), Some("This payment has already been refunded"));
        assert_eq!(h.store.booking(id).await.unwrap().refund_status, Some(RefundStatus::Failed));
        assert_eq!(*h.publisher.topics.lock().unwrap(), vec![BOOKING_CANCELLED_TOPIC.to_string()]);
    }

    #[tokio::test]
    async fn test_second_cancellation_is_rejected_without_refund() {
        let h = harness(ScriptedProvider::ok("RF-1"), RecordingMailer::default());
        let id = h
            .store
            .insert_booking(booking(PaymentMethod::Paypal, Some("CAP-1")))
            .await;

        assert!(h.coordinator.cancel_booking(id, true, None).await.success);
        let second = h.coordinator.cancel_booking(id, true, None).await;

        assert!(!second.success);
        assert_eq!(second.status, CancellationStatus::AlreadyCancelled);
        assert!(second.refund_result.is_none());
        assert_eq!(h.provider.call_count(), 1);
        assert_eq!(h.mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_booking() {
        let h = harness(ScriptedProvider::ok("RF-1"), RecordingMailer::default());

        let outcome = h.coordinator.cancel_booking(Uuid::new_v4(), true, None).await;

        assert!(!outcome.success);
        assert_eq!(outcome.status, CancellationStatus::NotFound);
        assert_eq!(outcome.message, "Booking not found");
        assert!(h.mailer.sent.lock().unwrap().is_empty());
        assert!(h.publisher.topics.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_email_failure_is_not_fatal() {
        let h = harness(
            ScriptedProvider::ok("RF-1"),
            RecordingMailer {
                fail: true,
                ..Default::default()
            },
        );
        let id = h
            .store
            .insert_booking(booking(PaymentMethod::Paypal, Some("CAP-1")))
            .await;

        let outcome = h.coordinator.cancel_booking(id, false, None).await;

        assert!(outcome.success);
        assert_eq!(h.mailer.sent.lock().unwrap().len(), 1);
        assert_eq!(h.store.booking(id).await.unwrap().status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_storage_failures_become_outcomes() {
        let h = harness(ScriptedProvider::ok("RF-1"), RecordingMailer::default());
        let id = h
            .store
            .insert_booking(booking(PaymentMethod::Paypal, Some("CAP-1")))
            .await;

        h.store.set_read_only(true);
        let outcome = h.coordinator.cancel_booking(id, true, None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.status, CancellationStatus::Failed);
        assert_eq!(h.store.booking(id).await.unwrap().status, BookingStatus::Confirmed);
        assert_eq!(h.provider.call_count(), 0);

        h.store.set_read_only(false);
        h.store.set_offline(true);
        let outcome = h.coordinator.cancel_booking(id, true, None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.status, CancellationStatus::Failed);
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = CancellationOutcome {
            success: true,
            message: "Booking cancelled successfully".to_string(),
            refund_result: None,
            status: CancellationStatus::Cancelled,
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({ "success": true, "message": "Booking cancelled successfully" })
        );
    }
}
