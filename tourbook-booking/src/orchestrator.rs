use std::sync::Arc;
use tourbook_core::payment::{RefundError, RefundProvider, RefundRequest, RefundResult};
use tourbook_core::{Booking, PaymentMethod};
use tracing::{info, warn};

/// Routes a booking's refund to the processor that took the payment.
pub struct RefundOrchestrator {
    paypal: Arc<dyn RefundProvider>,
    default_currency: String,
}

impl RefundOrchestrator {
    pub fn new(paypal: Arc<dyn RefundProvider>, default_currency: &str) -> Self {
        Self {
            paypal,
            default_currency: default_currency.to_string(),
        }
    }

    pub fn default_currency(&self) -> &str {
        &self.default_currency
    }

    /// Build the provider request, or the precondition that blocks it.
    pub fn prepare(&self, booking: &Booking) -> Result<RefundRequest, RefundError> {
        match &booking.payment_method {
            None => Err(RefundError::MissingPaymentMethod),
            Some(PaymentMethod::Stripe) => Err(RefundError::StripeNotImplemented),
            Some(PaymentMethod::Other(method)) => {
                Err(RefundError::PaymentMethodUnsupported(method.clone()))
            }
            Some(PaymentMethod::Paypal) => {
                let transaction_id = booking
                    .transaction_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or(RefundError::MissingTransactionId)?;

                let request = RefundRequest {
                    booking_id: booking.id,
                    transaction_id: transaction_id.to_string(),
                    amount_cents: booking.amount_cents,
                    currency: booking
                        .currency
                        .clone()
                        .unwrap_or_else(|| self.default_currency.clone()),
                    reference_kind: booking.payment_reference_kind,
                };
                request.validate()?;
                Ok(request)
            }
        }
    }

    pub async fn refund_booking(&self, booking: &Booking) -> RefundResult {
        let request = match self.prepare(booking) {
            Ok(request) => request,
            Err(e) => {
                warn!("Refund for booking {} not attempted: {}", booking.id, e);
                return RefundResult::failed(&e);
            }
        };

        info!(
            "Requesting {} refund of {} {} for booking {}",
            self.paypal.name(),
            request.amount_value(),
            request.currency,
            booking.id
        );
        self.paypal.refund(&request).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tourbook_core::payment::RefundReceipt;
    use tourbook_core::PaymentReferenceKind;

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RefundProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "paypal"
        }

        async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, RefundError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RefundReceipt {
                refund_id: format!("RF-{}", request.transaction_id),
                mock_response: false,
            })
        }
    }

    fn booking() -> Booking {
        Booking::new("cave-tour", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), 2)
    }

    fn orchestrator() -> (Arc<CountingProvider>, RefundOrchestrator) {
        let provider = Arc::new(CountingProvider::default());
        (provider.clone(), RefundOrchestrator::new(provider, "EUR"))
    }

    #[tokio::test]
    async fn test_paypal_booking_is_refunded() {
        let (provider, orchestrator) = orchestrator();
        let booking = booking().with_payment(PaymentMethod::Paypal, Some("CAP-1"), 5000);

        let result = orchestrator.refund_booking(&booking).await;
        assert!(result.success);
        assert_eq!(result.refund_id.as_deref(), Some("RF-CAP-1"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_preconditions_make_no_provider_call() {
        let (provider, orchestrator) = orchestrator();

        let cases = vec![
            (booking(), "No payment method recorded for this booking"),
            (
                booking().with_payment(PaymentMethod::Stripe, Some("pi_1"), 5000),
                "Stripe refunds not yet implemented",
            ),
            (
                booking().with_payment(PaymentMethod::Other("voucher".into()), None, 5000),
                "Unsupported payment method: voucher",
            ),
            (
                booking().with_payment(PaymentMethod::Paypal, Some("  "), 5000),
                "No PayPal transaction ID found for this booking",
            ),
        ];

        for (booking, expected) in cases {
            let result = orchestrator.refund_booking(&booking).await;
            assert!(!result.success);
            assert_eq!(result.error.as_deref(), Some(expected));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_prepare_carries_payment_shape_and_currency() {
        let (_, orchestrator) = orchestrator();
        let mut booking = booking().with_payment(PaymentMethod::Paypal, Some("ORDER-7"), 1250);
        booking.payment_reference_kind = Some(PaymentReferenceKind::Order);

        let request = orchestrator.prepare(&booking).unwrap();
        assert_eq!(request.currency, "EUR");
        assert_eq!(request.reference_kind, Some(PaymentReferenceKind::Order));

        booking.amount_cents = 0;
        assert_eq!(orchestrator.prepare(&booking), Err(RefundError::InvalidAmount(0)));
    }
}
