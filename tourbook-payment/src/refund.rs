use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tourbook_core::payment::{RefundError, RefundProvider, RefundReceipt, RefundRequest};
use tourbook_core::PaymentReferenceKind;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::paypal::{Money, PaypalApi, PaypalError};

/// One refund endpoint shape to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundAttempt {
    CaptureRefund(String),
    AuthorizationVoid(String),
    OrderRefund(String),
}

impl RefundAttempt {
    /// `PayPal-Request-Id` for this endpoint and object. Stable across
    /// retries of the same booking, distinct between endpoints.
    pub fn request_id(&self, booking_id: Uuid) -> String {
        match self {
            RefundAttempt::CaptureRefund(id) => format!("refund-{}-capture-{}", booking_id, id),
            RefundAttempt::AuthorizationVoid(id) => format!("refund-{}-void-{}", booking_id, id),
            RefundAttempt::OrderRefund(id) => format!("refund-{}-order-{}", booking_id, id),
        }
    }
}

impl fmt::Display for RefundAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefundAttempt::CaptureRefund(id) => write!(f, "capture refund {}", id),
            RefundAttempt::AuthorizationVoid(id) => write!(f, "authorization void {}", id),
            RefundAttempt::OrderRefund(id) => write!(f, "order refund {}", id),
        }
    }
}

/// Refunds PayPal payments.
///
/// When the booking recorded which PayPal object its transaction id names,
/// only the matching endpoint is called. Older bookings do not know, so the
/// executor discovers a wrapped capture (if the id turns out to be an order)
/// and then walks capture refund, authorization void and order refund until
/// one is accepted.
pub struct PaypalRefundProvider {
    api: Arc<dyn PaypalApi>,
}

impl PaypalRefundProvider {
    pub fn new(api: Arc<dyn PaypalApi>) -> Self {
        Self { api }
    }

    async fn discover_capture(&self, token: &str, transaction_id: &str) -> Option<String> {
        match self.api.order_capture_id(token, transaction_id).await {
            Ok(capture) => capture,
            Err(e) => {
                debug!("Transaction {} is not a readable order: {}", transaction_id, e);
                None
            }
        }
    }

    /// Ordered endpoint shapes for this request.
    pub async fn plan(&self, token: &str, request: &RefundRequest) -> Vec<RefundAttempt> {
        let txn = request.transaction_id.trim().to_string();

        match request.reference_kind {
            Some(PaymentReferenceKind::Capture) => vec![RefundAttempt::CaptureRefund(txn)],
            Some(PaymentReferenceKind::Authorization) => vec![RefundAttempt::AuthorizationVoid(txn)],
            Some(PaymentReferenceKind::Order) => {
                let mut attempts = Vec::new();
                if let Some(capture) = self.discover_capture(token, &txn).await {
                    attempts.push(RefundAttempt::CaptureRefund(capture));
                }
                attempts.push(RefundAttempt::OrderRefund(txn));
                attempts
            }
            None => {
                let mut attempts = Vec::with_capacity(4);
                if let Some(capture) = self.discover_capture(token, &txn).await {
                    if capture != txn {
                        attempts.push(RefundAttempt::CaptureRefund(capture));
                    }
                }
                attempts.push(RefundAttempt::CaptureRefund(txn.clone()));
                attempts.push(RefundAttempt::AuthorizationVoid(txn.clone()));
                attempts.push(RefundAttempt::OrderRefund(txn));
                attempts
            }
        }
    }

    async fn execute(
        &self,
        token: &str,
        attempt: &RefundAttempt,
        amount: &Money,
        booking_id: Uuid,
    ) -> Result<String, PaypalError> {
        let request_id = attempt.request_id(booking_id);
        match attempt {
            RefundAttempt::CaptureRefund(id) => {
                self.api.refund_capture(token, id, amount, &request_id).await
            }
            RefundAttempt::AuthorizationVoid(id) => self.api.void_authorization(token, id).await,
            RefundAttempt::OrderRefund(id) => {
                self.api.refund_order(token, id, amount, &request_id).await
            }
        }
    }
}

/// Map PayPal's issue codes onto the failures operators can act on.
fn classify_issue(code: &str) -> Option<RefundError> {
    match code {
        "CAPTURE_FULLY_REFUNDED" | "ALREADY_REFUNDED" | "TRANSACTION_ALREADY_REFUNDED" => {
            Some(RefundError::AlreadyRefunded)
        }
        "REFUND_LIMIT_EXCEEDED" | "MAX_NUMBER_OF_REFUNDS_EXCEEDED" => {
            Some(RefundError::RefundLimitExceeded)
        }
        "REFUND_AMOUNT_EXCEEDED" | "REFUND_EXCEEDED_TRANSACTION_AMOUNT" => {
            Some(RefundError::AmountExceedsAvailable)
        }
        "REFUND_NOT_ALLOWED" | "TRANSACTION_REFUSED" | "CAPTURE_NOT_REFUNDABLE"
        | "REFUND_NOT_PERMITTED_DUE_TO_CHARGEBACK" => Some(RefundError::NotRefundable),
        _ => None,
    }
}

/// The first diagnosable failure wins; otherwise report the last one seen.
pub(crate) fn classify_failures(failures: &[PaypalError]) -> RefundError {
    if let Some(known) = failures
        .iter()
        .filter_map(|f| f.issue_code())
        .find_map(classify_issue)
    {
        return known;
    }

    match failures.last() {
        Some(last) => RefundError::Provider(last.to_string()),
        None => RefundError::Provider("no refund endpoint accepted the transaction".to_string()),
    }
}

#[async_trait]
impl RefundProvider for PaypalRefundProvider {
    fn name(&self) -> &'static str {
        "paypal"
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, RefundError> {
        request.validate()?;

        let token = self
            .api
            .access_token()
            .await
            .map_err(|e| RefundError::Authentication(e.to_string()))?;

        let amount = Money {
            value: request.amount_value(),
            currency_code: request.currency.clone(),
        };

        let mut failures = Vec::new();
        for attempt in self.plan(&token, request).await {
            match self.execute(&token, &attempt, &amount, request.booking_id).await {
                Ok(refund_id) => {
                    info!(
                        "PayPal {} succeeded for booking {}: {}",
                        attempt, request.booking_id, refund_id
                    );
                    return Ok(RefundReceipt {
                        refund_id,
                        mock_response: false,
                    });
                }
                Err(e) => {
                    warn!("PayPal {} failed for booking {}: {}", attempt, request.booking_id, e);
                    failures.push(e);
                }
            }
        }

        Err(classify_failures(&failures))
    }
}
