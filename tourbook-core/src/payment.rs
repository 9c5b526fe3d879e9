use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::PaymentReferenceKind;

/// Everything a provider needs to reverse one payment.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundRequest {
    pub booking_id: Uuid,
    pub transaction_id: String,
    pub amount_cents: i64,
    pub currency: String,
    /// `None` for bookings created before the payment shape was recorded.
    pub reference_kind: Option<PaymentReferenceKind>,
}

impl RefundRequest {
    /// Input checks that must pass before any network call is made.
    pub fn validate(&self) -> Result<(), RefundError> {
        if self.transaction_id.trim().is_empty() {
            return Err(RefundError::MissingTransactionId);
        }
        if self.amount_cents <= 0 {
            return Err(RefundError::InvalidAmount(self.amount_cents));
        }
        Ok(())
    }

    /// Amount in the decimal string form payment APIs expect, e.g. `50.00`.
    pub fn amount_value(&self) -> String {
        format_amount(self.amount_cents)
    }
}

pub fn format_amount(amount_cents: i64) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// A refund the provider accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundReceipt {
    pub refund_id: String,
    pub mock_response: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefundError {
    #[error("No payment method recorded for this booking")]
    MissingPaymentMethod,
    #[error("Unsupported payment method: {0}")]
    PaymentMethodUnsupported(String),
    #[error("No PayPal transaction ID found for this booking")]
    MissingTransactionId,
    #[error("Invalid refund amount: {0}")]
    InvalidAmount(i64),
    #[error("Stripe refunds not yet implemented")]
    StripeNotImplemented,
    #[error("PayPal authentication failed: {0}")]
    Authentication(String),
    #[error("This payment has already been refunded")]
    AlreadyRefunded,
    #[error("Refund limit exceeded for this payment")]
    RefundLimitExceeded,
    #[error("Refund amount exceeds the amount available for refund")]
    AmountExceedsAvailable,
    #[error("Payment is not in a refundable state")]
    NotRefundable,
    #[error("PayPal refund failed: {0}")]
    Provider(String),
}

impl RefundError {
    /// Failures detected locally, before talking to a provider.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            RefundError::MissingPaymentMethod
                | RefundError::PaymentMethodUnsupported(_)
                | RefundError::MissingTransactionId
                | RefundError::InvalidAmount(_)
                | RefundError::StripeNotImplemented
        )
    }
}

/// Outcome of a refund attempt as reported to callers and merged into the
/// booking record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub mock_response: bool,
}

impl RefundResult {
    pub fn failed(error: &RefundError) -> Self {
        Self {
            success: false,
            refund_id: None,
            error: Some(error.to_string()),
            mock_response: false,
        }
    }
}

impl From<Result<RefundReceipt, RefundError>> for RefundResult {
    fn from(outcome: Result<RefundReceipt, RefundError>) -> Self {
        match outcome {
            Ok(receipt) => Self {
                success: true,
                refund_id: Some(receipt.refund_id),
                error: None,
                mock_response: receipt.mock_response,
            },
            Err(e) => Self::failed(&e),
        }
    }
}

/// A payment processor able to reverse a captured payment.
#[async_trait]
pub trait RefundProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, RefundError>;
}
