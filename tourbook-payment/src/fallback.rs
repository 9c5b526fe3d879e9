use async_trait::async_trait;
use std::sync::Arc;
use tourbook_core::payment::{RefundError, RefundProvider, RefundReceipt, RefundRequest};
use tracing::warn;
use uuid::Uuid;

/// Wraps a real provider for non-production runs. Local validation errors
/// still surface; anything the provider itself rejects is replaced with a
/// clearly marked mock receipt.
pub struct MockFallbackProvider {
    inner: Arc<dyn RefundProvider>,
}

impl MockFallbackProvider {
    pub fn new(inner: Arc<dyn RefundProvider>) -> Self {
        Self { inner }
    }
}

/// Stable per booking and transaction, so a retried cancellation reports
/// the same mock id.
pub fn mock_refund_id(request: &RefundRequest) -> String {
    let seed = format!("{}:{}", request.booking_id, request.transaction_id.trim());
    format!("MOCK-{}", Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).simple())
}

#[async_trait]
impl RefundProvider for MockFallbackProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, RefundError> {
        match self.inner.refund(request).await {
            Ok(receipt) => Ok(receipt),
            Err(e) if e.is_precondition() => Err(e),
            Err(e) => {
                let refund_id = mock_refund_id(request);
                warn!(
                    "{} refund failed for booking {} ({}), returning mock refund {}",
                    self.inner.name(),
                    request.booking_id,
                    e,
                    refund_id
                );
                Ok(RefundReceipt {
                    refund_id,
                    mock_response: true,
                })
            }
        }
    }
}
