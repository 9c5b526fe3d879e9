pub mod fallback;
pub mod paypal;
pub mod refund;

use std::sync::Arc;
use tourbook_core::payment::RefundProvider;

pub use fallback::MockFallbackProvider;
pub use paypal::{PaypalApi, PaypalClient, PaypalError};
pub use refund::PaypalRefundProvider;

/// Pick the refund strategy for this process. Outside production the real
/// provider is wrapped so operators are never blocked by sandbox outages.
pub fn select_refund_provider(
    real: Arc<dyn RefundProvider>,
    production: bool,
) -> Arc<dyn RefundProvider> {
    if production {
        real
    } else {
        tracing::warn!(
            "Mock refund fallback enabled for {} (non-production environment)",
            real.name()
        );
        Arc::new(MockFallbackProvider::new(real))
    }
}
