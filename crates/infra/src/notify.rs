//! Customer notification seam.
//!
//! Email delivery is an external collaborator; the reconciler only needs a
//! place to hand the order to. The default implementation records the intent
//! in the log.

use async_trait::async_trait;

use stockwell_orders::Order;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// The order's payment was captured; a confirmation should go out.
    async fn order_confirmed(&self, order: &Order);

    /// The order was cancelled after a failed payment.
    async fn order_cancelled(&self, order: &Order);
}

/// Log-only notifier used in dev/tests and as the default wiring.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_confirmed(&self, order: &Order) {
        tracing::info!(order_id = %order.id, "confirmation email scheduled");
    }

    async fn order_cancelled(&self, order: &Order) {
        tracing::info!(order_id = %order.id, "cancellation email scheduled");
    }
}
