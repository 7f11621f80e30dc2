//! Webhook reconciliation: drives order settlement exactly once per
//! real-world payment event.
//!
//! Providers retry aggressively and redeliver freely; everything here is
//! built to be safely repeatable. The two guards are the event log (replay
//! of the same delivery) and the Pending→Processing compare-and-swap (two
//! different deliveries for the same real-world payment).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use stockwell_core::{Money, OrderId};
use stockwell_orders::{Order, OrderStatus, PaymentRecord, PaymentStatus};
use stockwell_webhooks::{PaymentEvent, PaymentOutcome};

use crate::notify::Notifier;
use crate::promotion_ledger::PromotionUsageLedger;
use crate::reservation::ReservationManager;
use crate::store::{OrderStore, StoreError, WebhookEventLog};

/// Captured amounts may differ from the order total by provider-side
/// rounding; anything beyond one minor unit is rejected.
const AMOUNT_TOLERANCE_MINOR: i64 = 1;

/// How a delivery was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This delivery drove the settlement.
    Processed,
    /// Same `provider_event_id` seen before; nothing re-ran.
    Duplicate,
    /// A different delivery settled the order first; this one was a no-op.
    AlreadySettled,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The event references an order this system has never seen. A metadata
    /// bug upstream — loud, manual-investigation territory.
    #[error("webhook references unknown order {0}")]
    UnresolvableOrder(OrderId),

    /// Captured amount disagrees with the order total beyond tolerance.
    /// The order is left untouched.
    #[error("captured amount {captured} does not match order total {expected} for order {order_id}")]
    AmountMismatch {
        order_id: OrderId,
        expected: Money,
        captured: Money,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct WebhookReconciler {
    orders: Arc<dyn OrderStore>,
    reservations: ReservationManager,
    promotions: PromotionUsageLedger,
    event_log: Arc<dyn WebhookEventLog>,
    notifier: Arc<dyn Notifier>,
}

impl WebhookReconciler {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        reservations: ReservationManager,
        promotions: PromotionUsageLedger,
        event_log: Arc<dyn WebhookEventLog>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orders,
            reservations,
            promotions,
            event_log,
            notifier,
        }
    }

    /// Absorb one normalized provider event.
    ///
    /// The event id is written to the log only after processing completes:
    /// a crash mid-way leaves the log unwritten, the provider retries, and
    /// the compare-and-swap makes the retry converge instead of double-apply.
    #[instrument(
        skip(self, event),
        fields(
            provider = %event.provider,
            provider_event_id = %event.provider_event_id,
            order_id = %event.order_id,
        )
    )]
    pub async fn process(
        &self,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if self
            .event_log
            .seen(event.provider, &event.provider_event_id)
            .await?
        {
            debug!("duplicate delivery; skipping");
            return Ok(ReconcileOutcome::Duplicate);
        }

        let order = match self.orders.get(event.order_id).await {
            Ok(order) => order,
            Err(StoreError::NotFound) => {
                error!("webhook references an order that does not exist");
                return Err(ReconcileError::UnresolvableOrder(event.order_id));
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = match event.outcome {
            PaymentOutcome::Succeeded => self.apply_success(&order, event, now).await?,
            PaymentOutcome::Failed => self.apply_failure(&order, event, now).await?,
        };

        self.event_log
            .record(event.provider, &event.provider_event_id, now)
            .await?;

        Ok(outcome)
    }

    async fn apply_success(
        &self,
        order: &Order,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if !order
            .total
            .matches_within(event.amount, AMOUNT_TOLERANCE_MINOR)
        {
            error!(
                expected = %order.total,
                captured = %event.amount,
                "captured amount mismatch; order left untouched"
            );
            return Err(ReconcileError::AmountMismatch {
                order_id: order.id,
                expected: order.total,
                captured: event.amount,
            });
        }

        let swapped = self
            .orders
            .transition(order.id, OrderStatus::Pending, OrderStatus::Processing)
            .await?;

        if !swapped {
            // Someone else already moved the order. A late capture for a
            // cancelled order is alert-worthy; everything else just keeps
            // the payment record current.
            if order.status == OrderStatus::Cancelled {
                warn!("capture arrived for a cancelled order");
            } else {
                self.orders
                    .upsert_payment(&self.payment_from_event(event, PaymentStatus::Completed, now))
                    .await?;
            }
            return Ok(ReconcileOutcome::AlreadySettled);
        }

        self.reservations.commit_for_order(order).await?;
        self.promotions.finalize(order, now).await?;
        self.orders
            .upsert_payment(&self.payment_from_event(event, PaymentStatus::Completed, now))
            .await?;
        self.notifier.order_confirmed(order).await;

        Ok(ReconcileOutcome::Processed)
    }

    async fn apply_failure(
        &self,
        order: &Order,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let swapped = self
            .orders
            .transition(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await?;

        if !swapped {
            debug!(status = %order.status, "failure event for an already-settled order");
            return Ok(ReconcileOutcome::AlreadySettled);
        }

        self.reservations.release_for_order(order).await?;
        self.orders
            .upsert_payment(&self.payment_from_event(event, PaymentStatus::Failed, now))
            .await?;
        self.notifier.order_cancelled(order).await;

        Ok(ReconcileOutcome::Processed)
    }

    fn payment_from_event(
        &self,
        event: &PaymentEvent,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> PaymentRecord {
        PaymentRecord {
            order_id: event.order_id,
            provider: event.provider,
            provider_payment_id: event.provider_payment_id.clone(),
            status,
            raw_result: event.raw.clone(),
            updated_at: now,
        }
    }
}
