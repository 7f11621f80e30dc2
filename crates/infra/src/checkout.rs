//! Checkout orchestration: promotion hold, stock reservation, order cut.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{instrument, warn};

use stockwell_core::{DomainError, InventoryId, Money, OrderId, PaymentProvider, UserId};
use stockwell_orders::{AppliedPromotion, Order, OrderItem, PaymentRecord};
use stockwell_promotions::{CheckoutIdentity, PromotionError};

use crate::promotion_ledger::{PromotionLedgerError, PromotionUsageLedger};
use crate::reservation::{ReservationError, ReservationManager};
use crate::store::{IdentityStore, OrderStore, StoreError};

/// One requested line. Catalog and pricing live outside this subsystem; the
/// caller supplies the unit price it quoted.
#[derive(Debug, Clone)]
pub struct CheckoutItem {
    pub inventory_id: InventoryId,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    pub identity: CheckoutIdentity,
    pub coupon_code: Option<String>,
    pub provider: PaymentProvider,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub total: Money,
    pub discount: Money,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("insufficient stock for inventory {inventory_id}: requested {requested}, available {available}")]
    InsufficientStock {
        inventory_id: InventoryId,
        requested: i64,
        available: i64,
    },

    #[error(transparent)]
    Promotion(#[from] PromotionError),

    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The entry point the (out-of-scope) storefront UI calls.
pub struct CheckoutCoordinator {
    orders: Arc<dyn OrderStore>,
    identities: Arc<dyn IdentityStore>,
    reservations: ReservationManager,
    promotions: PromotionUsageLedger,
}

impl CheckoutCoordinator {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        identities: Arc<dyn IdentityStore>,
        reservations: ReservationManager,
        promotions: PromotionUsageLedger,
    ) -> Self {
        Self {
            orders,
            identities,
            reservations,
            promotions,
        }
    }

    /// Run one checkout: hold the coupon, reserve stock all-or-nothing,
    /// create the order in `Pending` with a pending payment record.
    #[instrument(skip(self, request), fields(provider = %request.provider))]
    pub async fn checkout(
        &self,
        request: CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let (user_id, guest_email) = self.resolve_identity(&request.identity).await?;

        let promotion = match &request.coupon_code {
            Some(code) => {
                let promotion = self
                    .promotions
                    .validate_and_hold(
                        Some(user_id),
                        request.identity.guest_email(),
                        code,
                        now,
                    )
                    .await
                    .map_err(|e| match e {
                        PromotionLedgerError::Rule(rule) => CheckoutError::Promotion(rule),
                        PromotionLedgerError::Store(store) => CheckoutError::Store(store),
                    })?;
                Some(AppliedPromotion {
                    promotion_id: promotion.id,
                    coupon_code: promotion.coupon_code,
                    discount: promotion.discount,
                })
            }
            None => None,
        };

        let items = request
            .items
            .iter()
            .map(|item| OrderItem {
                inventory_id: item.inventory_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        let order = Order::new(OrderId::new(), user_id, guest_email, items, promotion, now)?;

        self.reservations
            .reserve_for_order(&order)
            .await
            .map_err(|e| match e {
                ReservationError::Insufficient { inventory_id, source } => {
                    CheckoutError::InsufficientStock {
                        inventory_id,
                        requested: source.requested,
                        available: source.available,
                    }
                }
                ReservationError::Store(store) => CheckoutError::Store(store),
            })?;

        let payment = PaymentRecord::pending(order.id, request.provider, now);
        if let Err(e) = self.orders.create(&order, &payment).await {
            // The reservation is live but the order never landed; give the
            // stock back before surfacing the error.
            warn!(order_id = %order.id, error = %e, "order persistence failed; releasing reservation");
            if let Err(release_err) = self.reservations.release_for_order(&order).await {
                warn!(order_id = %order.id, error = %release_err, "compensating release failed");
            }
            return Err(e.into());
        }

        Ok(CheckoutReceipt {
            order_id: order.id,
            total: order.total,
            discount: order
                .promotion
                .map(|p| p.discount)
                .unwrap_or(Money::ZERO),
        })
    }

    async fn resolve_identity(
        &self,
        identity: &CheckoutIdentity,
    ) -> Result<(UserId, Option<String>), StoreError> {
        match identity {
            CheckoutIdentity::Registered { user_id } => Ok((*user_id, None)),
            CheckoutIdentity::Guest { email } => {
                let user_id = self.identities.resolve_user_by_email(email).await?;
                Ok((user_id, Some(email.as_str().to_string())))
            }
        }
    }
}
