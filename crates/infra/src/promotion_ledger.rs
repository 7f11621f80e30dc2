//! Promotion usage ledger: validation at checkout, finalization on capture.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{instrument, warn};

use stockwell_core::UserId;
use stockwell_orders::Order;
use stockwell_promotions::{CanonicalEmail, Promotion, PromotionError, PromotionUsageRecord};

use crate::store::{PromotionStore, StoreError};

#[derive(Debug, Error)]
pub enum PromotionLedgerError {
    #[error(transparent)]
    Rule(#[from] PromotionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What `finalize` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The usage record was written; the discount stands.
    Applied,
    /// A concurrent checkout recorded the usage first. The order completes
    /// as charged, without a second usage record — a soft failure, because
    /// the payment is already captured.
    LostRace,
}

/// Enforces promotion rules against the stored usage ledger.
#[derive(Clone)]
pub struct PromotionUsageLedger {
    promotions: Arc<dyn PromotionStore>,
}

impl PromotionUsageLedger {
    pub fn new(promotions: Arc<dyn PromotionStore>) -> Self {
        Self { promotions }
    }

    /// Validate a coupon for an identity at checkout time.
    ///
    /// This is the advisory check: it rejects everything that is knowably
    /// wrong now (unknown code, window, limits, prior use by user row or
    /// canonical email). The authoritative one-time-use arbiter is the
    /// unique claim taken by [`PromotionUsageLedger::finalize`].
    #[instrument(skip(self, email))]
    pub async fn validate_and_hold(
        &self,
        user_id: Option<UserId>,
        email: Option<&CanonicalEmail>,
        coupon_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Promotion, PromotionLedgerError> {
        let promotion = self
            .promotions
            .find_by_code(coupon_code)
            .await?
            .ok_or(PromotionError::NotFound)?;

        promotion.check_window(now)?;

        let total_uses = self.promotions.usage_count(promotion.id).await?;
        let identity_used = if promotion.one_time_use {
            self.promotions
                .identity_has_usage(coupon_code, user_id, email)
                .await?
        } else {
            false
        };
        promotion.check_usage(total_uses, identity_used)?;

        Ok(promotion)
    }

    /// Persist the usage record for an order entering `Processing`.
    ///
    /// Re-checks uniqueness via the store's claim constraints; losing the
    /// race is reported, not raised, so the capture flow continues.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn finalize(
        &self,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<FinalizeOutcome, StoreError> {
        let Some(applied) = &order.promotion else {
            return Ok(FinalizeOutcome::Applied);
        };

        let one_time_use = self
            .promotions
            .get_promotion(applied.promotion_id)
            .await?
            .map(|p| p.one_time_use)
            .unwrap_or(false);

        let email = match &order.guest_email {
            Some(raw) => Some(
                CanonicalEmail::new(raw)
                    .map_err(|e| StoreError::Invalid(e.to_string()))?,
            ),
            None => None,
        };

        let record = PromotionUsageRecord {
            promotion_id: applied.promotion_id,
            user_id: order.user_id,
            email,
            coupon_code: applied.coupon_code.clone(),
            order_id: order.id,
            discount_amount: applied.discount,
            created_at: now,
        };

        if self.promotions.record_usage(&record, one_time_use).await? {
            Ok(FinalizeOutcome::Applied)
        } else {
            warn!(
                order_id = %order.id,
                coupon_code = %applied.coupon_code,
                "promotion usage lost a finalize race; order completes without the discount recorded"
            );
            Ok(FinalizeOutcome::LostRace)
        }
    }
}
