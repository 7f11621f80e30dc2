use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockwell_core::{Money, PromotionId};

/// Why a coupon cannot be applied. User-facing, non-retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PromotionError {
    #[error("coupon code not found")]
    NotFound,

    #[error("promotion is not currently active")]
    Expired,

    #[error("promotion usage limit reached")]
    LimitExceeded,

    #[error("promotion already used by this customer")]
    AlreadyUsed,
}

/// A coupon-backed promotion definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub coupon_code: String,
    pub discount: Money,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Cap on total redemptions across all customers, if any.
    pub usage_limit: Option<u64>,
    /// At most one redemption per customer identity (user id or email),
    /// including across a guest-to-registered transition.
    pub one_time_use: bool,
    pub active: bool,
}

impl Promotion {
    /// Check the active window. `Expired` covers disabled, not-yet-started
    /// and past-end promotions alike; the storefront messages them the same.
    pub fn check_window(&self, now: DateTime<Utc>) -> Result<(), PromotionError> {
        if !self.active || now < self.starts_at {
            return Err(PromotionError::Expired);
        }
        if self.ends_at.is_some_and(|ends_at| now >= ends_at) {
            return Err(PromotionError::Expired);
        }
        Ok(())
    }

    /// Check usage counts gathered from the store.
    ///
    /// `total_uses` is the global redemption count; `identity_used` says
    /// whether this customer identity (by user row or canonical email) has a
    /// recorded redemption already.
    pub fn check_usage(&self, total_uses: u64, identity_used: bool) -> Result<(), PromotionError> {
        if self.usage_limit.is_some_and(|limit| total_uses >= limit) {
            return Err(PromotionError::LimitExceeded);
        }
        if self.one_time_use && identity_used {
            return Err(PromotionError::AlreadyUsed);
        }
        Ok(())
    }
}
