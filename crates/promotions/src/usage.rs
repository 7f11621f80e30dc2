use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwell_core::{Money, OrderId, PromotionId, UserId};

use crate::identity::CanonicalEmail;

/// A finalized redemption of a promotion by one customer identity.
///
/// For one-time-use promotions at most one record may exist per identity
/// (user row or canonical email) and coupon code; the store's unique
/// constraints are the authoritative guard, re-checked at finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionUsageRecord {
    pub promotion_id: PromotionId,
    pub user_id: UserId,
    /// Canonical guest email, when the redeeming identity was a guest.
    pub email: Option<CanonicalEmail>,
    pub coupon_code: String,
    pub order_id: OrderId,
    pub discount_amount: Money,
    pub created_at: DateTime<Utc>,
}
