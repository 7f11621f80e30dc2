use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use stockwell_core::{DomainError, InventoryId, Money, OrderId, PromotionId, UserId};

/// Order settlement lifecycle.
///
/// Transitions are monotonic except the explicit `Cancelled` exit:
/// `Pending → Processing → Shipped → Delivered`, plus
/// `Pending → Cancelled` and `Processing → Cancelled` (refund path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether `self → to` is a legal transition.
    ///
    /// Stores enforce this with a compare-and-swap on the current status;
    /// this predicate is the single source of truth for what the swap may
    /// attempt.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
                | (Processing, Shipped)
                | (Shipped, Delivered)
        )
    }

    /// No transition leaves these states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The order has left `Pending`: its reservation has been either
    /// committed or released.
    pub fn is_settled(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown order status: {other}"))),
        }
    }
}

/// One line of an order.
///
/// Immutable once the order leaves `Pending`; `quantity` is the authoritative
/// amount that must eventually be released or committed from reserved stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub inventory_id: InventoryId,
    pub quantity: i64,
    /// Price per unit in minor currency units.
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// A promotion held at checkout time, finalized on payment capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromotion {
    pub promotion_id: PromotionId,
    pub coupon_code: String,
    pub discount: Money,
}

/// The order aggregate.
///
/// Created in `Pending` by the checkout coordinator. Guest checkouts carry
/// the canonical guest email alongside the (possibly placeholder) user row
/// they resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub guest_email: Option<String>,
    pub items: Vec<OrderItem>,
    pub promotion: Option<AppliedPromotion>,
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Build a new `Pending` order, computing the total from its lines and
    /// the held discount (floored at zero).
    pub fn new(
        id: OrderId,
        user_id: UserId,
        guest_email: Option<String>,
        items: Vec<OrderItem>,
        promotion: Option<AppliedPromotion>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::validation("order must have at least one item"));
        }
        let mut subtotal = Money::ZERO;
        for item in &items {
            if item.quantity <= 0 {
                return Err(DomainError::validation("item quantity must be positive"));
            }
            if item.unit_price.is_negative() {
                return Err(DomainError::validation("unit price cannot be negative"));
            }
            let line = item
                .line_total()
                .ok_or_else(|| DomainError::validation("line total overflow"))?;
            subtotal = subtotal
                .checked_add(line)
                .ok_or_else(|| DomainError::validation("order total overflow"))?;
        }

        let total = match &promotion {
            Some(p) => subtotal.saturating_sub_floor_zero(p.discount),
            None => subtotal,
        };

        Ok(Self {
            id,
            user_id,
            guest_email,
            items,
            promotion,
            total,
            status: OrderStatus::Pending,
            created_at,
        })
    }

    /// Apply a transition, enforcing the state machine.
    pub fn transition(&mut self, to: OrderStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::invariant(format!(
                "illegal order transition {} -> {}",
                self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }
}
