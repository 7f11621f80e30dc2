use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockwell_core::{DomainError, OrderId, PaymentProvider};

/// Lifecycle of the payment attached to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl core::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(DomainError::validation(format!("unknown payment status: {other}"))),
        }
    }
}

/// The payment record, one-to-one with its order.
///
/// Upserted keyed by `order_id`: a replayed or racing webhook overwrites the
/// row rather than inserting a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub order_id: OrderId,
    pub provider: PaymentProvider,
    pub provider_payment_id: Option<String>,
    pub status: PaymentStatus,
    /// Raw provider payload kept for audit/debugging.
    pub raw_result: JsonValue,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// The record a fresh checkout starts with.
    pub fn pending(order_id: OrderId, provider: PaymentProvider, now: DateTime<Utc>) -> Self {
        Self {
            order_id,
            provider,
            provider_payment_id: None,
            status: PaymentStatus::Pending,
            raw_result: JsonValue::Null,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_record_has_no_provider_payment_id() {
        let record = PaymentRecord::pending(OrderId::new(), PaymentProvider::Stripe, Utc::now());
        assert_eq!(record.status, PaymentStatus::Pending);
        assert!(record.provider_payment_id.is_none());
        assert_eq!(record.raw_result, JsonValue::Null);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
    }
}
