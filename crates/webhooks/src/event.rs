use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockwell_core::{Money, OrderId, PaymentProvider};

/// What the provider says happened to the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

/// The normal form every provider callback is reduced to.
///
/// `provider_event_id` is the provider's delivery identifier and the key for
/// replay detection; `amount` is what the provider claims was captured, in
/// minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub provider: PaymentProvider,
    pub outcome: PaymentOutcome,
    pub order_id: OrderId,
    pub provider_event_id: String,
    pub provider_payment_id: Option<String>,
    pub amount: Money,
    /// The provider payload as delivered, kept on the payment record for
    /// audit.
    pub raw: JsonValue,
}

/// Why a callback was rejected at the boundary. All of these map to a 4xx:
/// the provider re-sending the same payload will fail the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebhookError {
    #[error("signature verification failed")]
    InvalidSignature,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("event carries no order reference")]
    MissingOrderId,
}

/// Byte-wise comparison that doesn't short-circuit on the first mismatch.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_handles_lengths_and_content() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
