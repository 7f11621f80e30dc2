//! Cash-on-delivery adapter.
//!
//! COD has no external provider: the storefront mints a synthetic settlement
//! event when an operator confirms the order. Authenticity is the admin
//! bearer guard at the HTTP boundary, so there is no signature here; the
//! event id is derived from the order so a double-submitted confirmation
//! replays into the same idempotency key.

use serde::Deserialize;

use stockwell_core::{Money, OrderId, PaymentProvider};

use crate::event::{PaymentEvent, PaymentOutcome, WebhookError};

pub struct CodAdapter;

#[derive(Debug, Deserialize)]
struct CodRequest {
    order_id: String,
    amount: i64,
    #[serde(default)]
    reference: Option<String>,
}

impl CodAdapter {
    pub fn normalize(&self, payload: &[u8]) -> Result<PaymentEvent, WebhookError> {
        let raw: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        let request: CodRequest = serde_json::from_value(raw.clone())
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        let order_id: OrderId = request
            .order_id
            .parse()
            .map_err(|_| WebhookError::MissingOrderId)?;

        let provider_event_id = request
            .reference
            .unwrap_or_else(|| format!("cod-{order_id}"));

        Ok(PaymentEvent {
            provider: PaymentProvider::Cod,
            outcome: PaymentOutcome::Succeeded,
            order_id,
            provider_event_id,
            provider_payment_id: None,
            amount: Money::from_minor(request.amount),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_event_id_from_order_when_no_reference() {
        let order_id = OrderId::new();
        let payload = serde_json::json!({
            "order_id": order_id.to_string(),
            "amount": 7998,
        })
        .to_string()
        .into_bytes();

        let event = CodAdapter.normalize(&payload).unwrap();
        assert_eq!(event.provider, PaymentProvider::Cod);
        assert_eq!(event.outcome, PaymentOutcome::Succeeded);
        assert_eq!(event.provider_event_id, format!("cod-{order_id}"));
        assert_eq!(event.amount, Money::from_minor(7998));
    }

    #[test]
    fn explicit_reference_wins() {
        let payload = serde_json::json!({
            "order_id": OrderId::new().to_string(),
            "amount": 100,
            "reference": "cod-batch-7",
        })
        .to_string()
        .into_bytes();

        let event = CodAdapter.normalize(&payload).unwrap();
        assert_eq!(event.provider_event_id, "cod-batch-7");
    }

    #[test]
    fn rejects_garbage_order_id() {
        let payload = serde_json::json!({ "order_id": "nope", "amount": 100 })
            .to_string()
            .into_bytes();

        assert_eq!(
            CodAdapter.normalize(&payload),
            Err(WebhookError::MissingOrderId)
        );
    }
}
