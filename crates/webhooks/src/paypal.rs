//! PayPal callback adapter.
//!
//! Deliveries carry a shared webhook token header; the token is compared in
//! constant time. Capture events (`PAYMENT.CAPTURE.COMPLETED` / `DENIED`)
//! normalize; everything else acks to `None`. PayPal reports amounts as
//! major-unit decimal strings and references the order via `custom_id`.

use serde::Deserialize;

use stockwell_core::{Money, PaymentProvider};

use crate::event::{constant_time_eq, PaymentEvent, PaymentOutcome, WebhookError};

pub struct PaypalAdapter {
    webhook_token: String,
}

#[derive(Debug, Deserialize)]
struct PaypalEnvelope {
    id: String,
    event_type: String,
    resource: PaypalResource,
}

#[derive(Debug, Deserialize)]
struct PaypalResource {
    id: String,
    custom_id: Option<String>,
    /// Present on capture resources; other resource kinds may omit it.
    amount: Option<PaypalAmount>,
}

#[derive(Debug, Deserialize)]
struct PaypalAmount {
    value: String,
}

impl PaypalAdapter {
    pub fn new(webhook_token: impl Into<String>) -> Self {
        Self {
            webhook_token: webhook_token.into(),
        }
    }

    /// Verify and normalize one delivery.
    ///
    /// `Ok(None)` means the token checked out but the event kind is not a
    /// capture event.
    pub fn normalize(
        &self,
        payload: &[u8],
        token_header: &str,
    ) -> Result<Option<PaymentEvent>, WebhookError> {
        if !constant_time_eq(token_header.as_bytes(), self.webhook_token.as_bytes()) {
            return Err(WebhookError::InvalidSignature);
        }

        let raw: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        let envelope: PaypalEnvelope = serde_json::from_value(raw.clone())
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        let outcome = match envelope.event_type.as_str() {
            "PAYMENT.CAPTURE.COMPLETED" => PaymentOutcome::Succeeded,
            "PAYMENT.CAPTURE.DENIED" => PaymentOutcome::Failed,
            _ => return Ok(None),
        };

        let order_id = envelope
            .resource
            .custom_id
            .as_deref()
            .ok_or(WebhookError::MissingOrderId)?
            .parse()
            .map_err(|_| WebhookError::MissingOrderId)?;

        let amount = envelope
            .resource
            .amount
            .as_ref()
            .ok_or_else(|| WebhookError::MalformedPayload("capture without amount".to_string()))?;
        let amount = Money::from_major_str(&amount.value)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        Ok(Some(PaymentEvent {
            provider: PaymentProvider::Paypal,
            outcome,
            order_id,
            provider_event_id: envelope.id,
            provider_payment_id: Some(envelope.resource.id),
            amount,
            raw,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockwell_core::OrderId;

    const TOKEN: &str = "paypal-webhook-token";

    fn capture_payload(event_type: &str, order_id: OrderId, value: &str) -> Vec<u8> {
        serde_json::json!({
            "id": "WH-55",
            "event_type": event_type,
            "resource": {
                "id": "cap_9",
                "custom_id": order_id.to_string(),
                "amount": { "currency_code": "USD", "value": value },
            },
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn normalizes_completed_capture_with_minor_units() {
        let adapter = PaypalAdapter::new(TOKEN);
        let order_id = OrderId::new();
        let payload = capture_payload("PAYMENT.CAPTURE.COMPLETED", order_id, "79.98");

        let event = adapter.normalize(&payload, TOKEN).unwrap().unwrap();
        assert_eq!(event.provider, PaymentProvider::Paypal);
        assert_eq!(event.outcome, PaymentOutcome::Succeeded);
        assert_eq!(event.order_id, order_id);
        assert_eq!(event.provider_event_id, "WH-55");
        assert_eq!(event.amount, Money::from_minor(7998));
    }

    #[test]
    fn denied_capture_normalizes_to_failed() {
        let adapter = PaypalAdapter::new(TOKEN);
        let payload = capture_payload("PAYMENT.CAPTURE.DENIED", OrderId::new(), "10.00");

        let event = adapter.normalize(&payload, TOKEN).unwrap().unwrap();
        assert_eq!(event.outcome, PaymentOutcome::Failed);
    }

    #[test]
    fn rejects_wrong_token() {
        let adapter = PaypalAdapter::new(TOKEN);
        let payload = capture_payload("PAYMENT.CAPTURE.COMPLETED", OrderId::new(), "10.00");

        assert_eq!(
            adapter.normalize(&payload, "not-the-token"),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn other_event_kinds_ack_as_none() {
        let adapter = PaypalAdapter::new(TOKEN);
        // Non-capture resources carry a different shape and no amount.
        let payload = serde_json::json!({
            "id": "WH-56",
            "event_type": "CHECKOUT.ORDER.APPROVED",
            "resource": { "id": "ord_3" },
        })
        .to_string()
        .into_bytes();

        assert_eq!(adapter.normalize(&payload, TOKEN), Ok(None));
    }

    #[test]
    fn capture_without_custom_id_is_rejected() {
        let adapter = PaypalAdapter::new(TOKEN);
        let payload = serde_json::json!({
            "id": "WH-55",
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": { "id": "cap_9", "amount": { "value": "10.00" } },
        })
        .to_string()
        .into_bytes();

        assert_eq!(
            adapter.normalize(&payload, TOKEN),
            Err(WebhookError::MissingOrderId)
        );
    }

    #[test]
    fn malformed_amount_is_rejected() {
        let adapter = PaypalAdapter::new(TOKEN);
        let payload = capture_payload("PAYMENT.CAPTURE.COMPLETED", OrderId::new(), "10.9999");

        assert!(matches!(
            adapter.normalize(&payload, TOKEN),
            Err(WebhookError::MalformedPayload(_))
        ));
    }
}
