//! Stripe callback adapter.
//!
//! Verifies the `Stripe-Signature` header (`t=<unix>,v1=<hmac-sha256>` over
//! `"<t>.<body>"`) and normalizes `payment_intent.*` / `charge.*` settlement
//! events. Other event kinds verify fine but normalize to `None`; the
//! endpoint acks them without touching any order.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use stockwell_core::{Money, PaymentProvider};

use crate::event::{PaymentEvent, PaymentOutcome, WebhookError};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed timestamp before the delivery is rejected as a
/// possible replay.
const DEFAULT_TOLERANCE_SECS: i64 = 300;

pub struct StripeAdapter {
    endpoint_secret: String,
    tolerance: Duration,
}

#[derive(Debug, Deserialize)]
struct StripeEnvelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: StripeData,
}

#[derive(Debug, Deserialize)]
struct StripeData {
    object: StripeObject,
}

#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
    /// Present on settlement objects; other event kinds may omit it.
    amount: Option<i64>,
    #[serde(default)]
    metadata: StripeMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct StripeMetadata {
    order_id: Option<String>,
}

impl StripeAdapter {
    pub fn new(endpoint_secret: impl Into<String>) -> Self {
        Self {
            endpoint_secret: endpoint_secret.into(),
            tolerance: Duration::seconds(DEFAULT_TOLERANCE_SECS),
        }
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Verify and normalize one delivery.
    ///
    /// `Ok(None)` means the signature checked out but the event kind is not a
    /// settlement event.
    pub fn normalize(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentEvent>, WebhookError> {
        self.verify_signature(payload, signature_header, now)?;

        let raw: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        let envelope: StripeEnvelope = serde_json::from_value(raw.clone())
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        let outcome = match envelope.kind.as_str() {
            "payment_intent.succeeded" | "charge.succeeded" => PaymentOutcome::Succeeded,
            "payment_intent.payment_failed" | "charge.failed" => PaymentOutcome::Failed,
            _ => return Ok(None),
        };

        let order_id = envelope
            .data
            .object
            .metadata
            .order_id
            .as_deref()
            .ok_or(WebhookError::MissingOrderId)?
            .parse()
            .map_err(|_| WebhookError::MissingOrderId)?;

        let amount = envelope
            .data
            .object
            .amount
            .ok_or_else(|| WebhookError::MalformedPayload("settlement event without amount".to_string()))?;

        Ok(Some(PaymentEvent {
            provider: PaymentProvider::Stripe,
            outcome,
            order_id,
            provider_event_id: envelope.id,
            provider_payment_id: Some(envelope.data.object.id),
            // Stripe amounts are already minor units.
            amount: Money::from_minor(amount),
            raw,
        }))
    }

    fn verify_signature(
        &self,
        payload: &[u8],
        header: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<Vec<u8>> = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = value.parse().ok();
                }
                Some(("v1", value)) => {
                    if let Ok(bytes) = hex::decode(value) {
                        candidates.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::InvalidSignature)?;
        if candidates.is_empty() {
            return Err(WebhookError::InvalidSignature);
        }

        let signed_at = DateTime::<Utc>::from_timestamp(timestamp, 0)
            .ok_or(WebhookError::InvalidSignature)?;
        if (now - signed_at).abs() > self.tolerance {
            return Err(WebhookError::InvalidSignature);
        }

        // Signature scheme: HMAC-SHA256(secret, "<t>.<body>"), any v1 entry
        // may match (Stripe sends several during secret rotation).
        let mut mac = HmacSha256::new_from_slice(self.endpoint_secret.as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        for candidate in &candidates {
            if mac.clone().verify_slice(candidate).is_ok() {
                return Ok(());
            }
        }
        Err(WebhookError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockwell_core::OrderId;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    fn settlement_payload(kind: &str, order_id: OrderId, amount: i64) -> Vec<u8> {
        serde_json::json!({
            "id": "evt_123",
            "type": kind,
            "data": { "object": {
                "id": "pi_123",
                "amount": amount,
                "metadata": { "order_id": order_id.to_string() },
            }},
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn accepts_valid_signature_and_normalizes() {
        let adapter = StripeAdapter::new(SECRET);
        let order_id = OrderId::new();
        let now = Utc::now();
        let payload = settlement_payload("payment_intent.succeeded", order_id, 7998);
        let header = sign(&payload, SECRET, now.timestamp());

        let event = adapter.normalize(&payload, &header, now).unwrap().unwrap();
        assert_eq!(event.provider, PaymentProvider::Stripe);
        assert_eq!(event.outcome, PaymentOutcome::Succeeded);
        assert_eq!(event.order_id, order_id);
        assert_eq!(event.provider_event_id, "evt_123");
        assert_eq!(event.provider_payment_id.as_deref(), Some("pi_123"));
        assert_eq!(event.amount, Money::from_minor(7998));
    }

    #[test]
    fn failed_intent_normalizes_to_failed_outcome() {
        let adapter = StripeAdapter::new(SECRET);
        let now = Utc::now();
        let payload = settlement_payload("payment_intent.payment_failed", OrderId::new(), 7998);
        let header = sign(&payload, SECRET, now.timestamp());

        let event = adapter.normalize(&payload, &header, now).unwrap().unwrap();
        assert_eq!(event.outcome, PaymentOutcome::Failed);
    }

    #[test]
    fn rejects_wrong_secret() {
        let adapter = StripeAdapter::new(SECRET);
        let now = Utc::now();
        let payload = settlement_payload("payment_intent.succeeded", OrderId::new(), 100);
        let header = sign(&payload, "wrong_secret", now.timestamp());

        assert_eq!(
            adapter.normalize(&payload, &header, now),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_modified_payload() {
        let adapter = StripeAdapter::new(SECRET);
        let now = Utc::now();
        let payload = settlement_payload("payment_intent.succeeded", OrderId::new(), 100);
        let header = sign(&payload, SECRET, now.timestamp());

        let mut tampered = payload.clone();
        tampered.extend_from_slice(b" ");
        assert_eq!(
            adapter.normalize(&tampered, &header, now),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let adapter = StripeAdapter::new(SECRET);
        let now = Utc::now();
        let payload = settlement_payload("payment_intent.succeeded", OrderId::new(), 100);
        let header = sign(&payload, SECRET, (now - Duration::seconds(600)).timestamp());

        assert_eq!(
            adapter.normalize(&payload, &header, now),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_header_missing_parts() {
        let adapter = StripeAdapter::new(SECRET);
        let now = Utc::now();
        let payload = settlement_payload("payment_intent.succeeded", OrderId::new(), 100);

        assert_eq!(
            adapter.normalize(&payload, "v1=deadbeef", now),
            Err(WebhookError::InvalidSignature)
        );
        assert_eq!(
            adapter.normalize(&payload, &format!("t={}", now.timestamp()), now),
            Err(WebhookError::InvalidSignature)
        );
        assert_eq!(
            adapter.normalize(&payload, "garbage", now),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn non_settlement_events_are_acked_as_none() {
        let adapter = StripeAdapter::new(SECRET);
        let now = Utc::now();
        // No amount on the object, as for most non-payment kinds.
        let payload = serde_json::json!({
            "id": "evt_other",
            "type": "customer.created",
            "data": { "object": { "id": "cus_1" } },
        })
        .to_string()
        .into_bytes();
        let header = sign(&payload, SECRET, now.timestamp());

        assert_eq!(adapter.normalize(&payload, &header, now), Ok(None));
    }

    #[test]
    fn settlement_event_without_order_metadata_is_rejected() {
        let adapter = StripeAdapter::new(SECRET);
        let now = Utc::now();
        let payload = serde_json::json!({
            "id": "evt_123",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_123", "amount": 100, "metadata": {} } },
        })
        .to_string()
        .into_bytes();
        let header = sign(&payload, SECRET, now.timestamp());

        assert_eq!(
            adapter.normalize(&payload, &header, now),
            Err(WebhookError::MissingOrderId)
        );
    }
}
