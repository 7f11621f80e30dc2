//! Provider webhook endpoints.
//!
//! `200` means processed or idempotent no-op; anything else tells the
//! provider to retry (transient) or stop (verification/payload problems).

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use stockwell_infra::ReconcileOutcome;
use stockwell_webhooks::PaymentEvent;

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn stripe(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match services.stripe.normalize(&body, signature, Utc::now()) {
        Ok(Some(event)) => reconcile(&services, &event).await,
        Ok(None) => ignored(),
        Err(e) => errors::webhook_error_to_response(e),
    }
}

pub async fn paypal(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let token = headers
        .get("Paypal-Webhook-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match services.paypal.normalize(&body, token) {
        Ok(Some(event)) => reconcile(&services, &event).await,
        Ok(None) => ignored(),
        Err(e) => errors::webhook_error_to_response(e),
    }
}

/// COD settlements are minted by operators; the admin bearer guard wrapped
/// around this route is the authenticity check.
pub async fn cod(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    match services.cod.normalize(&body) {
        Ok(event) => reconcile(&services, &event).await,
        Err(e) => errors::webhook_error_to_response(e),
    }
}

async fn reconcile(services: &AppServices, event: &PaymentEvent) -> axum::response::Response {
    match services.reconciler.process(event, Utc::now()).await {
        Ok(outcome) => {
            let outcome = match outcome {
                ReconcileOutcome::Processed => "processed",
                ReconcileOutcome::Duplicate => "duplicate",
                ReconcileOutcome::AlreadySettled => "already_settled",
            };
            (
                StatusCode::OK,
                Json(serde_json::json!({ "received": true, "outcome": outcome })),
            )
                .into_response()
        }
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

fn ignored() -> axum::response::Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "received": true, "outcome": "ignored" })),
    )
        .into_response()
}
