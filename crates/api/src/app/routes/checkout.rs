use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

use stockwell_core::{Money, PaymentProvider, UserId};
use stockwell_infra::store::StockStore;
use stockwell_infra::{CheckoutError, CheckoutItem, CheckoutRequest};
use stockwell_promotions::CheckoutIdentity;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CheckoutRequestBody>,
) -> axum::response::Response {
    let identity = match (&body.user_id, &body.guest_email) {
        (Some(user_id), None) => match user_id.parse::<UserId>() {
            Ok(user_id) => CheckoutIdentity::Registered { user_id },
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
            }
        },
        (None, Some(email)) => match CheckoutIdentity::guest(email) {
            Ok(identity) => identity,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_email", e.to_string())
            }
        },
        _ => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_identity",
                "exactly one of user_id or guest_email is required",
            )
        }
    };

    let provider = match body
        .provider
        .as_deref()
        .unwrap_or("stripe")
        .parse::<PaymentProvider>()
    {
        Ok(provider) => provider,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_provider", e.to_string())
        }
    };

    let mut items = Vec::with_capacity(body.items.len());
    for item in &body.items {
        let inventory_id = match item.inventory_id.parse() {
            Ok(id) => id,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid inventory id",
                )
            }
        };
        items.push(CheckoutItem {
            inventory_id,
            quantity: item.quantity,
            unit_price: Money::from_minor(item.unit_price),
        });
    }

    let request = CheckoutRequest {
        items,
        identity,
        coupon_code: body.coupon_code,
        provider,
    };

    match services.coordinator.checkout(request, Utc::now()).await {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "order_id": receipt.order_id.to_string(),
                "total": receipt.total.minor_units(),
                "discount": receipt.discount.minor_units(),
            })),
        )
            .into_response(),
        Err(CheckoutError::InsufficientStock {
            inventory_id,
            requested,
            available,
        }) => insufficient_stock_response(&services, inventory_id, requested, available).await,
        Err(e) => errors::checkout_error_to_response(e),
    }
}

/// Clients pick another SKU or reduce quantity off this response, so it
/// carries the failing SKU and the counters, not just a message.
async fn insufficient_stock_response(
    services: &AppServices,
    inventory_id: stockwell_core::InventoryId,
    requested: i64,
    available: i64,
) -> axum::response::Response {
    let sku = services
        .stock
        .get(inventory_id)
        .await
        .map(|record| record.sku.as_str().to_string())
        .ok();

    (
        StatusCode::CONFLICT,
        Json(serde_json::json!({
            "error": "insufficient_stock",
            "message": format!(
                "insufficient stock for inventory {inventory_id}: requested {requested}, available {available}"
            ),
            "sku": sku,
            "requested": requested,
            "available": available,
        })),
    )
        .into_response()
}
