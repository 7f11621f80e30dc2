//! Administrative stock inspection, seeding and repair.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use stockwell_core::{InventoryId, OrderId, PromotionId};
use stockwell_infra::store::{OrderStore, PromotionStore, StockStore};
use stockwell_inventory::{InventoryRecord, Sku};
use stockwell_promotions::Promotion;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/stock", post(seed_stock))
        .route("/stock/:id", get(get_stock))
        .route("/stock/sku/:sku", get(get_stock_by_sku))
        .route("/orders/:id/stock", get(order_stock))
        .route("/orders/:id/repair-stock", post(repair_stock))
        .route("/promotions", post(seed_promotion))
}

pub async fn seed_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SeedStockRequest>,
) -> axum::response::Response {
    let id = match &body.id {
        Some(raw) => match raw.parse() {
            Ok(id) => id,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid inventory id",
                )
            }
        },
        None => InventoryId::new(),
    };

    let sku = match Sku::new(body.sku) {
        Ok(sku) => sku,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_sku", e.to_string()),
    };

    let record = match InventoryRecord::new(id, sku, body.quantity) {
        Ok(record) => record,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
    };

    match services.stock.put(record).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InventoryId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid inventory id")
        }
    };

    match services.stock.get(id).await {
        Ok(record) => (StatusCode::OK, Json(dto::stock_to_json(&record))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_stock_by_sku(
    Extension(services): Extension<Arc<AppServices>>,
    Path(sku): Path<String>,
) -> axum::response::Response {
    match services.stock.get_by_sku(&sku).await {
        Ok(record) => (StatusCode::OK, Json(dto::stock_to_json(&record))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// One order's items with their current stock counters, for diagnosing
/// orders stuck in `Pending`.
pub async fn order_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id")
        }
    };

    let order = match services.orders.get(id).await {
        Ok(order) => order,
        Err(e) => return errors::store_error_to_response(e),
    };

    let mut items = Vec::with_capacity(order.items.len());
    for item in &order.items {
        let record = match services.stock.get(item.inventory_id).await {
            Ok(record) => record,
            Err(e) => return errors::store_error_to_response(e),
        };
        items.push(serde_json::json!({
            "inventory_id": item.inventory_id.to_string(),
            "sku": record.sku.as_str(),
            "ordered": item.quantity,
            "quantity": record.level.quantity(),
            "reserved": record.level.reserved(),
        }));
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order_id": order.id.to_string(),
            "status": order.status.as_str(),
            "total": order.total.minor_units(),
            "items": items,
        })),
    )
        .into_response()
}

pub async fn repair_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id")
        }
    };

    match services.repair.repair_order(id).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::repair_error_to_response(e),
    }
}

pub async fn seed_promotion(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SeedPromotionRequest>,
) -> axum::response::Response {
    let now = Utc::now();
    let promotion = Promotion {
        id: PromotionId::new(),
        coupon_code: body.coupon_code,
        discount: stockwell_core::Money::from_minor(body.discount),
        starts_at: body.starts_at.unwrap_or(now),
        ends_at: body.ends_at,
        usage_limit: body.usage_limit,
        one_time_use: body.one_time_use,
        active: body.active,
    };
    let id = promotion.id;

    match services.promotions.put_promotion(promotion).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
