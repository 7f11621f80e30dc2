use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

use stockwell_core::UserId;
use stockwell_infra::PromotionLedgerError;
use stockwell_promotions::CanonicalEmail;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

/// Client-side precheck for coupon applicability. Everything the client
/// sent besides the coupon code and identity is ignored; the ledger's
/// answer is authoritative.
pub async fn usage(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::UsageQueryRequest>,
) -> axum::response::Response {
    let user_id = match &body.user_id {
        Some(raw) => match raw.parse::<UserId>() {
            Ok(user_id) => Some(user_id),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
            }
        },
        None => None,
    };

    let email = match &body.guest_email {
        Some(raw) => match CanonicalEmail::new(raw) {
            Ok(email) => Some(email),
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_email", e.to_string())
            }
        },
        None => None,
    };

    if user_id.is_none() && email.is_none() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_identity",
            "user_id or guest_email is required",
        );
    }

    match services
        .promotion_ledger
        .validate_and_hold(user_id, email.as_ref(), &body.coupon_code, Utc::now())
        .await
    {
        Ok(promotion) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "usable": true,
                "promotion_id": promotion.id.to_string(),
                "coupon_code": promotion.coupon_code,
                "discount": promotion.discount.minor_units(),
            })),
        )
            .into_response(),
        Err(PromotionLedgerError::Rule(rule)) => errors::promotion_error_to_response(rule),
        Err(PromotionLedgerError::Store(store)) => errors::store_error_to_response(store),
    }
}
