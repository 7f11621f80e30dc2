use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockwell_infra::{CheckoutError, ReconcileError, RepairError, StoreError};
use stockwell_promotions::PromotionError;
use stockwell_webhooks::WebhookError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn checkout_error_to_response(err: CheckoutError) -> axum::response::Response {
    match err {
        CheckoutError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", err.to_string())
        }
        CheckoutError::Promotion(rule) => promotion_error_to_response(rule),
        CheckoutError::Validation(e) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
        CheckoutError::Store(e) => store_error_to_response(e),
    }
}

pub fn promotion_error_to_response(err: PromotionError) -> axum::response::Response {
    let code = match err {
        PromotionError::NotFound => "promotion_not_found",
        PromotionError::Expired => "promotion_expired",
        PromotionError::LimitExceeded => "promotion_limit_exceeded",
        PromotionError::AlreadyUsed => "promotion_already_used",
    };
    json_error(StatusCode::UNPROCESSABLE_ENTITY, code, err.to_string())
}

pub fn reconcile_error_to_response(err: ReconcileError) -> axum::response::Response {
    match err {
        ReconcileError::UnresolvableOrder(_) => {
            json_error(StatusCode::NOT_FOUND, "unresolvable_order", err.to_string())
        }
        ReconcileError::AmountMismatch { .. } => {
            json_error(StatusCode::BAD_REQUEST, "amount_mismatch", err.to_string())
        }
        ReconcileError::Store(e) => store_error_to_response(e),
    }
}

pub fn webhook_error_to_response(err: WebhookError) -> axum::response::Response {
    match err {
        WebhookError::InvalidSignature => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_signature", err.to_string())
        }
        WebhookError::MalformedPayload(_) | WebhookError::MissingOrderId => {
            json_error(StatusCode::BAD_REQUEST, "malformed_payload", err.to_string())
        }
    }
}

pub fn repair_error_to_response(err: RepairError) -> axum::response::Response {
    match err {
        RepairError::OrderStillPending(_) => {
            json_error(StatusCode::CONFLICT, "order_still_pending", err.to_string())
        }
        RepairError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
        RepairError::Store(e) => store_error_to_response(e),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Unavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", msg)
        }
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Invalid(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}
