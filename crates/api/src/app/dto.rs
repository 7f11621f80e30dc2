use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use stockwell_inventory::InventoryRecord;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CheckoutItemRequest {
    pub inventory_id: String,
    pub quantity: i64,
    /// Quoted unit price in minor currency units (pricing lives with the
    /// out-of-scope catalog).
    pub unit_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequestBody {
    pub items: Vec<CheckoutItemRequest>,
    pub user_id: Option<String>,
    pub guest_email: Option<String>,
    pub coupon_code: Option<String>,
    /// Defaults to "stripe".
    pub provider: Option<String>,
}

/// Client-side precheck payload. Whatever the client claims, validation is
/// re-run server-side from the coupon code and identity alone.
#[derive(Debug, Deserialize)]
pub struct UsageQueryRequest {
    pub coupon_code: String,
    pub user_id: Option<String>,
    pub guest_email: Option<String>,
    #[allow(dead_code)]
    pub promotion_id: Option<String>,
    #[allow(dead_code)]
    pub order_id: Option<String>,
    #[allow(dead_code)]
    pub discount_amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SeedStockRequest {
    pub sku: String,
    pub quantity: i64,
    pub id: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SeedPromotionRequest {
    pub coupon_code: String,
    pub discount: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<u64>,
    #[serde(default)]
    pub one_time_use: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

// -------------------------
// Response mapping
// -------------------------

pub fn stock_to_json(record: &InventoryRecord) -> serde_json::Value {
    json!({
        "id": record.id.to_string(),
        "sku": record.sku.as_str(),
        "quantity": record.level.quantity(),
        "reserved": record.level.reserved(),
        "available": record.level.available(),
    })
}
