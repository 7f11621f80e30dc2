//! Postgres-backed store implementations.
//!
//! Every mutation here is a single conditional statement: the invariant
//! check lives in the `WHERE` clause (or an `ON CONFLICT` target), so there
//! is no read-modify-write gap visible to other instances.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | StoreError | Scenario |
//! |------------|-----------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | duplicate insert (usage claim, order id) |
//! | Database (other) | any other | `Invalid` | constraint/data problems |
//! | RowNotFound | n/a | `NotFound` | missing row on a required read |
//! | PoolTimedOut / PoolClosed / Io | n/a | `Unavailable` | transient; safe to retry |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use stockwell_core::{InventoryId, Money, OrderId, PaymentProvider, PromotionId, UserId};
use stockwell_inventory::{CommitReceipt, InsufficientStock, InventoryRecord, Sku, StockLevel};
use stockwell_orders::{AppliedPromotion, Order, OrderItem, OrderStatus, PaymentRecord};
use stockwell_promotions::{CanonicalEmail, Promotion, PromotionUsageRecord};

use super::{
    IdentityStore, OrderStore, PromotionStore, ReserveError, StockStore, StoreError,
    WebhookEventLog,
};

fn map_sqlx_error(op: &str, e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) => {
            if db.code().as_deref() == Some("23505") {
                StoreError::Conflict(format!("{op}: unique violation"))
            } else {
                StoreError::Invalid(format!("{op}: {db}"))
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("{op}: {e}"))
        }
        _ => StoreError::Unavailable(format!("{op}: {e}")),
    }
}

#[derive(Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<InventoryRecord, StoreError> {
        let id: uuid::Uuid = row.try_get("id").map_err(|e| StoreError::Invalid(e.to_string()))?;
        let sku: String = row.try_get("sku").map_err(|e| StoreError::Invalid(e.to_string()))?;
        let quantity: i64 = row
            .try_get("quantity")
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        let reserved: i64 = row
            .try_get("reserved")
            .map_err(|e| StoreError::Invalid(e.to_string()))?;

        Ok(InventoryRecord {
            id: InventoryId::from_uuid(id),
            sku: Sku::new(sku).map_err(|e| StoreError::Invalid(e.to_string()))?,
            level: StockLevel::from_counters(quantity, reserved)
                .map_err(|e| StoreError::Invalid(e.to_string()))?,
        })
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    #[instrument(skip(self, record), fields(inventory_id = %record.id))]
    async fn put(&self, record: InventoryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory (id, sku, quantity, reserved)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET sku = EXCLUDED.sku,
                quantity = EXCLUDED.quantity,
                reserved = EXCLUDED.reserved
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.sku.as_str())
        .bind(record.level.quantity())
        .bind(record.level.reserved())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("inventory.put", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(inventory_id = %id))]
    async fn get(&self, id: InventoryId) -> Result<InventoryRecord, StoreError> {
        let row = sqlx::query("SELECT id, sku, quantity, reserved FROM inventory WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("inventory.get", e))?
            .ok_or(StoreError::NotFound)?;
        Self::record_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn get_by_sku(&self, sku: &str) -> Result<InventoryRecord, StoreError> {
        let row = sqlx::query("SELECT id, sku, quantity, reserved FROM inventory WHERE sku = $1")
            .bind(sku)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("inventory.get_by_sku", e))?
            .ok_or(StoreError::NotFound)?;
        Self::record_from_row(&row)
    }

    #[instrument(skip(self), fields(inventory_id = %id, qty))]
    async fn reserve(&self, id: InventoryId, qty: i64) -> Result<(), ReserveError> {
        // Check and increment in one statement; concurrent reservations
        // serialize on the row lock.
        let result = sqlx::query(
            r#"
            UPDATE inventory
               SET reserved = reserved + $2
             WHERE id = $1 AND quantity - reserved >= $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(qty)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("inventory.reserve", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Zero rows: either the row is missing or the stock check lost.
        // Re-read only to shape the error; the decision was already made
        // atomically above.
        let record = self.get(id).await?;
        Err(ReserveError::Insufficient(InsufficientStock {
            requested: qty,
            available: record.level.available(),
        }))
    }

    #[instrument(skip(self), fields(inventory_id = %id, qty))]
    async fn release(&self, id: InventoryId, qty: i64) -> Result<i64, StoreError> {
        // The locked subselect pins the row before `prev.reserved` is read,
        // so the reported amount is exact even under contention.
        let row = sqlx::query(
            r#"
            UPDATE inventory i
               SET reserved = i.reserved - LEAST(i.reserved, $2)
              FROM (SELECT id, reserved FROM inventory WHERE id = $1 FOR UPDATE) prev
             WHERE i.id = prev.id
            RETURNING LEAST(prev.reserved, $2) AS released
            "#,
        )
        .bind(id.as_uuid())
        .bind(qty)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("inventory.release", e))?
        .ok_or(StoreError::NotFound)?;

        row.try_get("released")
            .map_err(|e| StoreError::Invalid(e.to_string()))
    }

    #[instrument(skip(self), fields(inventory_id = %id, qty))]
    async fn commit(&self, id: InventoryId, qty: i64) -> Result<CommitReceipt, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE inventory i
               SET quantity = i.quantity - LEAST(i.reserved, $2),
                   reserved = i.reserved - LEAST(i.reserved, $2)
              FROM (SELECT id, reserved FROM inventory WHERE id = $1 FOR UPDATE) prev
             WHERE i.id = prev.id
            RETURNING LEAST(prev.reserved, $2) AS committed
            "#,
        )
        .bind(id.as_uuid())
        .bind(qty)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("inventory.commit", e))?
        .ok_or(StoreError::NotFound)?;

        let committed: i64 = row
            .try_get("committed")
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        Ok(CommitReceipt {
            committed,
            shortfall: qty - committed,
        })
    }
}

#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[instrument(skip(self, order, payment), fields(order_id = %order.id))]
    async fn create(&self, order: &Order, payment: &PaymentRecord) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("orders.create", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, guest_email, promotion_id, coupon_code, discount,
                 total, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.guest_email.as_deref())
        .bind(order.promotion.as_ref().map(|p| *p.promotion_id.as_uuid()))
        .bind(order.promotion.as_ref().map(|p| p.coupon_code.as_str()))
        .bind(order.promotion.as_ref().map(|p| p.discount.minor_units()))
        .bind(order.total.minor_units())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("orders.create", e))?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, inventory_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(item.inventory_id.as_uuid())
            .bind(item.quantity)
            .bind(item.unit_price.minor_units())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("orders.create_item", e))?;
        }

        sqlx::query(
            r#"
            INSERT INTO payments
                (order_id, provider, provider_payment_id, status, raw_result, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(payment.order_id.as_uuid())
        .bind(payment.provider.as_str())
        .bind(payment.provider_payment_id.as_deref())
        .bind(payment.status.as_str())
        .bind(&payment.raw_result)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("orders.create_payment", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("orders.create", e))
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn get(&self, id: OrderId) -> Result<Order, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, guest_email, promotion_id, coupon_code, discount,
                   total, status, created_at
              FROM orders WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("orders.get", e))?
        .ok_or(StoreError::NotFound)?;

        let item_rows = sqlx::query(
            r#"
            SELECT inventory_id, quantity, unit_price
              FROM order_items WHERE order_id = $1
             ORDER BY inventory_id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("orders.get_items", e))?;

        let invalid = |e: sqlx::Error| StoreError::Invalid(e.to_string());

        let mut items = Vec::with_capacity(item_rows.len());
        for item in &item_rows {
            items.push(OrderItem {
                inventory_id: InventoryId::from_uuid(item.try_get("inventory_id").map_err(invalid)?),
                quantity: item.try_get("quantity").map_err(invalid)?,
                unit_price: Money::from_minor(item.try_get("unit_price").map_err(invalid)?),
            });
        }

        let promotion = match (
            row.try_get::<Option<uuid::Uuid>, _>("promotion_id").map_err(invalid)?,
            row.try_get::<Option<String>, _>("coupon_code").map_err(invalid)?,
            row.try_get::<Option<i64>, _>("discount").map_err(invalid)?,
        ) {
            (Some(promotion_id), Some(coupon_code), Some(discount)) => Some(AppliedPromotion {
                promotion_id: PromotionId::from_uuid(promotion_id),
                coupon_code,
                discount: Money::from_minor(discount),
            }),
            _ => None,
        };

        let status: String = row.try_get("status").map_err(invalid)?;

        Ok(Order {
            id,
            user_id: UserId::from_uuid(row.try_get("user_id").map_err(invalid)?),
            guest_email: row.try_get("guest_email").map_err(invalid)?,
            items,
            promotion,
            total: Money::from_minor(row.try_get("total").map_err(invalid)?),
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| StoreError::Invalid(e.to_string()))?,
            created_at: row.try_get("created_at").map_err(invalid)?,
        })
    }

    #[instrument(skip(self), fields(order_id = %id, from = %from, to = %to))]
    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3 WHERE id = $1 AND status = $2",
        )
        .bind(id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("orders.transition", e))?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        // Zero rows: lost the swap, or the order never existed. Tell them
        // apart so an unresolvable order fails loudly upstream.
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("orders.transition", e))?;
        if exists { Ok(false) } else { Err(StoreError::NotFound) }
    }

    #[instrument(skip(self, payment), fields(order_id = %payment.order_id))]
    async fn upsert_payment(&self, payment: &PaymentRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payments
                (order_id, provider, provider_payment_id, status, raw_result, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (order_id) DO UPDATE
            SET provider = EXCLUDED.provider,
                provider_payment_id = EXCLUDED.provider_payment_id,
                status = EXCLUDED.status,
                raw_result = EXCLUDED.raw_result,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(payment.order_id.as_uuid())
        .bind(payment.provider.as_str())
        .bind(payment.provider_payment_id.as_deref())
        .bind(payment.status.as_str())
        .bind(&payment.raw_result)
        .bind(payment.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("payments.upsert", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_payment(&self, order_id: OrderId) -> Result<PaymentRecord, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT order_id, provider, provider_payment_id, status, raw_result, updated_at
              FROM payments WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("payments.get", e))?
        .ok_or(StoreError::NotFound)?;

        let invalid = |e: sqlx::Error| StoreError::Invalid(e.to_string());
        let provider: String = row.try_get("provider").map_err(invalid)?;
        let status: String = row.try_get("status").map_err(invalid)?;

        Ok(PaymentRecord {
            order_id,
            provider: provider
                .parse::<PaymentProvider>()
                .map_err(|e| StoreError::Invalid(e.to_string()))?,
            provider_payment_id: row.try_get("provider_payment_id").map_err(invalid)?,
            status: status
                .parse()
                .map_err(|e: stockwell_core::DomainError| StoreError::Invalid(e.to_string()))?,
            raw_result: row.try_get("raw_result").map_err(invalid)?,
            updated_at: row.try_get("updated_at").map_err(invalid)?,
        })
    }
}

#[derive(Clone)]
pub struct PostgresPromotionStore {
    pool: Arc<PgPool>,
}

impl PostgresPromotionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    fn promotion_from_row(row: &sqlx::postgres::PgRow) -> Result<Promotion, StoreError> {
        let invalid = |e: sqlx::Error| StoreError::Invalid(e.to_string());
        Ok(Promotion {
            id: PromotionId::from_uuid(row.try_get("id").map_err(invalid)?),
            coupon_code: row.try_get("coupon_code").map_err(invalid)?,
            discount: Money::from_minor(row.try_get("discount").map_err(invalid)?),
            starts_at: row.try_get("starts_at").map_err(invalid)?,
            ends_at: row.try_get("ends_at").map_err(invalid)?,
            usage_limit: row
                .try_get::<Option<i64>, _>("usage_limit")
                .map_err(invalid)?
                .map(|n| n as u64),
            one_time_use: row.try_get("one_time_use").map_err(invalid)?,
            active: row.try_get("active").map_err(invalid)?,
        })
    }
}

#[async_trait]
impl PromotionStore for PostgresPromotionStore {
    #[instrument(skip(self, promotion), fields(promotion_id = %promotion.id))]
    async fn put_promotion(&self, promotion: Promotion) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO promotions
                (id, coupon_code, discount, starts_at, ends_at, usage_limit,
                 one_time_use, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET coupon_code = EXCLUDED.coupon_code,
                discount = EXCLUDED.discount,
                starts_at = EXCLUDED.starts_at,
                ends_at = EXCLUDED.ends_at,
                usage_limit = EXCLUDED.usage_limit,
                one_time_use = EXCLUDED.one_time_use,
                active = EXCLUDED.active
            "#,
        )
        .bind(promotion.id.as_uuid())
        .bind(&promotion.coupon_code)
        .bind(promotion.discount.minor_units())
        .bind(promotion.starts_at)
        .bind(promotion.ends_at)
        .bind(promotion.usage_limit.map(|n| n as i64))
        .bind(promotion.one_time_use)
        .bind(promotion.active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("promotions.put", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(promotion_id = %id))]
    async fn get_promotion(&self, id: PromotionId) -> Result<Option<Promotion>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, coupon_code, discount, starts_at, ends_at, usage_limit,
                   one_time_use, active
              FROM promotions WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("promotions.get", e))?;
        row.as_ref().map(Self::promotion_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_code(&self, coupon_code: &str) -> Result<Option<Promotion>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, coupon_code, discount, starts_at, ends_at, usage_limit,
                   one_time_use, active
              FROM promotions WHERE coupon_code = $1
            "#,
        )
        .bind(coupon_code)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("promotions.find_by_code", e))?;
        row.as_ref().map(Self::promotion_from_row).transpose()
    }

    #[instrument(skip(self), fields(promotion_id = %promotion_id))]
    async fn usage_count(&self, promotion_id: PromotionId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM promotion_usages WHERE promotion_id = $1",
        )
        .bind(promotion_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("promotions.usage_count", e))?;
        Ok(count as u64)
    }

    #[instrument(skip(self, email))]
    async fn identity_has_usage(
        &self,
        coupon_code: &str,
        user_id: Option<UserId>,
        email: Option<&CanonicalEmail>,
    ) -> Result<bool, StoreError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM promotion_usages
                 WHERE coupon_code = $1 AND (user_id = $2 OR email = $3)
            )
            "#,
        )
        .bind(coupon_code)
        .bind(user_id.map(|id| *id.as_uuid()))
        .bind(email.map(|e| e.as_str()))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("promotions.identity_has_usage", e))
    }

    #[instrument(skip(self, record), fields(order_id = %record.order_id))]
    async fn record_usage(
        &self,
        record: &PromotionUsageRecord,
        one_time_use: bool,
    ) -> Result<bool, StoreError> {
        // One-time-use promotions claim unique keys per user row and per
        // canonical email; the constraint is the race arbiter, so a lost
        // insert comes back as zero rows, not an error.
        let user_claim = one_time_use
            .then(|| format!("{}:{}", record.coupon_code, record.user_id));
        let email_claim = one_time_use
            .then(|| {
                record
                    .email
                    .as_ref()
                    .map(|e| format!("{}:{}", record.coupon_code, e))
            })
            .flatten();

        let result = sqlx::query(
            r#"
            INSERT INTO promotion_usages
                (id, promotion_id, user_id, email, coupon_code, order_id,
                 discount_amount, created_at, user_claim, email_claim)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(record.promotion_id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(record.email.as_ref().map(|e| e.as_str()))
        .bind(&record.coupon_code)
        .bind(record.order_id.as_uuid())
        .bind(record.discount_amount.minor_units())
        .bind(record.created_at)
        .bind(user_claim)
        .bind(email_claim)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("promotions.record_usage", e))?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(Clone)]
pub struct PostgresIdentityStore {
    pool: Arc<PgPool>,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    #[instrument(skip(self, email))]
    async fn resolve_user_by_email(&self, email: &CanonicalEmail) -> Result<UserId, StoreError> {
        // Upsert-returning resolves both racing guests to the same row; the
        // no-op DO UPDATE makes RETURNING yield the existing id.
        let id: uuid::Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO users (id, email, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING id
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(email.as_str())
        .bind(Utc::now())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("users.resolve_by_email", e))?;
        Ok(UserId::from_uuid(id))
    }
}

#[derive(Clone)]
pub struct PostgresWebhookEventLog {
    pool: Arc<PgPool>,
}

impl PostgresWebhookEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl WebhookEventLog for PostgresWebhookEventLog {
    #[instrument(skip(self))]
    async fn seen(&self, provider: PaymentProvider, event_id: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM webhook_events WHERE provider = $1 AND event_id = $2)",
        )
        .bind(provider.as_str())
        .bind(event_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("webhook_events.seen", e))
    }

    #[instrument(skip(self))]
    async fn record(
        &self,
        provider: PaymentProvider,
        event_id: &str,
        received_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (provider, event_id, received_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, event_id) DO NOTHING
            "#,
        )
        .bind(provider.as_str())
        .bind(event_id)
        .bind(received_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("webhook_events.record", e))?;
        Ok(result.rows_affected() == 1)
    }
}
