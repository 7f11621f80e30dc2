//! In-memory store implementations for dev and tests.
//!
//! Each store serializes its mutations behind a `Mutex`, which stands in for
//! the row-level atomicity the Postgres backend gets from conditional
//! updates. The lock is released before any await point — these are
//! process-local structures, not coordination primitives.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockwell_core::{InventoryId, OrderId, PaymentProvider, PromotionId, UserId};
use stockwell_inventory::{CommitReceipt, InventoryRecord};
use stockwell_orders::{Order, OrderStatus, PaymentRecord};
use stockwell_promotions::{CanonicalEmail, Promotion, PromotionUsageRecord};

use super::{
    IdentityStore, OrderStore, PromotionStore, ReserveError, StockStore, StoreError,
    WebhookEventLog,
};

#[derive(Default)]
pub struct InMemoryStockStore {
    rows: Mutex<HashMap<InventoryId, InventoryRecord>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn put(&self, record: InventoryRecord) -> Result<(), StoreError> {
        self.rows.lock().unwrap().insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: InventoryId) -> Result<InventoryRecord, StoreError> {
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_sku(&self, sku: &str) -> Result<InventoryRecord, StoreError> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .find(|r| r.sku.as_str() == sku)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn reserve(&self, id: InventoryId, qty: i64) -> Result<(), ReserveError> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        record.level = record.level.reserve(qty)?;
        Ok(())
    }

    async fn release(&self, id: InventoryId, qty: i64) -> Result<i64, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        let (level, released) = record.level.release(qty);
        record.level = level;
        Ok(released)
    }

    async fn commit(&self, id: InventoryId, qty: i64) -> Result<CommitReceipt, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        let (level, receipt) = record.level.commit(qty);
        record.level = level;
        Ok(receipt)
    }
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<OrderId, Order>>,
    payments: Mutex<HashMap<OrderId, PaymentRecord>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: &Order, payment: &PaymentRecord) -> Result<(), StoreError> {
        let mut orders = self.orders.lock().unwrap();
        if orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id)));
        }
        orders.insert(order.id, order.clone());
        self.payments
            .lock()
            .unwrap()
            .insert(payment.order_id, payment.clone());
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Order, StoreError> {
        self.orders
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, StoreError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound)?;
        if order.status != from {
            return Ok(false);
        }
        order.status = to;
        Ok(true)
    }

    async fn upsert_payment(&self, payment: &PaymentRecord) -> Result<(), StoreError> {
        self.payments
            .lock()
            .unwrap()
            .insert(payment.order_id, payment.clone());
        Ok(())
    }

    async fn get_payment(&self, order_id: OrderId) -> Result<PaymentRecord, StoreError> {
        self.payments
            .lock()
            .unwrap()
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[derive(Default)]
struct PromotionState {
    promotions: HashMap<PromotionId, Promotion>,
    usages: Vec<PromotionUsageRecord>,
    user_claims: HashSet<(String, UserId)>,
    email_claims: HashSet<(String, CanonicalEmail)>,
}

#[derive(Default)]
pub struct InMemoryPromotionStore {
    state: Mutex<PromotionState>,
}

impl InMemoryPromotionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromotionStore for InMemoryPromotionStore {
    async fn put_promotion(&self, promotion: Promotion) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .promotions
            .insert(promotion.id, promotion);
        Ok(())
    }

    async fn get_promotion(&self, id: PromotionId) -> Result<Option<Promotion>, StoreError> {
        Ok(self.state.lock().unwrap().promotions.get(&id).cloned())
    }

    async fn find_by_code(&self, coupon_code: &str) -> Result<Option<Promotion>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .promotions
            .values()
            .find(|p| p.coupon_code == coupon_code)
            .cloned())
    }

    async fn usage_count(&self, promotion_id: PromotionId) -> Result<u64, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .usages
            .iter()
            .filter(|u| u.promotion_id == promotion_id)
            .count() as u64)
    }

    async fn identity_has_usage(
        &self,
        coupon_code: &str,
        user_id: Option<UserId>,
        email: Option<&CanonicalEmail>,
    ) -> Result<bool, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.usages.iter().any(|u| {
            u.coupon_code == coupon_code
                && (user_id.is_some_and(|id| u.user_id == id)
                    || email.is_some_and(|e| u.email.as_ref() == Some(e)))
        }))
    }

    async fn record_usage(
        &self,
        record: &PromotionUsageRecord,
        one_time_use: bool,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        if one_time_use {
            let user_key = (record.coupon_code.clone(), record.user_id);
            if state.user_claims.contains(&user_key) {
                return Ok(false);
            }
            if let Some(email) = &record.email {
                let email_key = (record.coupon_code.clone(), email.clone());
                if state.email_claims.contains(&email_key) {
                    return Ok(false);
                }
                state.email_claims.insert(email_key);
            }
            state.user_claims.insert(user_key);
        }
        state.usages.push(record.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryIdentityStore {
    users: Mutex<HashMap<CanonicalEmail, UserId>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a user row (simulates an existing registered customer).
    pub fn insert_user(&self, email: CanonicalEmail, user_id: UserId) {
        self.users.lock().unwrap().insert(email, user_id);
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn resolve_user_by_email(&self, email: &CanonicalEmail) -> Result<UserId, StoreError> {
        let mut users = self.users.lock().unwrap();
        Ok(*users.entry(email.clone()).or_insert_with(UserId::new))
    }
}

#[derive(Default)]
pub struct InMemoryWebhookEventLog {
    seen: Mutex<HashSet<(PaymentProvider, String)>>,
}

impl InMemoryWebhookEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookEventLog for InMemoryWebhookEventLog {
    async fn seen(&self, provider: PaymentProvider, event_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .seen
            .lock()
            .unwrap()
            .contains(&(provider, event_id.to_string())))
    }

    async fn record(
        &self,
        provider: PaymentProvider,
        event_id: &str,
        _received_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .seen
            .lock()
            .unwrap()
            .insert((provider, event_id.to_string())))
    }
}
