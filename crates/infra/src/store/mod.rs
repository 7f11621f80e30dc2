//! Storage abstractions for the reservation subsystem.
//!
//! Two backends implement these traits: an in-memory one (dev/tests) and a
//! Postgres one (production). The contract every implementation must honor:
//! each mutation is a **single atomic conditional update** — the check and
//! the write happen in one statement-equivalent step, because the service
//! runs as multiple stateless instances with no shared memory.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stockwell_core::{InventoryId, OrderId, PaymentProvider, PromotionId, UserId};
use stockwell_inventory::{CommitReceipt, InsufficientStock, InventoryRecord};
use stockwell_orders::{Order, OrderStatus, PaymentRecord};
use stockwell_promotions::{CanonicalEmail, Promotion, PromotionUsageRecord};

pub use in_memory::{
    InMemoryIdentityStore, InMemoryOrderStore, InMemoryPromotionStore, InMemoryStockStore,
    InMemoryWebhookEventLog,
};
pub use postgres::{
    PostgresIdentityStore, PostgresOrderStore, PostgresPromotionStore, PostgresStockStore,
    PostgresWebhookEventLog,
};

/// Infrastructure-level store failure.
///
/// `Unavailable` marks transient failures (connection, timeout): the caller
/// may retry, and every mutation behind these traits is an idempotent
/// conditional update, so retrying is safe.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid stored data: {0}")]
    Invalid(String),
}

/// Reservation failure: either the stock check lost, or the store did.
#[derive(Debug, Error)]
pub enum ReserveError {
    #[error(transparent)]
    Insufficient(#[from] InsufficientStock),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The stock ledger: the only writer of on-hand/reserved counters.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Insert or replace an inventory row (seeding, admin adjustments).
    async fn put(&self, record: InventoryRecord) -> Result<(), StoreError>;

    async fn get(&self, id: InventoryId) -> Result<InventoryRecord, StoreError>;

    async fn get_by_sku(&self, sku: &str) -> Result<InventoryRecord, StoreError>;

    /// Atomically check `quantity - reserved >= qty` and increment `reserved`.
    async fn reserve(&self, id: InventoryId, qty: i64) -> Result<(), ReserveError>;

    /// Decrement `reserved` by `min(qty, reserved)`; returns the amount
    /// actually released.
    async fn release(&self, id: InventoryId, qty: i64) -> Result<i64, StoreError>;

    /// Decrement both `quantity` and `reserved` by `min(qty, reserved)`.
    async fn commit(&self, id: InventoryId, qty: i64) -> Result<CommitReceipt, StoreError>;
}

/// Orders plus their one-to-one payment records.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order (with items) and its initial payment record.
    async fn create(&self, order: &Order, payment: &PaymentRecord) -> Result<(), StoreError>;

    async fn get(&self, id: OrderId) -> Result<Order, StoreError>;

    /// Compare-and-swap the status: `UPDATE .. WHERE id = ? AND status = from`.
    ///
    /// `Ok(false)` means zero rows matched — someone else already moved the
    /// order, and the caller must treat the operation as already done.
    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, StoreError>;

    /// Upsert keyed by `order_id`: idempotent overwrite, never a duplicate.
    async fn upsert_payment(&self, payment: &PaymentRecord) -> Result<(), StoreError>;

    async fn get_payment(&self, order_id: OrderId) -> Result<PaymentRecord, StoreError>;
}

/// Promotion definitions and their usage ledger.
#[async_trait]
pub trait PromotionStore: Send + Sync {
    async fn put_promotion(&self, promotion: Promotion) -> Result<(), StoreError>;

    async fn get_promotion(&self, id: PromotionId) -> Result<Option<Promotion>, StoreError>;

    async fn find_by_code(&self, coupon_code: &str) -> Result<Option<Promotion>, StoreError>;

    /// Total redemptions of a promotion across all identities.
    async fn usage_count(&self, promotion_id: PromotionId) -> Result<u64, StoreError>;

    /// Whether this identity already redeemed the coupon, matched by user
    /// row **or** canonical email (a returning guest may sit behind a
    /// different generated user row).
    async fn identity_has_usage(
        &self,
        coupon_code: &str,
        user_id: Option<UserId>,
        email: Option<&CanonicalEmail>,
    ) -> Result<bool, StoreError>;

    /// Persist a redemption. For one-time-use promotions the store's unique
    /// claims are the authoritative race guard: `Ok(false)` means another
    /// checkout won, and the caller must soft-fail the discount.
    async fn record_usage(
        &self,
        record: &PromotionUsageRecord,
        one_time_use: bool,
    ) -> Result<bool, StoreError>;
}

/// User rows, as far as this subsystem cares: guest email reconciliation.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Find the user row for a canonical email, creating a placeholder row
    /// if none exists. Two simultaneous guest checkouts with the same email
    /// must resolve to the same row (unique email constraint is the
    /// backstop).
    async fn resolve_user_by_email(&self, email: &CanonicalEmail) -> Result<UserId, StoreError>;
}

/// Append-only log of processed provider events, the replay guard.
#[async_trait]
pub trait WebhookEventLog: Send + Sync {
    async fn seen(&self, provider: PaymentProvider, event_id: &str) -> Result<bool, StoreError>;

    /// Record a processed event. `Ok(false)` if it was already there.
    ///
    /// Written only **after** processing completes, so a crash mid-way
    /// causes a safe retry instead of silent loss.
    async fn record(
        &self,
        provider: PaymentProvider,
        event_id: &str,
        received_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
