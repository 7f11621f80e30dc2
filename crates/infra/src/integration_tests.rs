//! Integration tests for the full reservation/reconciliation pipeline on
//! in-memory backends.
//!
//! Covers: checkout → reservation → webhook settlement, replay idempotency,
//! all-or-nothing reservation, one-time-use promotions across guest and
//! registered identities, amount validation, and the repair escape hatch.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use stockwell_core::{InventoryId, Money, OrderId, PaymentProvider, PromotionId, UserId};
use stockwell_inventory::{InventoryRecord, Sku};
use stockwell_orders::{Order, OrderStatus, PaymentRecord, PaymentStatus};
use stockwell_promotions::{CanonicalEmail, CheckoutIdentity, Promotion, PromotionError};
use stockwell_webhooks::{PaymentEvent, PaymentOutcome};

use crate::checkout::{CheckoutCoordinator, CheckoutError, CheckoutItem, CheckoutRequest};
use crate::notify::LogNotifier;
use crate::promotion_ledger::PromotionUsageLedger;
use crate::reconciler::{ReconcileError, ReconcileOutcome, WebhookReconciler};
use crate::repair::{RepairError, StockRepair};
use crate::reservation::ReservationManager;
use crate::store::{
    IdentityStore, InMemoryIdentityStore, InMemoryOrderStore, InMemoryPromotionStore,
    InMemoryStockStore, InMemoryWebhookEventLog, OrderStore, PromotionStore, StockStore,
    StoreError,
};

struct TestEnv {
    stock: Arc<InMemoryStockStore>,
    orders: Arc<InMemoryOrderStore>,
    promotions: Arc<InMemoryPromotionStore>,
    identities: Arc<InMemoryIdentityStore>,
    coordinator: CheckoutCoordinator,
    reconciler: WebhookReconciler,
    repair: StockRepair,
}

fn setup() -> TestEnv {
    let stock = Arc::new(InMemoryStockStore::new());
    let orders = Arc::new(InMemoryOrderStore::new());
    let promotions = Arc::new(InMemoryPromotionStore::new());
    let identities = Arc::new(InMemoryIdentityStore::new());
    let event_log = Arc::new(InMemoryWebhookEventLog::new());

    let reservations = ReservationManager::new(stock.clone());
    let ledger = PromotionUsageLedger::new(promotions.clone());

    let coordinator = CheckoutCoordinator::new(
        orders.clone(),
        identities.clone(),
        reservations.clone(),
        ledger.clone(),
    );
    let reconciler = WebhookReconciler::new(
        orders.clone(),
        reservations.clone(),
        ledger,
        event_log,
        Arc::new(LogNotifier),
    );
    let repair = StockRepair::new(orders.clone(), stock.clone());

    TestEnv {
        stock,
        orders,
        promotions,
        identities,
        coordinator,
        reconciler,
        repair,
    }
}

async fn seed_stock(env: &TestEnv, quantity: i64) -> InventoryId {
    let id = InventoryId::new();
    env.stock
        .put(InventoryRecord::new(id, Sku::new(format!("SKU-{id}")).unwrap(), quantity).unwrap())
        .await
        .unwrap();
    id
}

async fn seed_welcome10(env: &TestEnv) -> PromotionId {
    let now = Utc::now();
    let promotion = Promotion {
        id: PromotionId::new(),
        coupon_code: "WELCOME10".to_string(),
        discount: Money::from_minor(1000),
        starts_at: now - Duration::days(1),
        ends_at: Some(now + Duration::days(30)),
        usage_limit: None,
        one_time_use: true,
        active: true,
    };
    let id = promotion.id;
    env.promotions.put_promotion(promotion).await.unwrap();
    id
}

fn request(
    items: Vec<(InventoryId, i64, i64)>,
    identity: CheckoutIdentity,
    coupon_code: Option<&str>,
) -> CheckoutRequest {
    CheckoutRequest {
        items: items
            .into_iter()
            .map(|(inventory_id, quantity, unit_price)| CheckoutItem {
                inventory_id,
                quantity,
                unit_price: Money::from_minor(unit_price),
            })
            .collect(),
        identity,
        coupon_code: coupon_code.map(str::to_string),
        provider: PaymentProvider::Stripe,
    }
}

fn registered() -> CheckoutIdentity {
    CheckoutIdentity::Registered { user_id: UserId::new() }
}

fn event(
    order_id: OrderId,
    outcome: PaymentOutcome,
    amount: i64,
    event_id: &str,
) -> PaymentEvent {
    PaymentEvent {
        provider: PaymentProvider::Stripe,
        outcome,
        order_id,
        provider_event_id: event_id.to_string(),
        provider_payment_id: Some("pi_test".to_string()),
        amount: Money::from_minor(amount),
        raw: serde_json::json!({ "id": event_id }),
    }
}

#[tokio::test]
async fn reserving_to_capacity_then_rejecting() {
    let env = setup();
    let inventory_id = seed_stock(&env, 10).await;

    env.coordinator
        .checkout(request(vec![(inventory_id, 10, 100)], registered(), None), Utc::now())
        .await
        .unwrap();

    let level = env.stock.get(inventory_id).await.unwrap().level;
    assert_eq!(level.reserved(), 10);

    let err = env
        .coordinator
        .checkout(request(vec![(inventory_id, 1, 100)], registered(), None), Utc::now())
        .await
        .unwrap_err();
    match err {
        CheckoutError::InsufficientStock { requested, available, .. } => {
            assert_eq!(requested, 1);
            assert_eq!(available, 0);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
}

#[tokio::test]
async fn successful_webhook_commits_exactly_once_under_replay() {
    let env = setup();
    let inventory_id = seed_stock(&env, 10).await;

    let receipt = env
        .coordinator
        .checkout(request(vec![(inventory_id, 2, 100)], registered(), None), Utc::now())
        .await
        .unwrap();
    assert_eq!(env.stock.get(inventory_id).await.unwrap().level.reserved(), 2);

    let evt = event(receipt.order_id, PaymentOutcome::Succeeded, 200, "evt_1");

    let outcome = env.reconciler.process(&evt, Utc::now()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Processed);

    // Same delivery replayed.
    let outcome = env.reconciler.process(&evt, Utc::now()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Duplicate);

    // Same real-world payment under a fresh delivery id.
    let evt2 = event(receipt.order_id, PaymentOutcome::Succeeded, 200, "evt_2");
    let outcome = env.reconciler.process(&evt2, Utc::now()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::AlreadySettled);

    let level = env.stock.get(inventory_id).await.unwrap().level;
    assert_eq!(level.quantity(), 8, "quantity decrements exactly once");
    assert_eq!(level.reserved(), 0, "reservation fully consumed, never negative");

    let order = env.orders.get(receipt.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Processing);

    let payment = env.orders.get_payment(receipt.order_id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.provider_payment_id.as_deref(), Some("pi_test"));
}

#[tokio::test]
async fn failed_webhook_cancels_and_releases() {
    let env = setup();
    let inventory_id = seed_stock(&env, 10).await;

    let receipt = env
        .coordinator
        .checkout(request(vec![(inventory_id, 3, 100)], registered(), None), Utc::now())
        .await
        .unwrap();

    let evt = event(receipt.order_id, PaymentOutcome::Failed, 300, "evt_fail");
    let outcome = env.reconciler.process(&evt, Utc::now()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Processed);

    let order = env.orders.get(receipt.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    let level = env.stock.get(inventory_id).await.unwrap().level;
    assert_eq!(level.quantity(), 10, "failed payment never touches on-hand stock");
    assert_eq!(level.reserved(), 0, "reservation returned to the pool");

    let payment = env.orders.get_payment(receipt.order_id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    // A replayed failure is absorbed.
    let evt2 = event(receipt.order_id, PaymentOutcome::Failed, 300, "evt_fail_2");
    let outcome = env.reconciler.process(&evt2, Utc::now()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::AlreadySettled);
    assert_eq!(env.stock.get(inventory_id).await.unwrap().level.reserved(), 0);
}

#[tokio::test]
async fn reservation_is_all_or_nothing_across_items() {
    let env = setup();
    let plentiful = seed_stock(&env, 10).await;
    let scarce = seed_stock(&env, 1).await;

    let err = env
        .coordinator
        .checkout(
            request(vec![(plentiful, 2, 100), (scarce, 2, 100)], registered(), None),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InsufficientStock { .. }));

    // The first item's reservation was rolled back.
    assert_eq!(env.stock.get(plentiful).await.unwrap().level.reserved(), 0);
    assert_eq!(env.stock.get(scarce).await.unwrap().level.reserved(), 0);
}

#[tokio::test]
async fn guest_coupon_reuse_is_rejected_across_signup() {
    let env = setup();
    let inventory_id = seed_stock(&env, 10).await;
    seed_welcome10(&env).await;

    // Guest checks out with the coupon and the payment captures.
    let guest = CheckoutIdentity::guest("A@X.com ").unwrap();
    let receipt = env
        .coordinator
        .checkout(
            request(vec![(inventory_id, 1, 5000)], guest, Some("WELCOME10")),
            Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(receipt.discount, Money::from_minor(1000));
    assert_eq!(receipt.total, Money::from_minor(4000));

    let evt = event(receipt.order_id, PaymentOutcome::Succeeded, 4000, "evt_g1");
    env.reconciler.process(&evt, Utc::now()).await.unwrap();

    // The guest signs up: the account attaches to the placeholder row.
    let email = CanonicalEmail::new("a@x.com").unwrap();
    let user_id = env.identities.resolve_user_by_email(&email).await.unwrap();

    let err = env
        .coordinator
        .checkout(
            request(
                vec![(inventory_id, 1, 5000)],
                CheckoutIdentity::Registered { user_id },
                Some("WELCOME10"),
            ),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Promotion(PromotionError::AlreadyUsed)));

    // A second guest checkout under the same email is equally rejected,
    // even though it would resolve to the same row anyway.
    let err = env
        .coordinator
        .checkout(
            request(
                vec![(inventory_id, 1, 5000)],
                CheckoutIdentity::guest("a@x.com").unwrap(),
                Some("WELCOME10"),
            ),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Promotion(PromotionError::AlreadyUsed)));
}

#[tokio::test]
async fn amount_mismatch_rejects_and_leaves_order_pending() {
    let env = setup();
    let inventory_id = seed_stock(&env, 10).await;

    let receipt = env
        .coordinator
        .checkout(request(vec![(inventory_id, 2, 3999)], registered(), None), Utc::now())
        .await
        .unwrap();
    assert_eq!(receipt.total, Money::from_minor(7998));

    // Two minor units off: outside tolerance.
    let evt = event(receipt.order_id, PaymentOutcome::Succeeded, 7996, "evt_bad");
    let err = env.reconciler.process(&evt, Utc::now()).await.unwrap_err();
    assert!(matches!(err, ReconcileError::AmountMismatch { .. }));

    let order = env.orders.get(receipt.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(env.stock.get(inventory_id).await.unwrap().level.reserved(), 2);

    // The rejected delivery was not logged; a corrected capture still lands.
    let evt = event(receipt.order_id, PaymentOutcome::Succeeded, 7997, "evt_good");
    let outcome = env.reconciler.process(&evt, Utc::now()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Processed, "one minor unit is within tolerance");
}

#[tokio::test]
async fn concurrent_checkouts_finalize_one_usage_record() {
    let env = setup();
    let inventory_id = seed_stock(&env, 10).await;
    let promotion_id = seed_welcome10(&env).await;

    let user = registered();

    // Both checkouts pass validation before either payment captures.
    let first = env
        .coordinator
        .checkout(
            request(vec![(inventory_id, 1, 5000)], user.clone(), Some("WELCOME10")),
            Utc::now(),
        )
        .await
        .unwrap();
    let second = env
        .coordinator
        .checkout(
            request(vec![(inventory_id, 1, 5000)], user, Some("WELCOME10")),
            Utc::now(),
        )
        .await
        .unwrap();

    let evt = event(first.order_id, PaymentOutcome::Succeeded, 4000, "evt_c1");
    assert_eq!(
        env.reconciler.process(&evt, Utc::now()).await.unwrap(),
        ReconcileOutcome::Processed
    );

    // The second capture completes too — the payment is already taken — but
    // its usage record loses the uniqueness re-check.
    let evt = event(second.order_id, PaymentOutcome::Succeeded, 4000, "evt_c2");
    assert_eq!(
        env.reconciler.process(&evt, Utc::now()).await.unwrap(),
        ReconcileOutcome::Processed
    );

    assert_eq!(env.promotions.usage_count(promotion_id).await.unwrap(), 1);
    assert_eq!(
        env.orders.get(second.order_id).await.unwrap().status,
        OrderStatus::Processing
    );
}

#[tokio::test]
async fn unknown_order_fails_loudly() {
    let env = setup();
    let evt = event(OrderId::new(), PaymentOutcome::Succeeded, 100, "evt_orphan");
    let err = env.reconciler.process(&evt, Utc::now()).await.unwrap_err();
    assert!(matches!(err, ReconcileError::UnresolvableOrder(_)));
}

#[tokio::test]
async fn repair_releases_stranded_reservation() {
    let env = setup();
    let inventory_id = seed_stock(&env, 10).await;

    let receipt = env
        .coordinator
        .checkout(request(vec![(inventory_id, 4, 100)], registered(), None), Utc::now())
        .await
        .unwrap();

    // Simulate a crash after the status swap but before the commit: the
    // order looks settled, the reservation is stranded.
    assert!(
        env.orders
            .transition(receipt.order_id, OrderStatus::Pending, OrderStatus::Processing)
            .await
            .unwrap()
    );
    assert_eq!(env.stock.get(inventory_id).await.unwrap().level.reserved(), 4);

    let report = env.repair.repair_order(receipt.order_id).await.unwrap();
    assert_eq!(report.corrections.len(), 1);
    assert_eq!(report.corrections[0].released, 4);
    assert_eq!(env.stock.get(inventory_id).await.unwrap().level.reserved(), 0);

    // Second run finds nothing left to correct.
    let report = env.repair.repair_order(receipt.order_id).await.unwrap();
    assert_eq!(report.corrections[0].released, 0);
}

#[tokio::test]
async fn repair_refuses_pending_orders() {
    let env = setup();
    let inventory_id = seed_stock(&env, 10).await;

    let receipt = env
        .coordinator
        .checkout(request(vec![(inventory_id, 1, 100)], registered(), None), Utc::now())
        .await
        .unwrap();

    let err = env.repair.repair_order(receipt.order_id).await.unwrap_err();
    assert!(matches!(err, RepairError::OrderStillPending(_)));

    assert!(matches!(
        env.repair.repair_order(OrderId::new()).await.unwrap_err(),
        RepairError::NotFound
    ));
}

#[tokio::test]
async fn commit_after_out_of_band_release_is_clamped() {
    let env = setup();
    let inventory_id = seed_stock(&env, 10).await;

    let receipt = env
        .coordinator
        .checkout(request(vec![(inventory_id, 3, 100)], registered(), None), Utc::now())
        .await
        .unwrap();

    // Someone manually zeroed part of the reservation before the webhook.
    env.stock.release(inventory_id, 2).await.unwrap();

    let evt = event(receipt.order_id, PaymentOutcome::Succeeded, 300, "evt_clamp");
    env.reconciler.process(&evt, Utc::now()).await.unwrap();

    let level = env.stock.get(inventory_id).await.unwrap().level;
    // Only the surviving reserved unit was committed; the shortfall is
    // logged, not silently decremented from on-hand stock.
    assert_eq!(level.quantity(), 9);
    assert_eq!(level.reserved(), 0);
}

/// Order store whose `create` always fails, for the compensation path.
struct FailingOrderStore;

#[async_trait]
impl OrderStore for FailingOrderStore {
    async fn create(&self, _order: &Order, _payment: &PaymentRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection reset".to_string()))
    }

    async fn get(&self, _id: OrderId) -> Result<Order, StoreError> {
        Err(StoreError::NotFound)
    }

    async fn transition(
        &self,
        _id: OrderId,
        _from: OrderStatus,
        _to: OrderStatus,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection reset".to_string()))
    }

    async fn upsert_payment(&self, _payment: &PaymentRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection reset".to_string()))
    }

    async fn get_payment(&self, _order_id: OrderId) -> Result<PaymentRecord, StoreError> {
        Err(StoreError::NotFound)
    }
}

#[tokio::test]
async fn failed_order_persistence_releases_the_reservation() {
    let stock = Arc::new(InMemoryStockStore::new());
    let promotions = Arc::new(InMemoryPromotionStore::new());
    let identities = Arc::new(InMemoryIdentityStore::new());

    let inventory_id = InventoryId::new();
    stock
        .put(InventoryRecord::new(inventory_id, Sku::new("SKU-X").unwrap(), 5).unwrap())
        .await
        .unwrap();

    let coordinator = CheckoutCoordinator::new(
        Arc::new(FailingOrderStore),
        identities,
        ReservationManager::new(stock.clone()),
        PromotionUsageLedger::new(promotions),
    );

    let err = coordinator
        .checkout(request(vec![(inventory_id, 2, 100)], registered(), None), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Store(StoreError::Unavailable(_))));

    // Compensation gave the stock back.
    assert_eq!(stock.get(inventory_id).await.unwrap().level.reserved(), 0);
}
