use std::sync::Arc;

use stockwell_infra::store::{
    IdentityStore, InMemoryIdentityStore, InMemoryOrderStore, InMemoryPromotionStore,
    InMemoryStockStore, InMemoryWebhookEventLog, OrderStore, PostgresIdentityStore,
    PostgresOrderStore, PostgresPromotionStore, PostgresStockStore, PostgresWebhookEventLog,
    PromotionStore, StockStore, WebhookEventLog,
};
use stockwell_infra::{
    CheckoutCoordinator, LogNotifier, PromotionUsageLedger, ReservationManager, StockRepair,
    WebhookReconciler,
};
use stockwell_webhooks::{CodAdapter, PaypalAdapter, StripeAdapter};

/// Boundary configuration, read from the environment by `main.rs` and
/// constructed directly by tests.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub admin_token: String,
    pub stripe_webhook_secret: String,
    pub paypal_webhook_token: String,
}

/// Everything the handlers need, wired once at startup.
pub struct AppServices {
    pub stock: Arc<dyn StockStore>,
    pub orders: Arc<dyn OrderStore>,
    pub promotions: Arc<dyn PromotionStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub coordinator: CheckoutCoordinator,
    pub reconciler: WebhookReconciler,
    pub repair: StockRepair,
    pub promotion_ledger: PromotionUsageLedger,
    pub stripe: StripeAdapter,
    pub paypal: PaypalAdapter,
    pub cod: CodAdapter,
}

/// Pick the backend from the environment: in-memory by default (dev/tests),
/// Postgres when `USE_PERSISTENT_STORES=true`.
pub async fn build_services(config: ApiConfig) -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        build_persistent_services(config).await
    } else {
        build_in_memory_services(config)
    }
}

fn build_in_memory_services(config: ApiConfig) -> AppServices {
    let stock: Arc<dyn StockStore> = Arc::new(InMemoryStockStore::new());
    let orders: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
    let promotions: Arc<dyn PromotionStore> = Arc::new(InMemoryPromotionStore::new());
    let identities: Arc<dyn IdentityStore> = Arc::new(InMemoryIdentityStore::new());
    let event_log: Arc<dyn WebhookEventLog> = Arc::new(InMemoryWebhookEventLog::new());

    assemble(config, stock, orders, promotions, identities, event_log)
}

async fn build_persistent_services(config: ApiConfig) -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = sqlx::PgPool::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    let stock: Arc<dyn StockStore> = Arc::new(PostgresStockStore::new(pool.clone()));
    let orders: Arc<dyn OrderStore> = Arc::new(PostgresOrderStore::new(pool.clone()));
    let promotions: Arc<dyn PromotionStore> = Arc::new(PostgresPromotionStore::new(pool.clone()));
    let identities: Arc<dyn IdentityStore> = Arc::new(PostgresIdentityStore::new(pool.clone()));
    let event_log: Arc<dyn WebhookEventLog> = Arc::new(PostgresWebhookEventLog::new(pool));

    assemble(config, stock, orders, promotions, identities, event_log)
}

fn assemble(
    config: ApiConfig,
    stock: Arc<dyn StockStore>,
    orders: Arc<dyn OrderStore>,
    promotions: Arc<dyn PromotionStore>,
    identities: Arc<dyn IdentityStore>,
    event_log: Arc<dyn WebhookEventLog>,
) -> AppServices {
    let reservations = ReservationManager::new(stock.clone());
    let promotion_ledger = PromotionUsageLedger::new(promotions.clone());

    let coordinator = CheckoutCoordinator::new(
        orders.clone(),
        identities.clone(),
        reservations.clone(),
        promotion_ledger.clone(),
    );
    let reconciler = WebhookReconciler::new(
        orders.clone(),
        reservations.clone(),
        promotion_ledger.clone(),
        event_log,
        Arc::new(LogNotifier),
    );
    let repair = StockRepair::new(orders.clone(), stock.clone());

    AppServices {
        stock,
        orders,
        promotions,
        identities,
        coordinator,
        reconciler,
        repair,
        promotion_ledger,
        stripe: StripeAdapter::new(config.stripe_webhook_secret),
        paypal: PaypalAdapter::new(config.paypal_webhook_token),
        cod: CodAdapter,
    }
}
