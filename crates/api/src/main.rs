#[tokio::main]
async fn main() {
    stockwell_observability::init();

    let config = stockwell_api::app::ApiConfig {
        admin_token: env_or_dev("ADMIN_TOKEN", "dev-admin-token"),
        stripe_webhook_secret: env_or_dev("STRIPE_WEBHOOK_SECRET", "whsec-dev"),
        paypal_webhook_token: env_or_dev("PAYPAL_WEBHOOK_TOKEN", "paypal-dev"),
    };

    let app = stockwell_api::app::build_app(config).await;

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}

fn env_or_dev(name: &str, dev_default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        tracing::warn!("{name} not set; using insecure dev default");
        dev_default.to_string()
    })
}
