//! HTTP API application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: infrastructure wiring (stores, coordinator, reconciler)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::ApiConfig;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: ApiConfig) -> Router {
    let admin_state = middleware::AdminState {
        token: Arc::new(config.admin_token.clone()),
    };

    let services = Arc::new(services::build_services(config).await);

    // Admin surface plus the COD settlement route share the bearer guard:
    // COD "events" are minted by operators, not an external provider.
    let guarded = Router::new()
        .nest("/admin", routes::admin::router())
        .route("/webhooks/cod", post(routes::webhooks::cod))
        .layer(axum::middleware::from_fn_with_state(
            admin_state,
            middleware::admin_guard,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/checkout", post(routes::checkout::checkout))
        .route("/promotions/usage", post(routes::promotions::usage))
        .route("/webhooks/stripe", post(routes::webhooks::stripe))
        .route("/webhooks/paypal", post(routes::webhooks::paypal))
        .merge(guarded)
        .layer(Extension(services))
}
