//! HTTP API server for the storefront.
//!
//! Provides REST endpoints for accounts, the catalog, carts, orders and
//! payments, with bearer-token auth, per-client rate limiting, structured
//! logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{Services, TokenService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use middleware::RateLimiter;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub services: Services<S>,
    /// Direct store handle, used by the health check.
    pub store: S,
    pub rate_limiter: RateLimiter,
}

/// Wires the services and the rate limiter to one store.
pub fn create_state<S: Store>(store: S, config: &Config) -> Arc<AppState<S>> {
    let tokens = TokenService::new(config.jwt_secret.as_bytes(), config.jwt_ttl_secs);
    Arc::new(AppState {
        services: Services::new(store.clone(), tokens),
        store,
        rate_limiter: RateLimiter::new(config.rate_limit_per_minute),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let rate_limiter = state.rate_limiter.clone();

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/openapi.json", get(routes::openapi::get))
        // auth
        .route("/auth/register", post(routes::auth::register::<S>))
        .route("/auth/login", post(routes::auth::login::<S>))
        // users
        .route("/users", get(routes::users::list::<S>))
        .route(
            "/users/me",
            get(routes::users::me::<S>)
                .put(routes::users::update_me::<S>)
                .delete(routes::users::delete_me::<S>),
        )
        .route(
            "/users/me/addresses",
            get(routes::users::list_addresses::<S>).post(routes::users::add_address::<S>),
        )
        .route(
            "/users/me/addresses/{id}",
            put(routes::users::update_address::<S>).delete(routes::users::delete_address::<S>),
        )
        .route(
            "/users/me/addresses/{id}/default",
            post(routes::users::set_default_address::<S>),
        )
        .route(
            "/users/me/contacts",
            get(routes::users::list_contacts::<S>).post(routes::users::add_contact::<S>),
        )
        .route(
            "/users/me/contacts/{id}",
            put(routes::users::update_contact::<S>).delete(routes::users::delete_contact::<S>),
        )
        .route(
            "/users/me/contacts/{id}/default",
            post(routes::users::set_default_contact::<S>),
        )
        // catalog
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route(
            "/products/{id}",
            get(routes::products::get::<S>)
                .put(routes::products::update::<S>)
                .delete(routes::products::delete::<S>),
        )
        .route(
            "/products/{id}/stock",
            post(routes::products::adjust_stock::<S>),
        )
        // cart
        .route(
            "/cart",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::set_quantity::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/cart/checkout", post(routes::cart::checkout::<S>))
        // orders
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>).delete(routes::orders::cancel::<S>),
        )
        .route(
            "/orders/{id}/status",
            put(routes::orders::update_status::<S>),
        )
        .route(
            "/orders/{id}/payment",
            get(routes::payments::for_order::<S>),
        )
        // payments
        .route(
            "/payments",
            get(routes::payments::list::<S>).post(routes::payments::create::<S>),
        )
        .route("/payments/{id}", get(routes::payments::get::<S>))
        .route(
            "/payments/{id}/refund",
            post(routes::payments::refund::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit,
        ))
        .layer(axum::middleware::from_fn(middleware::track_http))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
