//! HTTP API server with observability for the car-wash order service.
//!
//! Provides REST endpoints for orders, the service catalog and the records
//! orders refer to, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod mailer;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use domain::{CatalogService, NotificationDispatcher, OrderService};
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;
use store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/today", get(routes::orders::today::<S>))
        .route("/orders/update-statuses", put(routes::orders::sweep::<S>))
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>).delete(routes::orders::delete::<S>),
        )
        .route(
            "/orders/{id}/services",
            put(routes::orders::add_services::<S>),
        )
        .route(
            "/services",
            post(routes::services::create::<S>).get(routes::services::list::<S>),
        )
        .route(
            "/services/{id}",
            get(routes::services::get::<S>)
                .put(routes::services::update::<S>)
                .delete(routes::services::delete::<S>),
        )
        .route(
            "/brands",
            post(routes::catalog::create_brand::<S>).get(routes::catalog::list_brands::<S>),
        )
        .route(
            "/brands/{id}",
            get(routes::catalog::get_brand::<S>)
                .put(routes::catalog::update_brand::<S>)
                .delete(routes::catalog::delete_brand::<S>),
        )
        .route(
            "/brands/by-name/{name}",
            delete(routes::catalog::delete_brand_by_name::<S>),
        )
        .route(
            "/cars",
            post(routes::catalog::create_car_model::<S>)
                .get(routes::catalog::list_car_models::<S>),
        )
        .route(
            "/cars/{id}",
            get(routes::catalog::get_car_model::<S>)
                .put(routes::catalog::update_car_model::<S>)
                .delete(routes::catalog::delete_car_model::<S>),
        )
        .route(
            "/customer-cars",
            post(routes::catalog::create_customer_vehicle::<S>)
                .get(routes::catalog::list_customer_vehicles::<S>),
        )
        .route(
            "/customer-cars/{id}",
            get(routes::catalog::get_customer_vehicle::<S>)
                .put(routes::catalog::update_customer_vehicle::<S>)
                .delete(routes::catalog::delete_customer_vehicle::<S>),
        )
        .route(
            "/users",
            post(routes::catalog::register_user::<S>).get(routes::catalog::list_users::<S>),
        )
        .route("/users/me", get(routes::catalog::current_user::<S>))
        .route("/users/{id}", delete(routes::catalog::delete_user::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over a store, delivering completion messages
/// through `dispatcher`.
pub fn create_state<S: OrderStore + Clone + 'static>(
    store: S,
    dispatcher: Arc<dyn NotificationDispatcher>,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        order_service: Arc::new(OrderService::new(store.clone(), dispatcher)),
        catalog_service: CatalogService::new(store),
    })
}

/// Registers help text for the metrics the service emits.
pub fn describe_metrics() {
    describe_counter!("orders_created_total", "Orders opened");
    describe_counter!("orders_completed_total", "Orders moved to completed by a sweep");
    describe_counter!(
        "order_notifications_total",
        "Completion notifications by outcome"
    );
    describe_counter!("order_sweeps_total", "Completion sweeps run");
    describe_counter!("order_sweep_failures_total", "Scheduled sweeps that failed");
    describe_histogram!(
        "order_sweep_duration_seconds",
        Unit::Seconds,
        "Duration of a completion sweep"
    );
}
