//! HTTP surface and background workers for the checkout saga.
//!
//! Checkout and payment-status intake are request driven; the three queue
//! consumers run on a timer (see [`workers`]) and can also be triggered over
//! HTTP. Structured logging comes from tracing, metrics from Prometheus.

pub mod config;
pub mod error;
pub mod routes;
pub mod workers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{Address, Repository, TableNames};
use metrics_exporter_prometheus::PrometheusHandle;
use queue::{InMemoryQueueTransport, InMemoryTopic};
use record_store::RecordStore;
use saga::SagaComponents;
use shipping::{FixedRateQuoteService, ShipmentPlanner};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Saga components over the in-process queue transports.
pub type Saga<S> = SagaComponents<S, InMemoryQueueTransport, InMemoryTopic>;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub repository: Repository<S>,
    pub saga: Saga<S>,
    pub planner: ShipmentPlanner<S, FixedRateQuoteService>,
    pub queues: InMemoryQueueTransport,
    pub topic: InMemoryTopic,
}

/// Builds the application state over `store`, declaring the saga's queues.
pub async fn create_state<S: RecordStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let saga_config = config.saga_config();
    let names = &saga_config.queues;
    let queues = InMemoryQueueTransport::with_queues(&[
        names.staging.as_str(),
        names.payment_status.as_str(),
        names.inventory_update.as_str(),
    ])
    .await;
    let topic = InMemoryTopic::new();

    let repository = Repository::new(store, TableNames::default());
    let saga = SagaComponents::build(repository.clone(), queues.clone(), topic.clone(), &saga_config);
    let planner = ShipmentPlanner::new(
        repository.clone(),
        FixedRateQuoteService::default(),
        config.shipping_carrier.clone(),
        Address::default(),
    );

    Arc::new(AppState {
        repository,
        saga,
        planner,
        queues,
        topic,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: RecordStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout/orders", post(routes::checkout::open_order::<S>))
        .route("/checkout/payment", post(routes::checkout::submit_payment::<S>))
        .route("/payments/status", post(routes::checkout::report_payment_status::<S>))
        .route("/customers/{customer_id}/orders/{order_id}", get(routes::orders::get::<S>))
        .route("/orders/staging/drain", post(routes::queues::drain_staged::<S>))
        .route(
            "/orders/payment-status/process",
            post(routes::queues::process_payment_statuses::<S>),
        )
        .route(
            "/inventory/adjustments/apply",
            post(routes::queues::apply_adjustments::<S>),
        )
        .route("/shipping/plan", post(routes::shipping::plan::<S>))
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
