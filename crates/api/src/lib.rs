//! HTTP API server for the storefront cart and checkout.
//!
//! Exposes per-user cart, address book, order history and a two-step
//! checkout, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use document_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use state::{AppState, UserSession};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/users/{user_id}/cart", get(routes::cart::get::<S>))
        .route("/users/{user_id}/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/users/{user_id}/cart/items/{product_id}",
            axum::routing::delete(routes::cart::remove::<S>),
        )
        .route(
            "/users/{user_id}/cart/items/{product_id}/increment",
            post(routes::cart::increment::<S>),
        )
        .route(
            "/users/{user_id}/cart/items/{product_id}/decrement",
            post(routes::cart::decrement::<S>),
        )
        .route(
            "/users/{user_id}/addresses",
            get(routes::addresses::list::<S>).post(routes::addresses::save::<S>),
        )
        .route(
            "/users/{user_id}/addresses/default",
            get(routes::addresses::get_default::<S>).put(routes::addresses::set_default::<S>),
        )
        .route("/users/{user_id}/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/users/{user_id}/checkout", post(routes::checkout::start::<S>))
        .route(
            "/users/{user_id}/checkout/result",
            post(routes::checkout::submit_result::<S>),
        )
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
