//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, patch, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{ai, analytics, health, products, transactions};
use crate::state::AppState;

/// Maximum concurrent requests for the vision proxy.
/// Each one holds a base64 frame and an upstream call.
const AI_MAX_CONCURRENT_REQUESTS: usize = 8;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /audio/*` - Rendered commentary clips
///
/// ## Products
/// - `GET|POST /api/products`
/// - `GET /api/products/barcode/:code`
/// - `GET|PATCH|DELETE /api/products/:id`
///
/// ## Transactions
/// - `GET|POST /api/transactions`
/// - `GET|DELETE /api/transactions/:id`
/// - `POST /api/transactions/:id/items`
/// - `PATCH|DELETE /api/transactions/:id/items/:item_id`
/// - `POST /api/transactions/:id/complete`
/// - `POST /api/transactions/:id/commentary`
/// - `GET /api/transactions/:id/receipt`
/// - `GET /api/transactions/:id/events` - WebSocket
///
/// ## Analytics
/// - `GET /api/analytics/{summary,revenue,top-products,categories,hourly-pattern,low-stock,weekly-report}`
///
/// ## AI (concurrency-limited)
/// - `POST /api/ai/detect`
/// - `POST /api/ai/match`
/// - `GET /api/ai/detection-labels`
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;
    let audio_dir = state.config.audio_dir.clone();

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let product_routes = Router::new()
        .route(
            "/",
            get(products::list_products).post(products::create_product),
        )
        .route("/barcode/:code", get(products::get_product_by_barcode))
        .route(
            "/:id",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        );

    let transaction_routes = Router::new()
        .route(
            "/",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route(
            "/:id",
            get(transactions::get_transaction).delete(transactions::delete_transaction),
        )
        .route("/:id/items", post(transactions::add_item))
        .route(
            "/:id/items/:item_id",
            patch(transactions::update_item).delete(transactions::remove_item),
        )
        .route("/:id/complete", post(transactions::complete_transaction))
        .route("/:id/commentary", post(transactions::generate_commentary))
        .route("/:id/receipt", get(transactions::get_receipt))
        .route("/:id/events", get(transactions::transaction_events));

    let analytics_routes = Router::new()
        .route("/summary", get(analytics::summary))
        .route("/revenue", get(analytics::revenue))
        .route("/top-products", get(analytics::top_products))
        .route("/categories", get(analytics::categories))
        .route("/hourly-pattern", get(analytics::hourly_pattern))
        .route("/low-stock", get(analytics::low_stock))
        .route("/weekly-report", get(analytics::weekly_report));

    // Vision calls are slow and carry large bodies, so they get a tighter limit.
    let ai_routes = Router::new()
        .route("/detect", post(ai::detect))
        .route("/match", post(ai::match_product))
        .route("/detection-labels", get(ai::list_detection_labels))
        .layer(ConcurrencyLimitLayer::new(AI_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .nest("/products", product_routes)
        .nest("/transactions", transaction_routes)
        .nest("/analytics", analytics_routes)
        .nest("/ai", ai_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        .nest_service("/audio", ServeDir::new(audio_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(RequestBodyLimitLayer::new(max_body_bytes))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    request_timeout_seconds,
                ))),
        )
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
