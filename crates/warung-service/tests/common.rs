//! Common test utilities for warung integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use warung_service::{create_router, AppState, ServiceConfig};
use warung_store::RocksStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database and audio (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// The store behind the server, for seeding and inspection.
    pub store: Arc<RocksStore>,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(
            RocksStore::open(temp_dir.path().join("db")).expect("Failed to open store"),
        );

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().join("db").to_string_lossy().to_string(),
            audio_dir: temp_dir.path().join("audio").to_string_lossy().to_string(),
            shop_name: "WARUNG TEST".into(),
            shop_address: "Jl. Pengujian No. 1".into(),
            auto_commentary: false,
            max_body_bytes: 1024 * 1024,
            ..ServiceConfig::default()
        };

        let state = AppState::new(store.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            _temp_dir: temp_dir,
            store,
        }
    }

    /// Create a product through the API and return its JSON.
    pub async fn create_product(
        &self,
        barcode: &str,
        name: &str,
        sell_price: i64,
        stock: i64,
    ) -> Value {
        let response = self
            .server
            .post("/api/products")
            .json(&json!({
                "barcode": barcode,
                "name": name,
                "category": "Sembako",
                "buy_price": sell_price - 1000,
                "sell_price": sell_price,
                "stock": stock,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    /// Open a cart with the given direction and return its JSON.
    pub async fn open_cart(&self, direction: &str) -> Value {
        let response = self
            .server
            .post("/api/transactions")
            .json(&json!({ "type": direction }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    /// Add a product to a cart by barcode and return the response JSON.
    pub async fn add_by_barcode(
        &self,
        transaction_id: &str,
        barcode: &str,
        quantity: i64,
    ) -> Value {
        let response = self
            .server
            .post(&format!("/api/transactions/{transaction_id}/items"))
            .json(&json!({ "barcode": barcode, "quantity": quantity }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    /// Finalize a cart and return the completed transaction JSON.
    pub async fn complete(&self, transaction_id: &str) -> Value {
        let response = self
            .server
            .post(&format!("/api/transactions/{transaction_id}/complete"))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["transaction"].clone()
    }

    /// Fetch a product's current stock.
    pub async fn stock_of(&self, product_id: &str) -> i64 {
        let response = self.server.get(&format!("/api/products/{product_id}")).await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["stock"].as_i64().expect("stock is an integer")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
