//! Catalog integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::{json, Value};

#[tokio::test]
async fn health_reports_ok() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["vision"], false);
}

#[tokio::test]
async fn create_and_fetch_product() {
    let harness = TestHarness::new();

    let created = harness.create_product("899001", "Indomie Goreng", 3500, 10).await;
    assert_eq!(created["low_stock_threshold"], 5);

    let id = created["id"].as_str().unwrap();
    let response = harness.server.get(&format!("/api/products/{id}")).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"], "Indomie Goreng");

    let response = harness.server.get("/api/products/barcode/899001").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["id"], created["id"]);
}

#[tokio::test]
async fn duplicate_barcode_conflicts() {
    let harness = TestHarness::new();
    harness.create_product("899001", "Indomie Goreng", 3500, 10).await;

    let response = harness
        .server
        .post("/api/products")
        .json(&json!({
            "barcode": "899001",
            "name": "Indomie Soto",
            "category": "Mie",
            "buy_price": 2500,
            "sell_price": 3500,
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn missing_required_field_is_bad_request() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/products")
        .json(&json!({
            "barcode": "1",
            "name": "",
            "category": "Mie",
            "buy_price": 1,
            "sell_price": 2,
        }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn list_is_ordered_by_name_and_searchable() {
    let harness = TestHarness::new();
    harness.create_product("2", "Teh Botol", 5000, 10).await;
    harness.create_product("1", "Aqua 600ml", 4000, 10).await;

    let response = harness.server.get("/api/products").await;
    response.assert_status_ok();
    let body: Vec<Value> = response.json();
    let names: Vec<&str> = body.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Aqua 600ml", "Teh Botol"]);

    let response = harness.server.get("/api/products?search=teh").await;
    let body: Vec<Value> = response.json();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["name"], "Teh Botol");
}

#[tokio::test]
async fn patch_updates_only_given_fields() {
    let harness = TestHarness::new();
    let created = harness.create_product("899001", "Indomie Goreng", 3500, 10).await;
    let id = created["id"].as_str().unwrap();

    let response = harness
        .server
        .patch(&format!("/api/products/{id}"))
        .json(&json!({ "sell_price": 4000, "detection_label": "instant noodle" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["sell_price"], 4000);
    assert_eq!(body["name"], "Indomie Goreng");
    assert_eq!(body["detection_label"], "instant noodle");
}

#[tokio::test]
async fn delete_then_lookup_is_not_found() {
    let harness = TestHarness::new();
    let created = harness.create_product("899001", "Indomie Goreng", 3500, 10).await;
    let id = created["id"].as_str().unwrap();

    harness
        .server
        .delete(&format!("/api/products/{id}"))
        .await
        .assert_status_ok();

    harness
        .server
        .get(&format!("/api/products/{id}"))
        .await
        .assert_status_not_found();
    harness
        .server
        .get("/api/products/barcode/899001")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn malformed_product_id_is_bad_request() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/api/products/not-a-uuid")
        .await
        .assert_status_bad_request();
}
