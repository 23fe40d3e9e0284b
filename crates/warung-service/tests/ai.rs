//! Vision proxy and label matching integration tests.

mod common;

use common::TestHarness;
use serde_json::{json, Value};

#[tokio::test]
async fn detect_requires_image() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/api/ai/detect")
        .json(&json!({ "prompts": ["bottle"] }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn detect_without_backend_reports_nothing() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/ai/detect")
        .json(&json!({ "image": "data:image/jpeg;base64,AAAA" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn match_prefers_detection_label() {
    let harness = TestHarness::new();
    harness.create_product("1", "Botol Minum", 15000, 3).await;
    let teh = harness.create_product("2", "Teh Botol Sosro", 5000, 10).await;
    harness
        .server
        .patch(&format!("/api/products/{}", teh["id"].as_str().unwrap()))
        .json(&json!({ "detection_label": "bottle" }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post("/api/ai/match")
        .json(&json!({ "detected_label": "Bottle" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["matched"], true);
    assert_eq!(body["product"]["name"], "Teh Botol Sosro");
}

#[tokio::test]
async fn unmatched_label_returns_null_product() {
    let harness = TestHarness::new();
    harness.create_product("1", "Indomie Goreng", 3500, 10).await;

    let response = harness
        .server
        .post("/api/ai/match")
        .json(&json!({ "detectedLabel": "laptop" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["matched"], false);
    assert!(body["product"].is_null());
}

#[tokio::test]
async fn detection_labels_are_distinct() {
    let harness = TestHarness::new();
    for (code, name) in [("1", "Aqua"), ("2", "Le Minerale"), ("3", "Indomie")] {
        harness.create_product(code, name, 4000, 10).await;
    }
    let products: Vec<Value> = harness.server.get("/api/products").await.json();
    for product in &products {
        let label = if product["name"] == "Indomie" { "packet" } else { "bottle" };
        harness
            .server
            .patch(&format!("/api/products/{}", product["id"].as_str().unwrap()))
            .json(&json!({ "detection_label": label }))
            .await
            .assert_status_ok();
    }

    let response = harness.server.get("/api/ai/detection-labels").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["labels"], json!(["bottle", "packet"]));
}
