//! Analytics integration tests.

mod common;

use chrono::Utc;
use common::TestHarness;
use serde_json::Value;

/// One sale of two Indomie and one purchase of three Aqua, both completed.
async fn seed_sales(harness: &TestHarness) {
    harness.create_product("1", "Indomie Goreng", 3500, 10).await;
    harness.create_product("2", "Aqua 600ml", 4000, 3).await;

    let sale = harness.open_cart("OUT").await;
    let sale_id = sale["id"].as_str().unwrap();
    harness.add_by_barcode(sale_id, "1", 2).await;
    harness.complete(sale_id).await;

    let purchase = harness.open_cart("IN").await;
    let purchase_id = purchase["id"].as_str().unwrap();
    harness.add_by_barcode(purchase_id, "2", 3).await;
    harness.complete(purchase_id).await;

    // Pending carts never count.
    let pending = harness.open_cart("OUT").await;
    harness
        .add_by_barcode(pending["id"].as_str().unwrap(), "1", 5)
        .await;
}

#[tokio::test]
async fn summary_counts_completed_only() {
    let harness = TestHarness::new();
    seed_sales(&harness).await;

    let response = harness.server.get("/api/analytics/summary?period=today").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total_sales"], 7000);
    assert_eq!(body["total_purchases"], 9000);
    assert_eq!(body["net_profit"], 2000);
    assert_eq!(body["transaction_count"], 2);
    assert_eq!(body["sales_count"], 1);
}

#[tokio::test]
async fn unknown_period_is_bad_request() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/api/analytics/summary?period=decade")
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn revenue_is_zero_filled() {
    let harness = TestHarness::new();
    seed_sales(&harness).await;
    let today = Utc::now().date_naive();
    let from = today - chrono::Days::new(2);

    let response = harness
        .server
        .get(&format!("/api/analytics/revenue?from={from}&to={today}"))
        .await;

    response.assert_status_ok();
    let rows: Vec<Value> = response.json();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["revenue"], 0);
    assert_eq!(rows[2]["revenue"], 7000);
    assert_eq!(rows[2]["purchases"], 9000);
}

#[tokio::test]
async fn top_products_and_categories() {
    let harness = TestHarness::new();
    seed_sales(&harness).await;

    let response = harness.server.get("/api/analytics/top-products").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["period"], "week");
    let products = body["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["product"]["name"], "Indomie Goreng");
    assert_eq!(products[0]["total_quantity"], 2);

    let response = harness.server.get("/api/analytics/categories").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["categories"][0]["category"], "Sembako");
    assert_eq!(body["categories"][0]["total_revenue"], 7000);
}

#[tokio::test]
async fn hourly_pattern_has_24_buckets() {
    let harness = TestHarness::new();
    seed_sales(&harness).await;

    let response = harness.server.get("/api/analytics/hourly-pattern").await;

    response.assert_status_ok();
    let body: Value = response.json();
    let hours = body["hours"].as_array().unwrap();
    assert_eq!(hours.len(), 24);
    let revenue: i64 = hours.iter().map(|h| h["revenue"].as_i64().unwrap()).sum();
    assert_eq!(revenue, 7000);
}

#[tokio::test]
async fn low_stock_lists_products_at_threshold() {
    let harness = TestHarness::new();
    seed_sales(&harness).await;
    harness.create_product("3", "Gula Pasir", 15000, 1).await;

    let response = harness.server.get("/api/analytics/low-stock").await;

    response.assert_status_ok();
    let body: Vec<Value> = response.json();
    // Indomie ends at 8 and Aqua at 6, both above the default threshold of 5.
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["name"], "Gula Pasir");
}

#[tokio::test]
async fn weekly_report_lists_best_sellers() {
    let harness = TestHarness::new();
    seed_sales(&harness).await;

    let response = harness.server.get("/api/analytics/weekly-report").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total_revenue"], 7000);
    assert_eq!(body["best_sellers"][0]["name"], "Indomie Goreng");
    assert_eq!(body["best_sellers"][0]["quantity"], 2);
}
