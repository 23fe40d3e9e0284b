//! Analytics handlers.
//!
//! Reports are computed on request from completed transactions and the current catalog.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use warung_core::analytics::{
    self, CategorySales, HourlyBucket, ProductSales, RevenueRow, Summary, WeeklyReport,
    DEFAULT_REVENUE_DAYS, DEFAULT_TOP_PRODUCTS_LIMIT,
};
use warung_core::{Cart, Catalog, Period, Product};
use warung_store::TransactionFilter;

use crate::error::ApiError;
use crate::state::AppState;

/// Query with an optional reporting period.
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    /// `today`, `week` or `month`.
    pub period: Option<String>,
    /// Maximum rows (top products only).
    pub limit: Option<usize>,
}

/// Query with an optional date range.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    /// First day (inclusive), `YYYY-MM-DD`.
    pub from: Option<String>,
    /// Last day (inclusive), `YYYY-MM-DD`.
    pub to: Option<String>,
}

/// Query with an optional single day.
#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    /// Day to report, `YYYY-MM-DD`; defaults to today.
    pub date: Option<String>,
}

/// Top products response.
#[derive(Debug, Serialize)]
pub struct TopProductsResponse {
    /// Window the ranking covers.
    pub period: Period,
    /// Ranked rows.
    pub products: Vec<ProductSales>,
}

/// Category breakdown response.
#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    /// Window the breakdown covers.
    pub period: Period,
    /// One row per category.
    pub categories: Vec<CategorySales>,
}

/// Hourly pattern response.
#[derive(Debug, Serialize)]
pub struct HourlyResponse {
    /// The reported day.
    pub date: NaiveDate,
    /// Exactly 24 buckets.
    pub hours: Vec<HourlyBucket>,
}

/// Sales totals for a period.
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Summary>, ApiError> {
    let period = parse_period(query.period.as_deref(), Period::Today)?;
    let (carts, catalog) = load(&state)?;
    Ok(Json(analytics::summary(&carts, &catalog, period, Utc::now())))
}

/// Per-day revenue over a date range.
pub async fn revenue(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<RevenueRow>>, ApiError> {
    let today = Utc::now().date_naive();
    let to = query
        .to
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or(today);
    let from = match query.from.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => to - chrono::Days::new(DEFAULT_REVENUE_DAYS - 1),
    };
    if from > to {
        return Err(ApiError::BadRequest("from must not be after to".into()));
    }

    let (carts, catalog) = load(&state)?;
    Ok(Json(analytics::revenue(&carts, &catalog, from, to)))
}

/// Best-selling products.
pub async fn top_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<TopProductsResponse>, ApiError> {
    let period = parse_period(query.period.as_deref(), Period::Week)?;
    let limit = query.limit.unwrap_or(DEFAULT_TOP_PRODUCTS_LIMIT).max(1);
    let (carts, catalog) = load(&state)?;

    let since = period.start(Utc::now());
    Ok(Json(TopProductsResponse {
        period,
        products: analytics::top_products(&carts, &catalog, since, limit),
    }))
}

/// Sales per category.
pub async fn categories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    let period = parse_period(query.period.as_deref(), Period::Month)?;
    let (carts, catalog) = load(&state)?;

    let since = period.start(Utc::now());
    Ok(Json(CategoriesResponse {
        period,
        categories: analytics::categories(&carts, &catalog, since),
    }))
}

/// Sales by hour of day.
pub async fn hourly_pattern(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DateQuery>,
) -> Result<Json<HourlyResponse>, ApiError> {
    let date = query
        .date
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(|| Utc::now().date_naive());
    let (carts, _) = load(&state)?;

    Ok(Json(HourlyResponse {
        date,
        hours: analytics::hourly_pattern(&carts, date),
    }))
}

/// Products at or below their threshold.
pub async fn low_stock(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state.store.list_products()?;
    Ok(Json(analytics::low_stock(&products)))
}

/// This week compared with last week.
pub async fn weekly_report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<WeeklyReport>, ApiError> {
    let (carts, catalog) = load(&state)?;
    Ok(Json(analytics::weekly_report(&carts, &catalog, Utc::now())))
}

fn load(state: &AppState) -> Result<(Vec<Cart>, Catalog), ApiError> {
    let carts = state.carts.list(&TransactionFilter::completed())?.carts;
    let catalog = state
        .store
        .list_products()?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    Ok((carts, catalog))
}

fn parse_period(raw: Option<&str>, default: Period) -> Result<Period, ApiError> {
    raw.map_or(Ok(default), |p| p.parse().map_err(ApiError::from))
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid date: {raw}")))
}
