//! Catalog handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use warung_core::{NewProduct, Product, ProductId, ProductPatch};

use crate::error::ApiError;
use crate::state::AppState;

/// Catalog listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    /// Case-insensitive substring of the name or barcode.
    pub search: Option<String>,
    /// Exact category.
    pub category: Option<String>,
}

/// Deletion acknowledgement.
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    /// Human-readable result.
    pub message: String,
}

/// List products ordered by name.
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let search = query
        .search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let products = state
        .store
        .list_products()?
        .into_iter()
        .filter(|p| query.category.as_ref().map_or(true, |c| &p.category == c))
        .filter(|p| {
            search.as_ref().map_or(true, |s| {
                p.name.to_lowercase().contains(s.as_str()) || p.barcode.contains(s.as_str())
            })
        })
        .collect();

    Ok(Json(products))
}

/// Get a product by ID.
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid product id: {id}")))?;

    state
        .store
        .get_product(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("product not found: {id}")))
}

/// Get a product by scan code.
pub async fn get_product_by_barcode(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Product>, ApiError> {
    state
        .store
        .get_product_by_barcode(&code)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("product not found: {code}")))
}

/// Create a product.
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = Product::new(body)?;
    state.store.insert_product(&product)?;

    tracing::info!(
        product_id = %product.id,
        barcode = %product.barcode,
        "Product created"
    );

    Ok((StatusCode::CREATED, Json(product)))
}

/// Partially update a product.
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid product id: {id}")))?;

    let product = state.store.update_product(&id, patch)?;
    tracing::info!(product_id = %id, "Product updated");

    Ok(Json(product))
}

/// Delete a product.
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id: ProductId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid product id: {id}")))?;

    state.store.delete_product(&id)?;
    tracing::info!(product_id = %id, "Product deleted");

    Ok(Json(DeletedResponse {
        message: "Product deleted".into(),
    }))
}
