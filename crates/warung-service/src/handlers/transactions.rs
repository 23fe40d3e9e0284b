//! Transaction (cart) handlers.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use warung_core::{
    Cart, CartError, Commentary, Direction, ItemId, ProductId, ProductRef, Receipt,
    TransactionId, TransactionItem, TransactionStatus,
};
use warung_store::{StoreError, TransactionFilter};

use crate::error::ApiError;
use crate::events::{CartEvent, CartEventKind};
use crate::state::AppState;

// ============================================================================
// Constants
// ============================================================================

/// Page size when the caller gives none.
const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page a caller may request.
const MAX_PAGE_SIZE: usize = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Transaction listing query.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    /// `IN` or `OUT`.
    #[serde(rename = "type")]
    pub direction: Option<Direction>,
    /// `PENDING` or `COMPLETED`.
    pub status: Option<TransactionStatus>,
    /// Created on or after (date or RFC 3339 timestamp).
    pub from: Option<String>,
    /// Created on or before (date or RFC 3339 timestamp).
    pub to: Option<String>,
    /// 1-based page number.
    pub page: Option<usize>,
    /// Page size, capped at 100.
    pub limit: Option<usize>,
}

/// Pagination metadata.
#[derive(Debug, Serialize)]
pub struct Pagination {
    /// Current page.
    pub page: usize,
    /// Page size.
    pub limit: usize,
    /// Matching transactions across all pages.
    pub total: usize,
    /// Number of pages.
    pub pages: usize,
}

/// Transaction listing response.
#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    /// Carts on this page, newest first.
    pub transactions: Vec<Cart>,
    /// Pagination metadata.
    pub pagination: Pagination,
}

/// Open cart request.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTransactionRequest {
    /// Direction; defaults to `OUT`.
    #[serde(rename = "type", default)]
    pub direction: Direction,
}

/// Add item request. Exactly one of `product_id` or `barcode` is required.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    /// Catalog ID.
    pub product_id: Option<String>,
    /// Scan code.
    pub barcode: Option<String>,
    /// Units to add (default 1).
    pub quantity: Option<i64>,
}

/// Set quantity request.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    /// New exact quantity.
    pub quantity: i64,
}

/// A line together with the cart it belongs to.
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    /// The affected line.
    pub item: TransactionItem,
    /// The updated cart.
    pub transaction: Cart,
}

/// Line removal response.
#[derive(Debug, Serialize)]
pub struct RemoveItemResponse {
    /// Human-readable result.
    pub message: String,
    /// The updated cart.
    pub transaction: Cart,
}

/// Finalize response.
#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    /// The completed cart.
    pub transaction: Cart,
}

/// Commentary response; all fields are null when none was produced.
#[derive(Debug, Default, Serialize)]
pub struct CommentaryResponse {
    /// Display text.
    pub sentence: Option<String>,
    /// Speech variant.
    pub tts: Option<String>,
    /// Rendered clip.
    pub audio_url: Option<String>,
}

impl From<Option<Commentary>> for CommentaryResponse {
    fn from(commentary: Option<Commentary>) -> Self {
        commentary.map_or_else(Self::default, |c| Self {
            sentence: Some(c.sentence),
            tts: c.tts,
            audio_url: c.audio_url,
        })
    }
}

/// Discard response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable result.
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// List transactions, newest first.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<TransactionListResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let filter = TransactionFilter {
        direction: query.direction,
        status: query.status,
        from: query.from.as_deref().map(parse_from).transpose()?,
        to: query.to.as_deref().map(parse_to).transpose()?,
        offset: (page - 1).saturating_mul(limit),
        limit: Some(limit),
    };

    let result = state.carts.list(&filter)?;
    Ok(Json(TransactionListResponse {
        transactions: result.carts,
        pagination: Pagination {
            page,
            limit,
            total: result.total,
            pages: result.total.div_ceil(limit),
        },
    }))
}

/// Get one cart with its items.
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Cart>, ApiError> {
    let id = parse_transaction_id(&id)?;
    Ok(Json(state.carts.get(id)?))
}

/// Open a new pending cart.
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    body: Option<Json<CreateTransactionRequest>>,
) -> Result<(StatusCode, Json<Cart>), ApiError> {
    let direction = body.map(|Json(b)| b.direction).unwrap_or_default();
    let cart = state.carts.open(direction)?;
    Ok((StatusCode::CREATED, Json(cart)))
}

/// Add a product to a cart.
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    let id = parse_transaction_id(&id)?;
    let quantity = parse_quantity(body.quantity.unwrap_or(1))?;

    let product = match (body.product_id, body.barcode) {
        (Some(product_id), _) => ProductRef::Id(
            product_id
                .parse::<ProductId>()
                .map_err(|_| ApiError::BadRequest(format!("invalid product id: {product_id}")))?,
        ),
        (None, Some(barcode)) if !barcode.trim().is_empty() => {
            ProductRef::Barcode(barcode.trim().to_string())
        }
        _ => {
            return Err(ApiError::BadRequest(
                "product_id or barcode is required".into(),
            ))
        }
    };

    let (item, transaction) = state.carts.add_item(id, &product, quantity)?;
    Ok((StatusCode::CREATED, Json(ItemResponse { item, transaction })))
}

/// Set a line's quantity.
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path((id, item_id)): Path<(String, String)>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let id = parse_transaction_id(&id)?;
    let item_id = parse_item_id(&item_id)?;
    let quantity = parse_quantity(body.quantity)?;

    let (item, transaction) = state.carts.set_quantity(id, item_id, quantity)?;
    Ok(Json(ItemResponse { item, transaction }))
}

/// Remove a line.
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<Json<RemoveItemResponse>, ApiError> {
    let id = parse_transaction_id(&id)?;
    let item_id = parse_item_id(&item_id)?;

    let transaction = state.carts.remove_item(id, item_id)?;
    Ok(Json(RemoveItemResponse {
        message: "Item removed".into(),
        transaction,
    }))
}

/// Finalize a cart.
pub async fn complete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let id = parse_transaction_id(&id)?;
    let transaction = state.carts.finalize(id)?;
    Ok(Json(CompleteResponse { transaction }))
}

/// Generate commentary for a completed sale.
///
/// Collaborator failures yield an empty response rather than an error.
pub async fn generate_commentary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CommentaryResponse>, ApiError> {
    let id = parse_transaction_id(&id)?;

    let commentary = match state.carts.generate_commentary(id).await {
        Ok(commentary) => commentary,
        Err(StoreError::Rejected(e @ CartError::ExternalUnavailable { .. })) => {
            tracing::warn!(transaction_id = %id, error = %e, "Commentary unavailable");
            None
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(commentary.into()))
}

/// Discard a pending cart.
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_transaction_id(&id)?;
    state.carts.discard(id)?;
    Ok(Json(MessageResponse {
        message: "Transaction deleted".into(),
    }))
}

/// Printable receipt.
pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Receipt>, ApiError> {
    let id = parse_transaction_id(&id)?;
    Ok(Json(state.carts.receipt(id, &state.shop())?))
}

/// Stream one cart's events over a WebSocket.
pub async fn transaction_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let id = parse_transaction_id(&id)?;
    state.carts.get(id)?;

    let bus = state.carts.events().clone();
    let events = bus.subscribe(id);
    Ok(ws.on_upgrade(move |socket| async move {
        stream_events(socket, id, events).await;
        bus.release(id);
    }))
}

async fn stream_events(
    socket: WebSocket,
    id: TransactionId,
    mut events: broadcast::Receiver<CartEvent>,
) {
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!(transaction_id = %id, "Event subscriber connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let closing = event.kind == CartEventKind::Discarded;
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(
                                transaction_id = %id,
                                error = %e,
                                "Failed to encode event"
                            );
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload)).await.is_err() || closing {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(transaction_id = %id, skipped, "Event subscriber lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    if let Err(e) = sender.close().await {
        tracing::debug!(transaction_id = %id, error = %e, "Event socket close failed");
    }
    tracing::debug!(transaction_id = %id, "Event subscriber disconnected");
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_transaction_id(raw: &str) -> Result<TransactionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid transaction id: {raw}")))
}

fn parse_item_id(raw: &str) -> Result<ItemId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid item id: {raw}")))
}

fn parse_quantity(quantity: i64) -> Result<u32, ApiError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| ApiError::BadRequest("quantity must be a positive integer".into()))
}

fn parse_from(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    parse_bound(raw, NaiveTime::MIN)
}

fn parse_to(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    parse_bound(raw, end_of_day)
}

/// Accept an RFC 3339 timestamp or a bare date, which is pinned to `time_of_day`.
fn parse_bound(raw: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(time_of_day).and_utc())
        .map_err(|_| ApiError::BadRequest(format!("invalid date: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_must_be_positive() {
        assert_eq!(parse_quantity(3).unwrap(), 3);
        assert!(parse_quantity(0).is_err());
        assert!(parse_quantity(-2).is_err());
        assert!(parse_quantity(i64::MAX).is_err());
    }

    #[test]
    fn date_bounds_cover_whole_days() {
        let from = parse_from("2025-01-02").unwrap();
        let to = parse_to("2025-01-02").unwrap();
        assert_eq!(from.to_rfc3339(), "2025-01-02T00:00:00+00:00");
        assert_eq!(to.date_naive(), from.date_naive());
        assert!(to > from);
        assert!(parse_from("yesterday").is_err());
    }

    #[test]
    fn empty_commentary_serializes_nulls() {
        let json = serde_json::to_value(CommentaryResponse::from(None)).unwrap();
        assert!(json["sentence"].is_null());
        assert!(json["audio_url"].is_null());
    }
}
