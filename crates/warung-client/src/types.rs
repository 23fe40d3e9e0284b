//! Request and response types for the warung client.

use serde::{Deserialize, Serialize};

use warung_core::{Cart, Direction, Product, TransactionItem, TransactionStatus};

// ============================================================================
// Scanning
// ============================================================================

/// Side of the frame midline an object is on, in logical (un-mirrored) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// Left of the midline: the shop side.
    Inside,
    /// Right of the midline: the customer side.
    Outside,
}

/// What a crossing asks the cart to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanAction {
    /// Add one unit.
    Add,
    /// Take one unit back out.
    Cancel,
}

impl ScanAction {
    /// Action for an object moving `from` one zone `to` the other.
    ///
    /// For sales, inside to outside adds; purchases reverse the polarity.
    #[must_use]
    pub fn for_crossing(from: Zone, to: Zone, direction: Direction) -> Option<Self> {
        let outward = match (from, to) {
            (Zone::Inside, Zone::Outside) => true,
            (Zone::Outside, Zone::Inside) => false,
            _ => return None,
        };
        let add = match direction {
            Direction::Out => outward,
            Direction::In => !outward,
        };
        Some(if add { Self::Add } else { Self::Cancel })
    }
}

/// A tracked object changing zones between consecutive samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing {
    /// Detector label of the object.
    pub label: String,
    /// Inferred intent.
    pub action: ScanAction,
    /// Confidence of the sighting that completed the crossing.
    pub confidence: f64,
    /// Zone the object ended up in.
    pub zone: Zone,
}

/// A crossing resolved against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    /// Matched product; `None` when the label is unknown to the catalog.
    pub product: Option<Product>,
    /// Inferred intent.
    pub action: ScanAction,
    /// Detector confidence.
    pub confidence: f64,
    /// Zone the object ended up in.
    pub zone: Zone,
    /// Detector label.
    pub label: String,
}

/// What [`crate::WarungClient::apply_scan`] did with an outcome.
#[derive(Debug)]
pub enum ScanApplied {
    /// One unit was added.
    Added(ItemResponse),
    /// The line was decremented by one.
    Decremented(ItemResponse),
    /// The line held one unit and was removed.
    Removed(RemoveItemResponse),
    /// Cancel for a product that is not in the cart; nothing was sent.
    NotInCart,
    /// The label matched no product; nothing was sent.
    Unmatched,
}

// ============================================================================
// Transactions
// ============================================================================

/// Open cart request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateTransactionRequest {
    #[serde(rename = "type")]
    pub direction: Direction,
}

/// Add item request.
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct AddItemRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    pub quantity: u32,
}

/// Set quantity request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateItemRequest {
    pub quantity: u32,
}

/// Transaction listing filters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionQuery {
    /// Only this direction.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    /// Only this status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
    /// Created on or after (`YYYY-MM-DD` or RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Created on or before (`YYYY-MM-DD` or RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// 1-based page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Pagination metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    /// Current page.
    pub page: usize,
    /// Page size.
    pub limit: usize,
    /// Matching transactions.
    pub total: usize,
    /// Number of pages.
    pub pages: usize,
}

/// Transaction listing response.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionList {
    /// Carts on this page.
    pub transactions: Vec<Cart>,
    /// Pagination metadata.
    pub pagination: Pagination,
}

/// A line together with its updated cart.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemResponse {
    /// The affected line.
    pub item: TransactionItem,
    /// The updated cart.
    pub transaction: Cart,
}

/// Line removal response.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveItemResponse {
    /// Server message.
    pub message: String,
    /// The updated cart.
    pub transaction: Cart,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompleteResponse {
    pub transaction: Cart,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    /// Server message.
    pub message: String,
}

/// Commentary response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentaryResponse {
    /// Display text.
    pub sentence: Option<String>,
    /// Speech variant.
    pub tts: Option<String>,
    /// Rendered clip path.
    pub audio_url: Option<String>,
}

/// Product listing filters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductQuery {
    /// Case-insensitive name or barcode fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Exact category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

// ============================================================================
// AI
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DetectRequest<'a> {
    pub image: &'a str,
    pub prompts: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MatchRequest<'a> {
    pub detected_label: &'a str,
}

/// Label match response.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchResponse {
    /// Whether a product was found.
    pub matched: bool,
    /// The matched product.
    pub product: Option<Product>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LabelsResponse {
    pub labels: Vec<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorDetail,
}

/// API error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}
