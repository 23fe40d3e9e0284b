//! Core types for the warung point-of-sale service.
//!
//! This crate provides the domain model shared by the store, the HTTP service and the
//! client SDK:
//!
//! - **Identifiers**: `ProductId`, `TransactionId`, `ItemId`
//! - **Catalog**: `Product`, `NewProduct`, `ProductPatch`, label matching
//! - **Carts**: `Cart` (transaction + line items), `Direction`, `TransactionStatus`
//! - **Reporting**: `Receipt` and the `analytics` reports
//! - **Vision**: `Detection` results shared by the detect proxy and the scanner
//!
//! # Money
//!
//! All amounts are whole rupiah stored as `i64`. Line prices are snapshots taken when the
//! line is created; later catalog price edits never change an existing line.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod analytics;
pub mod cart;
pub mod error;
pub mod ids;
pub mod product;
pub mod receipt;
pub mod vision;

pub use analytics::{Catalog, Period};
pub use cart::{
    Cart, Commentary, Direction, StockAdjustment, Transaction, TransactionItem, TransactionStatus,
};
pub use error::{CartError, Result};
pub use ids::{IdError, ItemId, ProductId, TransactionId};
pub use product::{
    detection_labels, match_label, NewProduct, Product, ProductPatch, ProductRef,
    DEFAULT_LOW_STOCK_THRESHOLD,
};
pub use receipt::{Receipt, ReceiptKind, ReceiptLine, ShopInfo};
pub use vision::{DetectResponse, Detection};
