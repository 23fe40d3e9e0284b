//! `RocksDB` storage layer for warung.
//!
//! This crate persists the product catalog and cart aggregates. A cart (transaction header
//! plus all of its line items) is stored as one record, so every item mutation is a single
//! put and the stored total can never disagree with the stored lines.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `products`: Catalog records, keyed by `product_id`
//! - `products_by_barcode`: Unique scan-code index
//! - `transactions`: Cart aggregates, keyed by `transaction_id` (ULID)
//!
//! Compound writes (finalize, barcode changes) go through a single `WriteBatch`, and all
//! read-modify-write operations are serialized by a store-wide write lock.
//!
//! # Example
//!
//! ```no_run
//! use warung_store::{RocksStore, Store};
//! use warung_core::{Cart, Direction};
//!
//! let store = RocksStore::open("/tmp/warung-db").unwrap();
//!
//! let cart = Cart::open(Direction::Out);
//! store.insert_cart(&cart).unwrap();
//!
//! let retrieved = store.get_cart(&cart.id()).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use warung_core::{
    Cart, Direction, Product, ProductId, ProductPatch, TransactionId, TransactionStatus,
};

/// Callback applied to a cart inside [`Store::modify_cart`].
pub type CartMutation<'a> = &'a mut dyn FnMut(&mut Cart) -> warung_core::Result<()>;

/// Criteria for listing transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Only this direction.
    pub direction: Option<Direction>,
    /// Only this status.
    pub status: Option<TransactionStatus>,
    /// Created at or after.
    pub from: Option<DateTime<Utc>>,
    /// Created at or before.
    pub to: Option<DateTime<Utc>>,
    /// Matching records to skip.
    pub offset: usize,
    /// Maximum records to return; `None` returns everything.
    pub limit: Option<usize>,
}

impl TransactionFilter {
    /// Whether `cart` satisfies the filter (ignoring pagination).
    #[must_use]
    pub fn matches(&self, cart: &Cart) -> bool {
        let tx = &cart.transaction;
        self.direction.map_or(true, |d| tx.direction == d)
            && self.status.map_or(true, |s| tx.status == s)
            && self.from.map_or(true, |from| tx.created_at >= from)
            && self.to.map_or(true, |to| tx.created_at <= to)
    }

    /// All completed transactions.
    #[must_use]
    pub fn completed() -> Self {
        Self {
            status: Some(TransactionStatus::Completed),
            ..Self::default()
        }
    }
}

/// One page of a transaction listing.
#[derive(Debug, Clone, Default)]
pub struct TransactionPage {
    /// Carts on this page, newest first.
    pub carts: Vec<Cart>,
    /// Number of carts matching the filter across all pages.
    pub total: usize,
}

/// Apply a filter to carts already ordered newest first.
pub(crate) fn paginate(
    carts: impl Iterator<Item = Cart>,
    filter: &TransactionFilter,
) -> TransactionPage {
    let limit = filter.limit.unwrap_or(usize::MAX);
    let mut page = TransactionPage::default();
    for cart in carts.filter(|c| filter.matches(c)) {
        if page.total >= filter.offset && page.carts.len() < limit {
            page.carts.push(cart);
        }
        page.total += 1;
    }
    page
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Product Operations
    // =========================================================================

    /// List all products ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_products(&self) -> Result<Vec<Product>>;

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Get a product by scan code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>>;

    /// Insert a new product.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the barcode is already in use.
    fn insert_product(&self, product: &Product) -> Result<()>;

    /// Apply a partial update to a product and return the result.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the product doesn't exist.
    /// - `StoreError::Conflict` if the new barcode belongs to another product.
    /// - `StoreError::Rejected` if the patch fails validation.
    fn update_product(&self, id: &ProductId, patch: ProductPatch) -> Result<Product>;

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the product doesn't exist.
    fn delete_product(&self, id: &ProductId) -> Result<()>;

    // =========================================================================
    // Cart Operations
    // =========================================================================

    /// Insert a newly opened cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_cart(&self, cart: &Cart) -> Result<()>;

    /// Get a cart by transaction ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_cart(&self, id: &TransactionId) -> Result<Option<Cart>>;

    /// List carts matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_carts(&self, filter: &TransactionFilter) -> Result<TransactionPage>;

    /// Load a cart, apply `mutation`, and store the result.
    ///
    /// Nothing is written if `mutation` fails. Returns the stored cart.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the cart doesn't exist.
    /// - `StoreError::Rejected` with the mutation's error.
    fn modify_cart(&self, id: &TransactionId, mutation: CartMutation<'_>) -> Result<Cart>;

    /// Delete a cart that is still pending. Returns the deleted cart.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the cart doesn't exist.
    /// - `StoreError::Rejected` with `CartError::InvalidState` if it is completed.
    fn delete_pending_cart(&self, id: &TransactionId) -> Result<Cart>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Complete a cart and apply its stock adjustments in one atomic write.
    ///
    /// Either every referenced product's stock moves and the cart becomes `COMPLETED`, or
    /// nothing changes.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the cart or any referenced product doesn't exist.
    /// - `StoreError::Rejected` with `CartError::InvalidState` if it is not pending.
    /// - `StoreError::Rejected` with `CartError::Validation` if a stock level would overflow.
    fn finalize_cart(&self, id: &TransactionId, now: DateTime<Utc>) -> Result<Cart>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use warung_core::Direction;

    #[test]
    fn paginate_counts_all_matches() {
        let carts: Vec<Cart> = (0..5)
            .map(|i| Cart::open(if i % 2 == 0 { Direction::Out } else { Direction::In }))
            .collect();
        let filter = TransactionFilter {
            direction: Some(Direction::Out),
            offset: 1,
            limit: Some(1),
            ..TransactionFilter::default()
        };

        let page = paginate(carts.clone().into_iter(), &filter);
        assert_eq!(page.total, 3);
        assert_eq!(page.carts.len(), 1);
        assert_eq!(page.carts[0].id(), carts[2].id());
    }
}
