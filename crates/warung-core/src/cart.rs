//! Transactions, line items and the cart aggregate.
//!
//! A [`Cart`] is a transaction together with its current line items and is the unit of
//! consistency: every mutation goes through a `Cart` method, and every method leaves
//! `transaction.total_amount` equal to the sum of `unit_price * quantity` over `items`.
//! Methods validate before touching anything, so a rejected call leaves the cart exactly
//! as it was.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CartError, Result};
use crate::product::Product;
use crate::{ItemId, ProductId, TransactionId};

/// Which way goods move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Shop buys from a supplier; stock goes up, lines are priced at cost.
    In,
    /// Shop sells to a customer; stock goes down, lines are priced at sale price.
    #[default]
    Out,
}

impl Direction {
    /// Signed stock change for moving `quantity` units in this direction.
    #[must_use]
    pub fn stock_delta(self, quantity: u32) -> i64 {
        let quantity = i64::from(quantity);
        match self {
            Self::Out => -quantity,
            Self::In => quantity,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::In => "IN",
            Self::Out => "OUT",
        })
    }
}

/// Lifecycle of a transaction. `Completed` is terminal; discarding deletes the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    /// Open cart, line items may change.
    Pending,
    /// Finalized; stock has been adjusted and lines are historical record.
    Completed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
        })
    }
}

/// Generated remark attached to a completed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commentary {
    /// Text shown on screen and on the receipt.
    pub sentence: String,
    /// Prosody-annotated variant fed to speech synthesis.
    pub tts: Option<String>,
    /// Public path of the rendered audio clip, if any.
    pub audio_url: Option<String>,
}

/// Transaction header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// Sale or purchase.
    #[serde(rename = "type")]
    pub direction: Direction,

    /// Lifecycle status.
    pub status: TransactionStatus,

    /// Sum of line extensions. Derived; never set directly.
    pub total_amount: i64,

    /// When the cart was opened.
    pub created_at: DateTime<Utc>,

    /// When the cart was finalized.
    pub completed_at: Option<DateTime<Utc>>,

    /// Best-effort generated remark.
    pub commentary: Option<Commentary>,
}

/// One product line within a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    /// Line ID.
    pub id: ItemId,

    /// Owning transaction.
    pub transaction_id: TransactionId,

    /// Referenced product.
    pub product_id: ProductId,

    /// Units on this line, always at least 1.
    pub quantity: u32,

    /// Price captured when the line was created.
    pub unit_price: i64,
}

impl TransactionItem {
    /// `unit_price * quantity`, or `None` if it does not fit in an `i64`.
    #[must_use]
    pub fn checked_extension(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }

    /// `unit_price * quantity`, saturating.
    ///
    /// Lines on a cart accepted by [`Cart`] never saturate.
    #[must_use]
    pub fn extension(&self) -> i64 {
        self.checked_extension().unwrap_or(i64::MAX)
    }
}

/// A stock change produced by finalizing a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    /// Product whose stock changes.
    pub product_id: ProductId,
    /// Signed change in units.
    pub delta: i64,
}

/// A transaction together with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Header.
    #[serde(flatten)]
    pub transaction: Transaction,

    /// Line items in insertion order.
    pub items: Vec<TransactionItem>,
}

impl Cart {
    /// Open an empty pending cart.
    #[must_use]
    pub fn open(direction: Direction) -> Self {
        Self {
            transaction: Transaction {
                id: TransactionId::generate(),
                direction,
                status: TransactionStatus::Pending,
                total_amount: 0,
                created_at: Utc::now(),
                completed_at: None,
                commentary: None,
            },
            items: Vec::new(),
        }
    }

    /// Transaction ID.
    #[must_use]
    pub const fn id(&self) -> TransactionId {
        self.transaction.id
    }

    /// Transaction direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.transaction.direction
    }

    /// Transaction status.
    #[must_use]
    pub const fn status(&self) -> TransactionStatus {
        self.transaction.status
    }

    /// Whether the cart still accepts item mutations.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.transaction.status == TransactionStatus::Pending
    }

    /// Look up a line by ID.
    #[must_use]
    pub fn item(&self, item_id: ItemId) -> Option<&TransactionItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn line_for(&self, product_id: ProductId) -> Option<&TransactionItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Sum of line extensions over the current items, saturating.
    #[must_use]
    pub fn computed_total(&self) -> i64 {
        checked_total(&self.items).unwrap_or(i64::MAX)
    }

    /// Reject the call unless the cart is pending.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidState` for a completed cart.
    pub fn ensure_pending(&self) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(CartError::InvalidState {
                id: self.id().to_string(),
                status: self.status(),
            })
        }
    }

    /// Add `quantity` units of `product`.
    ///
    /// An existing line for the product is incremented in place; otherwise a new line is
    /// created with the price for this cart's direction. Returns the affected line's ID.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidState` if the cart is not pending.
    /// - `CartError::Validation` if `quantity` is zero or the line or total would overflow.
    pub fn add_product(&mut self, product: &Product, quantity: u32) -> Result<ItemId> {
        self.ensure_pending()?;
        validate_quantity(quantity)?;

        let mut items = self.items.clone();
        let existing = items.iter().position(|i| i.product_id == product.id);
        let item_id = match existing {
            Some(index) => {
                let line = &mut items[index];
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| CartError::Validation("quantity too large".into()))?;
                line.id
            }
            None => {
                let line = TransactionItem {
                    id: ItemId::generate(),
                    transaction_id: self.id(),
                    product_id: product.id,
                    quantity,
                    unit_price: product.unit_price_for(self.direction()),
                };
                let id = line.id;
                items.push(line);
                id
            }
        };

        self.commit(items)?;
        Ok(item_id)
    }

    /// Set a line's quantity to an exact, positive value.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidState` if the cart is not pending.
    /// - `CartError::Validation` if `quantity` is zero or the total would overflow.
    /// - `CartError::NotFound` if the line is not on this cart.
    pub fn set_quantity(&mut self, item_id: ItemId, quantity: u32) -> Result<()> {
        self.ensure_pending()?;
        validate_quantity(quantity)?;

        let mut items = self.items.clone();
        let line = items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| CartError::not_found("item", item_id))?;
        line.quantity = quantity;

        self.commit(items)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidState` if the cart is not pending.
    /// - `CartError::NotFound` if the line is not on this cart.
    pub fn remove_item(&mut self, item_id: ItemId) -> Result<TransactionItem> {
        self.ensure_pending()?;

        let index = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| CartError::not_found("item", item_id))?;
        let removed = self.items.remove(index);

        self.recompute_total();
        Ok(removed)
    }

    /// Mark the cart completed and return the stock changes it implies.
    ///
    /// The caller must persist the returned adjustments and the completed cart in one
    /// atomic write. Each product appears at most once in the result.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidState` if the cart is not pending.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<Vec<StockAdjustment>> {
        self.ensure_pending()?;

        let direction = self.direction();
        let mut deltas: BTreeMap<ProductId, i64> = BTreeMap::new();
        for line in &self.items {
            *deltas.entry(line.product_id).or_insert(0) += direction.stock_delta(line.quantity);
        }

        self.recompute_total();
        self.transaction.status = TransactionStatus::Completed;
        self.transaction.completed_at = Some(now);

        Ok(deltas
            .into_iter()
            .map(|(product_id, delta)| StockAdjustment { product_id, delta })
            .collect())
    }

    /// Reject the call while the cart is still pending.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidState` for a pending cart.
    pub fn ensure_completed(&self) -> Result<()> {
        if self.is_pending() {
            return Err(CartError::InvalidState {
                id: self.id().to_string(),
                status: self.status(),
            });
        }
        Ok(())
    }

    /// Check that the cart may be discarded.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidState` for a completed cart; discarding it would need a
    /// refund path that reverses stock.
    pub fn ensure_discardable(&self) -> Result<()> {
        self.ensure_pending()
    }

    /// Attach generated commentary to a completed cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidState` while the cart is still pending.
    pub fn attach_commentary(&mut self, commentary: Commentary) -> Result<()> {
        self.ensure_completed()?;
        self.transaction.commentary = Some(commentary);
        Ok(())
    }

    fn recompute_total(&mut self) {
        self.transaction.total_amount = self.computed_total();
    }

    /// Replace the lines if their total is representable; otherwise leave the cart as is.
    fn commit(&mut self, items: Vec<TransactionItem>) -> Result<()> {
        let total = checked_total(&items)
            .ok_or_else(|| CartError::Validation("cart total is too large".into()))?;
        self.items = items;
        self.transaction.total_amount = total;
        Ok(())
    }
}

fn checked_total(items: &[TransactionItem]) -> Option<i64> {
    items.iter().try_fold(0i64, |total, line| {
        total.checked_add(line.checked_extension()?)
    })
}

fn validate_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(CartError::Validation(
            "quantity must be a positive integer".into(),
        ));
    }
    Ok(())
}
