//! Printable receipt view of a transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, Direction};
use crate::product::Product;
use crate::ProductId;

/// Shop identity printed at the top of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopInfo {
    /// Shop name.
    pub name: String,
    /// Street address.
    pub address: String,
}

/// Receipt heading: `SALE` for outgoing, `PURCHASE` for incoming goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReceiptKind {
    /// Customer sale.
    Sale,
    /// Supplier purchase.
    Purchase,
}

impl From<Direction> for ReceiptKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Out => Self::Sale,
            Direction::In => Self::Purchase,
        }
    }
}

/// One printed line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    /// Product name, or the product ID if it has since been deleted.
    pub name: String,
    /// Units.
    pub quantity: u32,
    /// Price per unit captured on the line.
    pub unit_price: i64,
    /// `unit_price * quantity`.
    pub total: i64,
}

/// Read-only projection of a cart for printing. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Shop name.
    pub shop_name: String,
    /// Shop address.
    pub address: String,
    /// Completion time, or creation time for a cart still pending.
    pub date: DateTime<Utc>,
    /// `TXN-YYYYMMDD-XXXX`.
    pub receipt_number: String,
    /// Sale or purchase.
    #[serde(rename = "type")]
    pub kind: ReceiptKind,
    /// Printed lines.
    pub items: Vec<ReceiptLine>,
    /// Grand total.
    pub total: i64,
    /// Commentary sentence, if one was attached.
    pub commentary: Option<String>,
}

impl Receipt {
    /// Project `cart` into a receipt, resolving product names from `products`.
    #[must_use]
    pub fn build(cart: &Cart, products: &HashMap<ProductId, Product>, shop: &ShopInfo) -> Self {
        let tx = &cart.transaction;
        let items = cart
            .items
            .iter()
            .map(|line| ReceiptLine {
                name: products
                    .get(&line.product_id)
                    .map_or_else(|| line.product_id.to_string(), |p| p.name.clone()),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total: line.extension(),
            })
            .collect();

        Self {
            shop_name: shop.name.clone(),
            address: shop.address.clone(),
            date: tx.completed_at.unwrap_or(tx.created_at),
            receipt_number: receipt_number(cart),
            kind: tx.direction.into(),
            items,
            total: tx.total_amount,
            commentary: tx.commentary.as_ref().map(|c| c.sentence.clone()),
        }
    }
}

/// Creation date plus the first four characters of the transaction ID.
#[must_use]
pub fn receipt_number(cart: &Cart) -> String {
    let id = cart.id().to_string();
    let suffix: String = id.chars().take(4).collect::<String>().to_uppercase();
    format!(
        "TXN-{}-{suffix}",
        cart.transaction.created_at.format("%Y%m%d")
    )
}
