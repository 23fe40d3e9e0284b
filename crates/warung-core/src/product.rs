//! Catalog product types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::Direction;
use crate::error::{CartError, Result};
use crate::ProductId;

/// Low-stock threshold applied when a product is created without one.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// A catalog entry.
///
/// Prices are whole rupiah. `stock` is signed: concurrent sales may legitimately drive it
/// below zero and the ledger must still record them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Stable identifier.
    pub id: ProductId,

    /// Unique scan code.
    pub barcode: String,

    /// Display name.
    pub name: String,

    /// Category label used by the analytics breakdown.
    pub category: String,

    /// Cost price, captured on purchase (`IN`) lines.
    pub buy_price: i64,

    /// Sale price, captured on sale (`OUT`) lines.
    pub sell_price: i64,

    /// Units currently on hand.
    pub stock: i64,

    /// Stock at or below this value is reported as low.
    pub low_stock_threshold: i64,

    /// Free-text label the vision detector reports for this product.
    pub detection_label: Option<String>,

    /// Optional product image.
    pub image_url: Option<String>,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Build a product from creation input.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` if a required field is blank or a price is negative.
    pub fn new(input: NewProduct) -> Result<Self> {
        let barcode = required("barcode", &input.barcode)?;
        let name = required("name", &input.name)?;
        let category = required("category", &input.category)?;
        validate_price("buy_price", input.buy_price)?;
        validate_price("sell_price", input.sell_price)?;

        let now = Utc::now();
        Ok(Self {
            id: ProductId::generate(),
            barcode,
            name,
            category,
            buy_price: input.buy_price,
            sell_price: input.sell_price,
            stock: input.stock.unwrap_or(0),
            low_stock_threshold: input
                .low_stock_threshold
                .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
            detection_label: non_blank(input.detection_label),
            image_url: non_blank(input.image_url),
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` if the patch blanks a required field or sets a
    /// negative price. The product is left untouched on error.
    pub fn apply(&mut self, patch: ProductPatch) -> Result<()> {
        let mut next = self.clone();

        if let Some(barcode) = patch.barcode {
            next.barcode = required("barcode", &barcode)?;
        }
        if let Some(name) = patch.name {
            next.name = required("name", &name)?;
        }
        if let Some(category) = patch.category {
            next.category = required("category", &category)?;
        }
        if let Some(price) = patch.buy_price {
            validate_price("buy_price", price)?;
            next.buy_price = price;
        }
        if let Some(price) = patch.sell_price {
            validate_price("sell_price", price)?;
            next.sell_price = price;
        }
        if let Some(stock) = patch.stock {
            next.stock = stock;
        }
        if let Some(threshold) = patch.low_stock_threshold {
            next.low_stock_threshold = threshold;
        }
        if let Some(label) = patch.detection_label {
            next.detection_label = non_blank(Some(label));
        }
        if let Some(url) = patch.image_url {
            next.image_url = non_blank(Some(url));
        }

        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    /// Price snapshotted onto a new line for the given direction.
    #[must_use]
    pub const fn unit_price_for(&self, direction: Direction) -> i64 {
        match direction {
            Direction::Out => self.sell_price,
            Direction::In => self.buy_price,
        }
    }

    /// Apply a signed stock change recorded at `now`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` if the new level does not fit in an `i64`; the
    /// product is left unchanged.
    pub fn adjust_stock(&mut self, delta: i64, now: DateTime<Utc>) -> Result<()> {
        self.stock = self.stock.checked_add(delta).ok_or_else(|| {
            CartError::Validation(format!("stock of {} is out of range", self.name))
        })?;
        self.updated_at = now;
        Ok(())
    }

    /// Whether stock has fallen to the low-stock threshold.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.stock <= self.low_stock_threshold
    }

    /// Whether the configured detection label equals `label`, ignoring case.
    #[must_use]
    pub fn has_detection_label(&self, label: &str) -> bool {
        self.detection_label
            .as_deref()
            .is_some_and(|own| own.trim().eq_ignore_ascii_case(label.trim()))
    }

    /// Loose name match used when no detection label matches exactly.
    ///
    /// True when either lowercase string contains the other, or when any word of the
    /// product name appears inside the detected label.
    #[must_use]
    pub fn name_matches(&self, label: &str) -> bool {
        let detected = label.trim().to_lowercase();
        if detected.is_empty() {
            return false;
        }
        let name = self.name.to_lowercase();

        name.contains(&detected)
            || detected.contains(&name)
            || name.split_whitespace().any(|word| detected.contains(word))
    }
}

/// Pick the catalog product a detected label refers to.
///
/// An exact detection-label match wins over a loose name match. `products` should be in
/// display (name) order so the loose match is deterministic.
#[must_use]
pub fn match_label<'a>(products: &'a [Product], label: &str) -> Option<&'a Product> {
    products
        .iter()
        .find(|p| p.has_detection_label(label))
        .or_else(|| products.iter().find(|p| p.name_matches(label)))
}

/// Distinct detection labels across the catalog, sorted.
#[must_use]
pub fn detection_labels(products: &[Product]) -> Vec<String> {
    let mut labels: Vec<String> = products
        .iter()
        .filter_map(|p| p.detection_label.clone())
        .collect();
    labels.sort();
    labels.dedup();
    labels
}

/// How a caller names a product when adding it to a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductRef {
    /// By catalog ID.
    Id(ProductId),
    /// By scan code.
    Barcode(String),
}

impl std::fmt::Display for ProductRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Barcode(code) => f.write_str(code),
        }
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    /// Unique scan code.
    pub barcode: String,
    /// Display name.
    pub name: String,
    /// Category label.
    pub category: String,
    /// Cost price.
    pub buy_price: i64,
    /// Sale price.
    pub sell_price: i64,
    /// Initial stock (default 0).
    pub stock: Option<i64>,
    /// Low-stock threshold (default 5).
    pub low_stock_threshold: Option<i64>,
    /// Vision detection label.
    pub detection_label: Option<String>,
    /// Product image.
    pub image_url: Option<String>,
}

/// Partial product update. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    /// New scan code.
    pub barcode: Option<String>,
    /// New display name.
    pub name: Option<String>,
    /// New category.
    pub category: Option<String>,
    /// New cost price.
    pub buy_price: Option<i64>,
    /// New sale price.
    pub sell_price: Option<i64>,
    /// New stock level.
    pub stock: Option<i64>,
    /// New low-stock threshold.
    pub low_stock_threshold: Option<i64>,
    /// New detection label (empty string clears it).
    pub detection_label: Option<String>,
    /// New image URL (empty string clears it).
    pub image_url: Option<String>,
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CartError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn validate_price(field: &str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(CartError::Validation(format!("{field} must not be negative")));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, label: Option<&str>) -> Product {
        Product::new(NewProduct {
            barcode: format!("code-{name}"),
            name: name.into(),
            category: "Snack".into(),
            buy_price: 2500,
            sell_price: 3500,
            detection_label: label.map(Into::into),
            ..NewProduct::default()
        })
        .unwrap()
    }

    #[test]
    fn new_product_defaults() {
        let p = product("Indomie Goreng", None);
        assert_eq!(p.stock, 0);
        assert_eq!(p.low_stock_threshold, DEFAULT_LOW_STOCK_THRESHOLD);
        assert!(p.is_low_stock());
    }

    #[test]
    fn stock_adjustment_is_checked() {
        let mut p = product("Indomie Goreng", None);
        let now = Utc::now();
        p.adjust_stock(-3, now).unwrap();
        assert_eq!(p.stock, -3);
        assert_eq!(p.updated_at, now);

        p.stock = i64::MAX;
        assert!(matches!(p.adjust_stock(1, now), Err(CartError::Validation(_))));
        assert_eq!(p.stock, i64::MAX);
    }

    #[test]
    fn new_product_requires_name() {
        let err = Product::new(NewProduct {
            barcode: "1".into(),
            name: "  ".into(),
            category: "Mie".into(),
            ..NewProduct::default()
        })
        .unwrap_err();
        assert!(matches!(err, CartError::Validation(_)));
    }

    #[test]
    fn unit_price_follows_direction() {
        let p = product("Aqua 600ml", None);
        assert_eq!(p.unit_price_for(Direction::Out), 3500);
        assert_eq!(p.unit_price_for(Direction::In), 2500);
    }

    #[test]
    fn failed_patch_leaves_product_unchanged() {
        let mut p = product("Aqua 600ml", None);
        let before = p.clone();
        let err = p
            .apply(ProductPatch {
                name: Some("Aqua 1L".into()),
                sell_price: Some(-1),
                ..ProductPatch::default()
            })
            .unwrap_err();
        assert!(matches!(err, CartError::Validation(_)));
        assert_eq!(p, before);
    }

    #[test]
    fn detection_label_beats_name_match() {
        let products = vec![
            product("Botol Minum", None),
            product("Teh Botol Sosro", Some("bottle")),
        ];
        let matched = match_label(&products, "Bottle").unwrap();
        assert_eq!(matched.name, "Teh Botol Sosro");
    }

    #[test]
    fn name_match_uses_words() {
        let products = vec![product("Indomie Goreng", None)];
        assert!(match_label(&products, "indomie packet").is_some());
        assert!(match_label(&products, "laptop").is_none());
        assert!(match_label(&products, "   ").is_none());
    }

    #[test]
    fn detection_labels_are_distinct_and_sorted() {
        let products = vec![
            product("A", Some("tube")),
            product("B", Some("bottle")),
            product("C", Some("tube")),
            product("D", None),
        ];
        assert_eq!(detection_labels(&products), vec!["bottle", "tube"]);
    }
}
