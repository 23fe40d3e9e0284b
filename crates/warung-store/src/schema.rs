//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Catalog products, keyed by `product_id`.
    pub const PRODUCTS: &str = "products";

    /// Index: product by scan code, keyed by barcode. Value is the CBOR `ProductId`.
    pub const PRODUCTS_BY_BARCODE: &str = "products_by_barcode";

    /// Cart aggregates (transaction header plus line items), keyed by `transaction_id`
    /// (ULID).
    pub const TRANSACTIONS: &str = "transactions";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::PRODUCTS, cf::PRODUCTS_BY_BARCODE, cf::TRANSACTIONS]
}
