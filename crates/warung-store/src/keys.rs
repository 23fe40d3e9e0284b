//! Key encoding utilities for `RocksDB`.

use warung_core::{ProductId, TransactionId};

/// Create a product key from a product ID.
#[must_use]
pub fn product_key(product_id: &ProductId) -> Vec<u8> {
    product_id.as_bytes().to_vec()
}

/// Create a barcode index key.
#[must_use]
pub fn barcode_key(barcode: &str) -> Vec<u8> {
    barcode.as_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
///
/// ULID bytes sort by creation time, so iterating the column family from the end yields
/// newest transactions first.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}
