//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};
use tracing::debug;

use warung_core::{Cart, Product, ProductId, ProductPatch, TransactionId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{paginate, CartMutation, Store, TransactionFilter, TransactionPage};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes read-modify-write sequences so concurrent finalizes cannot lose stock
    /// updates and two edits of one cart cannot interleave.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn require_product(&self, id: &ProductId) -> Result<Product> {
        self.get_product(id)?
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    fn require_cart(&self, id: &TransactionId) -> Result<Cart> {
        self.get_cart(id)?
            .ok_or_else(|| StoreError::not_found("transaction", id))
    }

    fn barcode_owner(&self, barcode: &str) -> Result<Option<ProductId>> {
        let cf = self.cf(cf::PRODUCTS_BY_BARCODE)?;
        self.db
            .get_cf(&cf, keys::barcode_key(barcode))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_cart(&self, cart: &Cart) -> Result<()> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        let value = Self::serialize(cart)?;
        self.db
            .put_cf(&cf, keys::transaction_key(&cart.id()), value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Product Operations
    // =========================================================================

    fn list_products(&self) -> Result<Vec<Product>> {
        let cf = self.cf(cf::PRODUCTS)?;
        let mut products = self
            .db
            .iterator_cf(&cf, IteratorMode::Start)
            .map(|item| {
                let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
                Self::deserialize::<Product>(&value)
            })
            .collect::<Result<Vec<_>>>()?;

        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let cf = self.cf(cf::PRODUCTS)?;
        let key = keys::product_key(id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        match self.barcode_owner(barcode)? {
            Some(id) => self.get_product(&id),
            None => Ok(None),
        }
    }

    fn insert_product(&self, product: &Product) -> Result<()> {
        let _guard = self.lock()?;

        if self.barcode_owner(&product.barcode)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "barcode already exists: {}",
                product.barcode
            )));
        }

        let cf_products = self.cf(cf::PRODUCTS)?;
        let cf_barcode = self.cf(cf::PRODUCTS_BY_BARCODE)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_products, keys::product_key(&product.id), Self::serialize(product)?);
        batch.put_cf(
            &cf_barcode,
            keys::barcode_key(&product.barcode),
            Self::serialize(&product.id)?,
        );
        self.write(batch)
    }

    fn update_product(&self, id: &ProductId, patch: ProductPatch) -> Result<Product> {
        let _guard = self.lock()?;

        let mut product = self.require_product(id)?;
        let old_barcode = product.barcode.clone();
        product.apply(patch)?;

        let cf_products = self.cf(cf::PRODUCTS)?;
        let cf_barcode = self.cf(cf::PRODUCTS_BY_BARCODE)?;
        let mut batch = WriteBatch::default();

        if product.barcode != old_barcode {
            if let Some(owner) = self.barcode_owner(&product.barcode)? {
                if owner != *id {
                    return Err(StoreError::Conflict(format!(
                        "barcode already exists: {}",
                        product.barcode
                    )));
                }
            }
            batch.delete_cf(&cf_barcode, keys::barcode_key(&old_barcode));
            batch.put_cf(
                &cf_barcode,
                keys::barcode_key(&product.barcode),
                Self::serialize(id)?,
            );
        }

        batch.put_cf(&cf_products, keys::product_key(id), Self::serialize(&product)?);
        self.write(batch)?;

        Ok(product)
    }

    fn delete_product(&self, id: &ProductId) -> Result<()> {
        let _guard = self.lock()?;

        let product = self.require_product(id)?;
        let cf_products = self.cf(cf::PRODUCTS)?;
        let cf_barcode = self.cf(cf::PRODUCTS_BY_BARCODE)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_products, keys::product_key(id));
        batch.delete_cf(&cf_barcode, keys::barcode_key(&product.barcode));
        self.write(batch)
    }

    // =========================================================================
    // Cart Operations
    // =========================================================================

    fn insert_cart(&self, cart: &Cart) -> Result<()> {
        let _guard = self.lock()?;
        self.put_cart(cart)
    }

    fn get_cart(&self, id: &TransactionId) -> Result<Option<Cart>> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        let key = keys::transaction_key(id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_carts(&self, filter: &TransactionFilter) -> Result<TransactionPage> {
        let cf = self.cf(cf::TRANSACTIONS)?;

        // ULID keys: iterating from the end gives newest first
        let carts = self
            .db
            .iterator_cf(&cf, IteratorMode::End)
            .map(|item| {
                let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
                Self::deserialize::<Cart>(&value)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(paginate(carts.into_iter(), filter))
    }

    fn modify_cart(&self, id: &TransactionId, mutation: CartMutation<'_>) -> Result<Cart> {
        let _guard = self.lock()?;

        let mut cart = self.require_cart(id)?;
        mutation(&mut cart)?;
        self.put_cart(&cart)?;

        Ok(cart)
    }

    fn delete_pending_cart(&self, id: &TransactionId) -> Result<Cart> {
        let _guard = self.lock()?;

        let cart = self.require_cart(id)?;
        cart.ensure_discardable()?;

        let cf = self.cf(cf::TRANSACTIONS)?;
        self.db
            .delete_cf(&cf, keys::transaction_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(cart)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn finalize_cart(&self, id: &TransactionId, now: DateTime<Utc>) -> Result<Cart> {
        let _guard = self.lock()?;

        let mut cart = self.require_cart(id)?;
        let adjustments = cart.finalize(now)?;

        let cf_products = self.cf(cf::PRODUCTS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let mut batch = WriteBatch::default();

        for adjustment in &adjustments {
            let mut product = self.require_product(&adjustment.product_id)?;
            product.adjust_stock(adjustment.delta, now)?;
            batch.put_cf(
                &cf_products,
                keys::product_key(&product.id),
                Self::serialize(&product)?,
            );
        }
        batch.put_cf(&cf_tx, keys::transaction_key(id), Self::serialize(&cart)?);

        // Write atomically
        self.write(batch)?;

        debug!(
            transaction_id = %id,
            adjusted_products = adjustments.len(),
            "Cart finalized"
        );
        Ok(cart)
    }
}
