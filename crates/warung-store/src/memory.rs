//! In-memory storage implementation.
//!
//! Same semantics as [`RocksStore`](crate::RocksStore) without persistence. Every write
//! holds the single `RwLock` for its whole read-modify-write sequence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use warung_core::{Cart, Product, ProductId, ProductPatch, TransactionId};

use crate::error::{Result, StoreError};
use crate::{paginate, CartMutation, Store, TransactionFilter, TransactionPage};

#[derive(Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    barcodes: HashMap<String, ProductId>,
    carts: BTreeMap<TransactionId, Cart>,
}

/// Volatile `Store` for tests and demo runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn list_products(&self) -> Result<Vec<Product>> {
        let tables = self.read()?;
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.read()?.products.get(id).cloned())
    }

    fn get_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let tables = self.read()?;
        Ok(tables
            .barcodes
            .get(barcode)
            .and_then(|id| tables.products.get(id))
            .cloned())
    }

    fn insert_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.write()?;
        if tables.barcodes.contains_key(&product.barcode) {
            return Err(StoreError::Conflict(format!(
                "barcode already exists: {}",
                product.barcode
            )));
        }
        tables.barcodes.insert(product.barcode.clone(), product.id);
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    fn update_product(&self, id: &ProductId, patch: ProductPatch) -> Result<Product> {
        let mut tables = self.write()?;
        let mut product = tables
            .products
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("product", id))?;
        let old_barcode = product.barcode.clone();
        product.apply(patch)?;

        if product.barcode != old_barcode {
            if tables.barcodes.get(&product.barcode).is_some_and(|owner| owner != id) {
                return Err(StoreError::Conflict(format!(
                    "barcode already exists: {}",
                    product.barcode
                )));
            }
            tables.barcodes.remove(&old_barcode);
            tables.barcodes.insert(product.barcode.clone(), *id);
        }
        tables.products.insert(*id, product.clone());
        Ok(product)
    }

    fn delete_product(&self, id: &ProductId) -> Result<()> {
        let mut tables = self.write()?;
        let product = tables
            .products
            .remove(id)
            .ok_or_else(|| StoreError::not_found("product", id))?;
        tables.barcodes.remove(&product.barcode);
        Ok(())
    }

    fn insert_cart(&self, cart: &Cart) -> Result<()> {
        self.write()?.carts.insert(cart.id(), cart.clone());
        Ok(())
    }

    fn get_cart(&self, id: &TransactionId) -> Result<Option<Cart>> {
        Ok(self.read()?.carts.get(id).cloned())
    }

    fn list_carts(&self, filter: &TransactionFilter) -> Result<TransactionPage> {
        let tables = self.read()?;
        Ok(paginate(tables.carts.values().rev().cloned(), filter))
    }

    fn modify_cart(&self, id: &TransactionId, mutation: CartMutation<'_>) -> Result<Cart> {
        let mut tables = self.write()?;
        let mut cart = tables
            .carts
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("transaction", id))?;
        mutation(&mut cart)?;
        tables.carts.insert(*id, cart.clone());
        Ok(cart)
    }

    fn delete_pending_cart(&self, id: &TransactionId) -> Result<Cart> {
        let mut tables = self.write()?;
        let cart = tables
            .carts
            .get(id)
            .ok_or_else(|| StoreError::not_found("transaction", id))?;
        cart.ensure_discardable()?;
        tables
            .carts
            .remove(id)
            .ok_or_else(|| StoreError::not_found("transaction", id))
    }

    fn finalize_cart(&self, id: &TransactionId, now: DateTime<Utc>) -> Result<Cart> {
        let mut tables = self.write()?;
        let mut cart = tables
            .carts
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("transaction", id))?;
        let adjustments = cart.finalize(now)?;

        // Adjust copies so a missing product or an out-of-range level changes nothing
        let mut adjusted = Vec::with_capacity(adjustments.len());
        for adjustment in &adjustments {
            let mut product = tables
                .products
                .get(&adjustment.product_id)
                .cloned()
                .ok_or_else(|| StoreError::not_found("product", adjustment.product_id))?;
            product.adjust_stock(adjustment.delta, now)?;
            adjusted.push(product);
        }

        for product in adjusted {
            tables.products.insert(product.id, product);
        }
        tables.carts.insert(*id, cart.clone());
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warung_core::{CartError, Direction, NewProduct};

    fn product(barcode: &str, stock: i64) -> Product {
        Product::new(NewProduct {
            barcode: barcode.into(),
            name: format!("Product {barcode}"),
            category: "Snack".into(),
            buy_price: 1000,
            sell_price: 1500,
            stock: Some(stock),
            ..NewProduct::default()
        })
        .unwrap()
    }

    #[test]
    fn purchase_finalize_increases_stock() {
        let store = MemoryStore::new();
        let p = product("1", 3);
        store.insert_product(&p).unwrap();

        let cart = Cart::open(Direction::In);
        store.insert_cart(&cart).unwrap();
        store
            .modify_cart(&cart.id(), &mut |c| c.add_product(&p, 4).map(|_| ()))
            .unwrap();
        store.finalize_cart(&cart.id(), Utc::now()).unwrap();

        assert_eq!(store.get_product(&p.id).unwrap().unwrap().stock, 7);
    }

    #[test]
    fn missing_product_blocks_finalize() {
        let store = MemoryStore::new();
        let a = product("1", 3);
        let b = product("2", 3);
        store.insert_product(&a).unwrap();
        store.insert_product(&b).unwrap();

        let cart = Cart::open(Direction::Out);
        store.insert_cart(&cart).unwrap();
        store
            .modify_cart(&cart.id(), &mut |c| {
                c.add_product(&a, 1)?;
                c.add_product(&b, 1)?;
                Ok(())
            })
            .unwrap();
        store.delete_product(&b.id).unwrap();

        let result = store.finalize_cart(&cart.id(), Utc::now());
        assert!(matches!(result, Err(StoreError::NotFound { entity: "product", .. })));
        assert_eq!(store.get_product(&a.id).unwrap().unwrap().stock, 3);
        assert!(store.get_cart(&cart.id()).unwrap().unwrap().is_pending());
    }

    #[test]
    fn stock_overflow_blocks_finalize() {
        let store = MemoryStore::new();
        let a = product("1", 3);
        let b = product("2", i64::MAX - 1);
        store.insert_product(&a).unwrap();
        store.insert_product(&b).unwrap();

        let cart = Cart::open(Direction::In);
        store.insert_cart(&cart).unwrap();
        store
            .modify_cart(&cart.id(), &mut |c| {
                c.add_product(&a, 1)?;
                c.add_product(&b, 2)?;
                Ok(())
            })
            .unwrap();

        let result = store.finalize_cart(&cart.id(), Utc::now());
        assert!(matches!(
            result,
            Err(StoreError::Rejected(CartError::Validation(_)))
        ));
        assert_eq!(store.get_product(&a.id).unwrap().unwrap().stock, 3);
        assert!(store.get_cart(&cart.id()).unwrap().unwrap().is_pending());

        // Still writable afterwards
        store.insert_cart(&Cart::open(Direction::Out)).unwrap();
    }

    #[test]
    fn completed_cart_cannot_be_discarded() {
        let store = MemoryStore::new();
        let cart = Cart::open(Direction::Out);
        store.insert_cart(&cart).unwrap();
        store.finalize_cart(&cart.id(), Utc::now()).unwrap();

        assert!(matches!(
            store.delete_pending_cart(&cart.id()),
            Err(StoreError::Rejected(CartError::InvalidState { .. }))
        ));
    }

    #[test]
    fn unknown_cart_is_not_found() {
        let store = MemoryStore::new();
        let id = TransactionId::generate();
        assert!(matches!(
            store.modify_cart(&id, &mut |_| Ok(())),
            Err(StoreError::NotFound { entity: "transaction", .. })
        ));
    }
}
