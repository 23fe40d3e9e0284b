//! Cart lifecycle orchestration.
//!
//! `CartService` is the only writer of cart aggregates. Each operation runs one store
//! read-modify-write and then publishes the resulting cart on the event bus, so every
//! subscriber sees the same authoritative state the caller got back.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use warung_core::{
    Cart, Commentary, Direction, ItemId, Product, ProductId, ProductRef, Receipt, ShopInfo,
    TransactionId, TransactionItem,
};
use warung_store::{Result, Store, StoreError, TransactionFilter, TransactionPage};

use crate::ai::CommentaryGenerator;
use crate::events::{CartEvent, CartEventKind, EventBus};

/// Name used for lines whose product has since been deleted.
const UNKNOWN_PRODUCT: &str = "Produk";

/// Transaction aggregate manager.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
    events: EventBus,
    commentary: Arc<dyn CommentaryGenerator>,
    auto_commentary: bool,
}

impl CartService {
    /// Create a service over `store`.
    ///
    /// With `auto_commentary`, finalizing a non-empty sale schedules commentary generation
    /// in the background.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        commentary: Arc<dyn CommentaryGenerator>,
        auto_commentary: bool,
    ) -> Self {
        Self {
            store,
            events: EventBus::new(),
            commentary,
            auto_commentary,
        }
    }

    /// The bus carrying this service's cart events.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Open an empty pending cart.
    pub fn open(&self, direction: Direction) -> Result<Cart> {
        let cart = Cart::open(direction);
        self.store.insert_cart(&cart)?;

        tracing::info!(transaction_id = %cart.id(), direction = %direction, "Cart opened");
        self.publish(CartEventKind::Opened, &cart);
        Ok(cart)
    }

    /// Load a cart.
    pub fn get(&self, id: TransactionId) -> Result<Cart> {
        self.store
            .get_cart(&id)?
            .ok_or_else(|| StoreError::not_found("transaction", id))
    }

    /// List carts, newest first.
    pub fn list(&self, filter: &TransactionFilter) -> Result<TransactionPage> {
        self.store.list_carts(filter)
    }

    /// Add `quantity` units of a product, accumulating onto an existing line.
    ///
    /// Returns the affected line and the updated cart.
    pub fn add_item(
        &self,
        id: TransactionId,
        product: &ProductRef,
        quantity: u32,
    ) -> Result<(TransactionItem, Cart)> {
        // Surface a missing cart before a missing product.
        self.get(id)?;
        let product = self.resolve(product)?;

        let mut item_id = None;
        let cart = self.store.modify_cart(&id, &mut |cart| {
            item_id = Some(cart.add_product(&product, quantity)?);
            Ok(())
        })?;

        let item = item_id
            .and_then(|item_id| cart.item(item_id).cloned())
            .ok_or_else(|| StoreError::not_found("item", product.id))?;

        tracing::debug!(
            transaction_id = %id,
            product_id = %product.id,
            quantity = item.quantity,
            total = cart.transaction.total_amount,
            "Item added"
        );
        self.publish(CartEventKind::ItemAdded, &cart);
        Ok((item, cart))
    }

    /// Set a line's quantity.
    pub fn set_quantity(
        &self,
        id: TransactionId,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<(TransactionItem, Cart)> {
        let cart = self
            .store
            .modify_cart(&id, &mut |cart| cart.set_quantity(item_id, quantity))?;

        let item = cart
            .item(item_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("item", item_id))?;

        self.publish(CartEventKind::ItemUpdated, &cart);
        Ok((item, cart))
    }

    /// Remove a line.
    pub fn remove_item(&self, id: TransactionId, item_id: ItemId) -> Result<Cart> {
        let cart = self
            .store
            .modify_cart(&id, &mut |cart| cart.remove_item(item_id).map(|_| ()))?;

        self.publish(CartEventKind::ItemRemoved, &cart);
        Ok(cart)
    }

    /// Complete a cart and apply its stock changes atomically.
    ///
    /// Commentary for a sale is scheduled afterwards when enabled; its outcome never
    /// affects the result of this call.
    pub fn finalize(&self, id: TransactionId) -> Result<Cart> {
        let cart = self.store.finalize_cart(&id, Utc::now())?;

        tracing::info!(
            transaction_id = %id,
            direction = %cart.direction(),
            items = cart.items.len(),
            total = cart.transaction.total_amount,
            "Cart finalized"
        );
        self.publish(CartEventKind::Finalized, &cart);

        if self.auto_commentary && wants_commentary(&cart) {
            self.spawn_commentary(id);
        }
        Ok(cart)
    }

    /// Delete a pending cart. Completed carts cannot be discarded.
    pub fn discard(&self, id: TransactionId) -> Result<Cart> {
        let cart = self.store.delete_pending_cart(&id)?;

        tracing::info!(transaction_id = %id, "Cart discarded");
        self.events.publish(CartEvent::discarded(id));
        Ok(cart)
    }

    /// Generate commentary for a completed sale and attach it.
    ///
    /// Returns `None` for purchases and empty carts.
    pub async fn generate_commentary(&self, id: TransactionId) -> Result<Option<Commentary>> {
        let cart = self.get(id)?;
        cart.ensure_completed()?;
        if !wants_commentary(&cart) {
            return Ok(None);
        }

        let items = self.describe_items(&cart)?;
        let commentary = self.commentary.generate(&items, id).await?;

        let cart = self.store.modify_cart(&id, &mut |cart| {
            cart.attach_commentary(commentary.clone())
        })?;

        self.publish(CartEventKind::Commentary, &cart);
        Ok(Some(commentary))
    }

    /// Printable receipt for a cart.
    pub fn receipt(&self, id: TransactionId, shop: &ShopInfo) -> Result<Receipt> {
        let cart = self.get(id)?;
        let products = self.products_for(&cart)?;
        Ok(Receipt::build(&cart, &products, shop))
    }

    fn resolve(&self, product: &ProductRef) -> Result<Product> {
        let found = match product {
            ProductRef::Id(id) => self.store.get_product(id)?,
            ProductRef::Barcode(code) => self.store.get_product_by_barcode(code)?,
        };
        found.ok_or_else(|| StoreError::not_found("product", product))
    }

    fn products_for(&self, cart: &Cart) -> Result<HashMap<ProductId, Product>> {
        let mut products = HashMap::new();
        for line in &cart.items {
            if products.contains_key(&line.product_id) {
                continue;
            }
            if let Some(product) = self.store.get_product(&line.product_id)? {
                products.insert(product.id, product);
            }
        }
        Ok(products)
    }

    fn describe_items(&self, cart: &Cart) -> Result<Vec<String>> {
        let products = self.products_for(cart)?;
        Ok(cart
            .items
            .iter()
            .map(|line| {
                let name = products
                    .get(&line.product_id)
                    .map_or(UNKNOWN_PRODUCT, |p| p.name.as_str());
                format!("{name} ({})", line.quantity)
            })
            .collect())
    }

    fn spawn_commentary(&self, id: TransactionId) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(transaction_id = %id, "No runtime, skipping commentary");
            return;
        };

        let service = self.clone();
        handle.spawn(async move {
            if let Err(e) = service.generate_commentary(id).await {
                tracing::warn!(
                    transaction_id = %id,
                    error = %e,
                    "Commentary generation failed"
                );
            }
        });
    }

    fn publish(&self, kind: CartEventKind, cart: &Cart) {
        self.events.publish(CartEvent::new(kind, cart));
    }
}

fn wants_commentary(cart: &Cart) -> bool {
    cart.direction() == Direction::Out && !cart.items.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use warung_core::{CartError, NewProduct, TransactionStatus};
    use warung_store::MemoryStore;

    use crate::ai::NoCommentary;

    struct Canned;

    #[async_trait]
    impl CommentaryGenerator for Canned {
        async fn generate(
            &self,
            items: &[String],
            _transaction_id: TransactionId,
        ) -> std::result::Result<Commentary, CartError> {
            Ok(Commentary {
                sentence: format!("Beli {}?", items.join(", ")),
                tts: None,
                audio_url: None,
            })
        }
    }

    fn service_with(generator: Arc<dyn CommentaryGenerator>) -> (CartService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = CartService::new(store.clone(), generator, false);
        (service, store)
    }

    fn seed(store: &MemoryStore, barcode: &str, name: &str, sell: i64, stock: i64) -> Product {
        let product = Product::new(NewProduct {
            barcode: barcode.into(),
            name: name.into(),
            category: "Sembako".into(),
            buy_price: sell - 1000,
            sell_price: sell,
            stock: Some(stock),
            ..NewProduct::default()
        })
        .unwrap();
        store.insert_product(&product).unwrap();
        product
    }

    fn rejected(err: &StoreError) -> Option<&CartError> {
        match err {
            StoreError::Rejected(e) => Some(e),
            _ => None,
        }
    }

    #[test]
    fn sale_end_to_end() {
        let (service, store) = service_with(Arc::new(NoCommentary));
        let indomie = seed(&store, "899001", "Indomie Goreng", 3500, 10);

        let cart = service.open(Direction::Out).unwrap();
        let barcode = ProductRef::Barcode("899001".into());

        let (first, _) = service.add_item(cart.id(), &barcode, 1).unwrap();
        let (second, cart_after) = service.add_item(cart.id(), &barcode, 1).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 2);
        assert_eq!(cart_after.items.len(), 1);
        assert_eq!(cart_after.transaction.total_amount, 7000);

        let done = service.finalize(cart.id()).unwrap();
        assert_eq!(done.status(), TransactionStatus::Completed);
        assert_eq!(store.get_product(&indomie.id).unwrap().unwrap().stock, 8);

        let err = service.add_item(cart.id(), &barcode, 1).unwrap_err();
        assert!(matches!(rejected(&err), Some(CartError::InvalidState { .. })));
        let err = service.discard(cart.id()).unwrap_err();
        assert!(matches!(rejected(&err), Some(CartError::InvalidState { .. })));
        assert_eq!(store.get_product(&indomie.id).unwrap().unwrap().stock, 8);
    }

    #[test]
    fn unknown_barcode_reports_attempted_code() {
        let (service, _store) = service_with(Arc::new(NoCommentary));
        let cart = service.open(Direction::Out).unwrap();

        let err = service
            .add_item(cart.id(), &ProductRef::Barcode("BAD-CODE-1".into()), 1)
            .unwrap_err();
        match err {
            StoreError::NotFound { entity, id } => {
                assert_eq!(entity, "product");
                assert_eq!(id, "BAD-CODE-1");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(service.get(cart.id()).unwrap().items.is_empty());
    }

    #[test]
    fn purchase_increases_stock() {
        let (service, store) = service_with(Arc::new(NoCommentary));
        let aqua = seed(&store, "899002", "Aqua 600ml", 4000, 1);

        let cart = service.open(Direction::In).unwrap();
        let (item, _) = service.add_item(cart.id(), &ProductRef::Id(aqua.id), 12).unwrap();
        assert_eq!(item.unit_price, 3000);

        service.finalize(cart.id()).unwrap();
        assert_eq!(store.get_product(&aqua.id).unwrap().unwrap().stock, 13);
    }

    #[test]
    fn discard_has_no_stock_effect() {
        let (service, store) = service_with(Arc::new(NoCommentary));
        let aqua = seed(&store, "899002", "Aqua 600ml", 4000, 5);

        let cart = service.open(Direction::Out).unwrap();
        service.add_item(cart.id(), &ProductRef::Id(aqua.id), 2).unwrap();
        service.discard(cart.id()).unwrap();

        assert!(matches!(service.get(cart.id()), Err(StoreError::NotFound { .. })));
        assert_eq!(store.get_product(&aqua.id).unwrap().unwrap().stock, 5);
    }

    #[test]
    fn set_quantity_and_remove_recompute_total() {
        let (service, store) = service_with(Arc::new(NoCommentary));
        let a = seed(&store, "1", "Kopi Kapal Api", 2000, 10);
        let b = seed(&store, "2", "Gula Pasir", 15000, 10);

        let cart = service.open(Direction::Out).unwrap();
        let (line_a, _) = service.add_item(cart.id(), &ProductRef::Id(a.id), 1).unwrap();
        let (line_b, _) = service.add_item(cart.id(), &ProductRef::Id(b.id), 1).unwrap();

        let (updated, cart_now) = service.set_quantity(cart.id(), line_a.id, 3).unwrap();
        assert_eq!(updated.quantity, 3);
        assert_eq!(cart_now.transaction.total_amount, 21000);

        let cart_now = service.remove_item(cart.id(), line_b.id).unwrap();
        assert_eq!(cart_now.transaction.total_amount, 6000);

        let err = service.set_quantity(cart.id(), line_a.id, 0).unwrap_err();
        assert!(matches!(rejected(&err), Some(CartError::Validation(_))));
        assert_eq!(service.get(cart.id()).unwrap().transaction.total_amount, 6000);
    }

    #[tokio::test]
    async fn mutations_are_published_to_subscribers() {
        let (service, store) = service_with(Arc::new(NoCommentary));
        let a = seed(&store, "1", "Kopi Kapal Api", 2000, 10);
        let cart = service.open(Direction::Out).unwrap();

        let mut rx = service.events().subscribe(cart.id());
        service.add_item(cart.id(), &ProductRef::Id(a.id), 2).unwrap();
        service.finalize(cart.id()).unwrap();

        let added = rx.recv().await.unwrap();
        assert_eq!(added.kind, CartEventKind::ItemAdded);
        assert_eq!(added.cart.unwrap().transaction.total_amount, 4000);
        assert_eq!(rx.recv().await.unwrap().kind, CartEventKind::Finalized);
    }

    #[tokio::test]
    async fn commentary_is_attached_to_completed_sale() {
        let (service, store) = service_with(Arc::new(Canned));
        let a = seed(&store, "1", "Indomie Goreng", 3500, 10);
        let cart = service.open(Direction::Out).unwrap();
        service.add_item(cart.id(), &ProductRef::Id(a.id), 5).unwrap();

        let err = service.generate_commentary(cart.id()).await.unwrap_err();
        assert!(matches!(rejected(&err), Some(CartError::InvalidState { .. })));

        service.finalize(cart.id()).unwrap();
        let commentary = service.generate_commentary(cart.id()).await.unwrap().unwrap();
        assert_eq!(commentary.sentence, "Beli Indomie Goreng (5)?");

        let stored = service.get(cart.id()).unwrap();
        assert_eq!(stored.transaction.commentary, Some(commentary));
    }

    #[tokio::test]
    async fn commentary_skips_purchases_and_empty_sales() {
        let (service, store) = service_with(Arc::new(Canned));
        let a = seed(&store, "1", "Indomie Goreng", 3500, 10);

        let purchase = service.open(Direction::In).unwrap();
        service.add_item(purchase.id(), &ProductRef::Id(a.id), 1).unwrap();
        service.finalize(purchase.id()).unwrap();
        assert!(service.generate_commentary(purchase.id()).await.unwrap().is_none());

        let empty = service.open(Direction::Out).unwrap();
        service.finalize(empty.id()).unwrap();
        assert!(service.generate_commentary(empty.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commentary_failure_does_not_affect_finalize() {
        let store = Arc::new(MemoryStore::new());
        let service = CartService::new(store.clone(), Arc::new(NoCommentary), true);
        let a = seed(&store, "1", "Indomie Goreng", 3500, 10);

        let cart = service.open(Direction::Out).unwrap();
        service.add_item(cart.id(), &ProductRef::Id(a.id), 1).unwrap();
        let done = service.finalize(cart.id()).unwrap();
        assert_eq!(done.status(), TransactionStatus::Completed);

        tokio::task::yield_now().await;
        let stored = service.get(cart.id()).unwrap();
        assert_eq!(stored.status(), TransactionStatus::Completed);
        assert!(stored.transaction.commentary.is_none());
        assert_eq!(store.get_product(&a.id).unwrap().unwrap().stock, 9);
    }

    #[test]
    fn receipt_uses_current_names() {
        let (service, store) = service_with(Arc::new(NoCommentary));
        let a = seed(&store, "1", "Indomie Goreng", 3500, 10);
        let cart = service.open(Direction::Out).unwrap();
        service.add_item(cart.id(), &ProductRef::Id(a.id), 2).unwrap();

        let receipt = service
            .receipt(
                cart.id(),
                &ShopInfo {
                    name: "WARUNG".into(),
                    address: "Jl. Test".into(),
                },
            )
            .unwrap();
        assert_eq!(receipt.items[0].name, "Indomie Goreng");
        assert_eq!(receipt.total, 7000);
    }
}
