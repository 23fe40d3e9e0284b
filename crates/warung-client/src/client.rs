//! Warung HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use warung_core::{
    Cart, DetectResponse, Direction, ItemId, NewProduct, Product, ProductId, ProductPatch,
    ProductRef, Receipt, TransactionId,
};

use crate::error::ClientError;
use crate::types::{
    AddItemRequest, ApiErrorResponse, CommentaryResponse, CompleteResponse,
    CreateTransactionRequest, DetectRequest, ItemResponse, LabelsResponse, MatchRequest,
    MatchResponse, MessageResponse, ProductQuery, RemoveItemResponse, ScanAction, ScanApplied,
    ScanOutcome, TransactionList, TransactionQuery, UpdateItemRequest,
};

/// Warung API client.
///
/// Covers the catalog, cart lifecycle, vision proxy and label matching endpoints.
#[derive(Debug, Clone)]
pub struct WarungClient {
    client: Client,
    base_url: String,
}

impl WarungClient {
    /// Create a new warung client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the warung service (e.g., `"http://localhost:8000"`)
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a new warung client with custom options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    // ------------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------------

    /// List products, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, ClientError> {
        let url = format!("{}/api/products", self.base_url);
        let response = self.client.get(&url).query(query).send().await?;
        self.handle_response(response).await
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] for an unknown ID.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ClientError> {
        let url = format!("{}/api/products/{id}", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Fetch a product by scan code.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] for an unknown barcode.
    pub async fn get_product_by_barcode(&self, barcode: &str) -> Result<Product, ClientError> {
        let url = format!("{}/api/products/barcode/{barcode}", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the barcode is taken.
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, ClientError> {
        let url = format!("{}/api/products", self.base_url);
        let response = self.client.post(&url).json(product).send().await?;
        self.handle_response(response).await
    }

    /// Apply a partial update to a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is unknown or the update is invalid.
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, ClientError> {
        let url = format!("{}/api/products/{id}", self.base_url);
        let response = self.client.patch(&url).json(patch).send().await?;
        self.handle_response(response).await
    }

    // ------------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------------

    /// Open an empty pending cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn open_transaction(&self, direction: Direction) -> Result<Cart, ClientError> {
        let url = format!("{}/api/transactions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CreateTransactionRequest { direction })
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Fetch a cart with its lines.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] for an unknown ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Cart, ClientError> {
        let url = format!("{}/api/transactions/{id}", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// List carts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<TransactionList, ClientError> {
        let url = format!("{}/api/transactions", self.base_url);
        let response = self.client.get(&url).query(query).send().await?;
        self.handle_response(response).await
    }

    /// Add units of a product, merging into an existing line.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if the cart or product does not resolve, and
    /// [`ClientError::InvalidState`] if the cart is completed.
    pub async fn add_item(
        &self,
        transaction_id: TransactionId,
        product: &ProductRef,
        quantity: u32,
    ) -> Result<ItemResponse, ClientError> {
        let url = format!("{}/api/transactions/{transaction_id}/items", self.base_url);
        let request = match product {
            ProductRef::Id(id) => AddItemRequest {
                product_id: Some(id.to_string()),
                quantity,
                ..AddItemRequest::default()
            },
            ProductRef::Barcode(code) => AddItemRequest {
                barcode: Some(code.clone()),
                quantity,
                ..AddItemRequest::default()
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;
        self.handle_response(response).await
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not resolve or the cart is completed.
    pub async fn set_quantity(
        &self,
        transaction_id: TransactionId,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<ItemResponse, ClientError> {
        let url = format!(
            "{}/api/transactions/{transaction_id}/items/{item_id}",
            self.base_url
        );
        let response = self
            .client
            .patch(&url)
            .json(&UpdateItemRequest { quantity })
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Delete a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not resolve or the cart is completed.
    pub async fn remove_item(
        &self,
        transaction_id: TransactionId,
        item_id: ItemId,
    ) -> Result<RemoveItemResponse, ClientError> {
        let url = format!(
            "{}/api/transactions/{transaction_id}/items/{item_id}",
            self.base_url
        );
        let response = self.client.delete(&url).send().await?;
        self.handle_response(response).await
    }

    /// Finalize a cart and apply its stock effects.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] if the cart is already completed.
    pub async fn complete(&self, transaction_id: TransactionId) -> Result<Cart, ClientError> {
        let url = format!(
            "{}/api/transactions/{transaction_id}/complete",
            self.base_url
        );
        let response = self.client.post(&url).send().await?;
        self.handle_response::<CompleteResponse>(response)
            .await
            .map(|r| r.transaction)
    }

    /// Discard a pending cart.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] if the cart is completed.
    pub async fn discard(&self, transaction_id: TransactionId) -> Result<String, ClientError> {
        let url = format!("{}/api/transactions/{transaction_id}", self.base_url);
        let response = self.client.delete(&url).send().await?;
        self.handle_response::<MessageResponse>(response)
            .await
            .map(|r| r.message)
    }

    /// Generate commentary for a completed sale.
    ///
    /// All fields are `None` when the service skips or cannot produce a remark.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] if the cart is still pending.
    pub async fn generate_commentary(
        &self,
        transaction_id: TransactionId,
    ) -> Result<CommentaryResponse, ClientError> {
        let url = format!(
            "{}/api/transactions/{transaction_id}/commentary",
            self.base_url
        );
        let response = self.client.post(&url).send().await?;
        self.handle_response(response).await
    }

    /// Fetch the printable receipt for a cart.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] for an unknown ID.
    pub async fn receipt(&self, transaction_id: TransactionId) -> Result<Receipt, ClientError> {
        let url = format!(
            "{}/api/transactions/{transaction_id}/receipt",
            self.base_url
        );
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    // ------------------------------------------------------------------------
    // Vision
    // ------------------------------------------------------------------------

    /// Run object detection on a base64 frame.
    ///
    /// An empty `prompts` slice lets the service use the catalog's labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn detect(
        &self,
        image: &str,
        prompts: &[String],
    ) -> Result<DetectResponse, ClientError> {
        let url = format!("{}/api/ai/detect", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&DetectRequest { image, prompts })
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Resolve a detector label to a catalog product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn match_label(&self, label: &str) -> Result<Option<Product>, ClientError> {
        let url = format!("{}/api/ai/match", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&MatchRequest {
                detected_label: label,
            })
            .send()
            .await?;
        self.handle_response::<MatchResponse>(response)
            .await
            .map(|r| r.product.filter(|_| r.matched))
    }

    /// Distinct detection labels configured across the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn detection_labels(&self) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/api/ai/detection-labels", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response::<LabelsResponse>(response)
            .await
            .map(|r| r.labels)
    }

    /// Apply a scan outcome to a pending cart.
    ///
    /// `Add` posts one unit by barcode. `Cancel` decrements the product's line, deleting it
    /// at one unit; a cancel for a product that is not in `cart` sends nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn apply_scan(
        &self,
        transaction_id: TransactionId,
        outcome: &ScanOutcome,
        cart: &Cart,
    ) -> Result<ScanApplied, ClientError> {
        let Some(product) = &outcome.product else {
            tracing::debug!(label = %outcome.label, "Scan label matched no product");
            return Ok(ScanApplied::Unmatched);
        };

        match outcome.action {
            ScanAction::Add => {
                let code = ProductRef::Barcode(product.barcode.clone());
                self.add_item(transaction_id, &code, 1)
                    .await
                    .map(ScanApplied::Added)
            }
            ScanAction::Cancel => {
                let Some(line) = cart.line_for(product.id) else {
                    tracing::debug!(product = %product.name, "Cancel ignored, product not in cart");
                    return Ok(ScanApplied::NotInCart);
                };
                if line.quantity > 1 {
                    self.set_quantity(transaction_id, line.id, line.quantity - 1)
                        .await
                        .map(ScanApplied::Decremented)
                } else {
                    self.remove_item(transaction_id, line.id)
                        .await
                        .map(ScanApplied::Removed)
                }
            }
        }
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code;
                let message = api_error.error.message;

                match code.as_str() {
                    "not_found" => Err(ClientError::NotFound { message }),
                    "conflict" => Err(ClientError::InvalidState { message }),
                    _ => Err(ClientError::Api {
                        code,
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warung_core::TransactionItem;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::types::Zone;

    fn product() -> Product {
        Product::new(NewProduct {
            barcode: "8991002101234".into(),
            name: "Aqua 600ml".into(),
            category: "Minuman".into(),
            buy_price: 2500,
            sell_price: 3500,
            stock: Some(10),
            detection_label: Some("bottle".into()),
            ..NewProduct::default()
        })
        .unwrap()
    }

    fn cart_with(product: &Product, quantity: u32) -> Cart {
        let mut cart = Cart::open(Direction::Out);
        cart.items.push(TransactionItem {
            id: ItemId::generate(),
            transaction_id: cart.id(),
            product_id: product.id,
            quantity,
            unit_price: product.sell_price,
        });
        cart.transaction.total_amount = cart.computed_total();
        cart
    }

    fn outcome(product: Option<Product>, action: ScanAction) -> ScanOutcome {
        ScanOutcome {
            product,
            action,
            confidence: 0.9,
            zone: Zone::Outside,
            label: "bottle".into(),
        }
    }

    fn item_body(cart: &Cart) -> serde_json::Value {
        serde_json::json!({ "item": cart.items[0], "transaction": cart })
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = WarungClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
    }

    #[tokio::test]
    async fn not_found_maps_to_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/barcode/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": "not_found", "message": "product not found: nope"}
            })))
            .mount(&server)
            .await;

        let client = WarungClient::new(server.uri()).unwrap();
        let err = client.get_product_by_barcode("nope").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound { message } if message.contains("nope")));
    }

    #[tokio::test]
    async fn conflict_maps_to_invalid_state() {
        let server = MockServer::start().await;
        let id = TransactionId::generate();
        Mock::given(method("POST"))
            .and(path(format!("/api/transactions/{id}/complete")))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error": {"code": "conflict", "message": "transaction is already completed"}
            })))
            .mount(&server)
            .await;

        let client = WarungClient::new(server.uri()).unwrap();
        let err = client.complete(id).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn unparseable_error_body_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ai/detection-labels"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = WarungClient::new(server.uri()).unwrap();
        let err = client.detection_labels().await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 502, .. }));
    }

    #[tokio::test]
    async fn scan_add_posts_one_unit_by_barcode() {
        let server = MockServer::start().await;
        let p = product();
        let cart = cart_with(&p, 1);
        Mock::given(method("POST"))
            .and(path(format!("/api/transactions/{}/items", cart.id())))
            .and(body_json(serde_json::json!({
                "barcode": "8991002101234",
                "quantity": 1
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(item_body(&cart)))
            .expect(1)
            .mount(&server)
            .await;

        let client = WarungClient::new(server.uri()).unwrap();
        let applied = client
            .apply_scan(cart.id(), &outcome(Some(p), ScanAction::Add), &Cart::open(Direction::Out))
            .await
            .unwrap();
        assert!(matches!(applied, ScanApplied::Added(_)));
    }

    #[tokio::test]
    async fn scan_cancel_decrements_line() {
        let server = MockServer::start().await;
        let p = product();
        let cart = cart_with(&p, 3);
        let line = cart.items[0].id;
        Mock::given(method("PATCH"))
            .and(path(format!("/api/transactions/{}/items/{line}", cart.id())))
            .and(body_json(serde_json::json!({"quantity": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(item_body(&cart)))
            .expect(1)
            .mount(&server)
            .await;

        let client = WarungClient::new(server.uri()).unwrap();
        let applied = client
            .apply_scan(cart.id(), &outcome(Some(p), ScanAction::Cancel), &cart)
            .await
            .unwrap();
        assert!(matches!(applied, ScanApplied::Decremented(_)));
    }

    #[tokio::test]
    async fn scan_cancel_removes_single_unit_line() {
        let server = MockServer::start().await;
        let p = product();
        let cart = cart_with(&p, 1);
        let line = cart.items[0].id;
        let mut emptied = cart.clone();
        emptied.items.clear();
        Mock::given(method("DELETE"))
            .and(path(format!("/api/transactions/{}/items/{line}", cart.id())))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Item removed",
                "transaction": emptied
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = WarungClient::new(server.uri()).unwrap();
        let applied = client
            .apply_scan(cart.id(), &outcome(Some(p), ScanAction::Cancel), &cart)
            .await
            .unwrap();
        match applied {
            ScanApplied::Removed(r) => assert!(r.transaction.items.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn scan_cancel_for_absent_product_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = WarungClient::new(server.uri()).unwrap();
        let cart = Cart::open(Direction::Out);
        let applied = client
            .apply_scan(cart.id(), &outcome(Some(product()), ScanAction::Cancel), &cart)
            .await
            .unwrap();
        assert!(matches!(applied, ScanApplied::NotInCart));
    }

    #[tokio::test]
    async fn scan_without_product_is_unmatched() {
        let client = WarungClient::new("http://127.0.0.1:9").unwrap();
        let cart = Cart::open(Direction::Out);
        let applied = client
            .apply_scan(cart.id(), &outcome(None, ScanAction::Add), &cart)
            .await
            .unwrap();
        assert!(matches!(applied, ScanApplied::Unmatched));
    }

    #[tokio::test]
    async fn match_label_returns_none_when_unmatched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ai/match"))
            .and(body_json(serde_json::json!({"detected_label": "tube"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"matched": false, "product": null})),
            )
            .mount(&server)
            .await;

        let client = WarungClient::new(server.uri()).unwrap();
        assert!(client.match_label("tube").await.unwrap().is_none());
    }
}
