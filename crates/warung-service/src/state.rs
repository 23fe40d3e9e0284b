//! Application state.

use std::sync::Arc;

use warung_core::ShopInfo;
use warung_store::Store;

use crate::ai::{AiCommentary, CommentaryGenerator, KolosalClient, NoCommentary, SpeechClient};
use crate::cart::CartService;
use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Cart lifecycle and event bus.
    pub carts: CartService,

    /// Kolosal client for object detection (optional).
    pub vision: Option<Arc<KolosalClient>>,
}

impl AppState {
    /// Create a new application state, wiring AI collaborators from `config`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let kolosal = config.kolosal_api_key.as_ref().and_then(|key| {
            match KolosalClient::new(&config.kolosal_api_url, key, &config.kolosal_chat_model) {
                Ok(client) => {
                    tracing::info!(
                        kolosal_url = %config.kolosal_api_url,
                        "Kolosal integration enabled"
                    );
                    Some(client)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Kolosal client");
                    None
                }
            }
        });

        if kolosal.is_none() {
            tracing::warn!("Kolosal not configured - detection and commentary are disabled");
        }

        let speech = config.openai_api_key.as_ref().and_then(|key| {
            match SpeechClient::new(&config.openai_api_url, key) {
                Ok(client) => {
                    tracing::info!("Speech synthesis enabled");
                    Some(client)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create speech client");
                    None
                }
            }
        });

        let commentary: Arc<dyn CommentaryGenerator> = match &kolosal {
            Some(chat) => Arc::new(AiCommentary::new(
                chat.clone(),
                speech,
                config.audio_dir.clone(),
            )),
            None => Arc::new(NoCommentary),
        };

        let mut state = Self::with_commentary(store, config, commentary);
        state.vision = kolosal.map(Arc::new);
        state
    }

    /// Create state with an explicit commentary generator and no vision backend.
    #[must_use]
    pub fn with_commentary(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        commentary: Arc<dyn CommentaryGenerator>,
    ) -> Self {
        let carts = CartService::new(store.clone(), commentary, config.auto_commentary);
        Self {
            store,
            config,
            carts,
            vision: None,
        }
    }

    /// Shop details printed on receipts.
    #[must_use]
    pub fn shop(&self) -> ShopInfo {
        ShopInfo {
            name: self.config.shop_name.clone(),
            address: self.config.shop_address.clone(),
        }
    }

    /// Check if a vision backend is configured.
    #[must_use]
    pub fn has_vision(&self) -> bool {
        self.vision.is_some()
    }
}
