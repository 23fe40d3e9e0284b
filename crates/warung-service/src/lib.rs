//! Warung point-of-sale HTTP API service.
//!
//! This crate provides the HTTP API for the warung backend, including:
//!
//! - Product catalog management
//! - Cart (transaction) lifecycle with atomic finalize
//! - Per-transaction live updates over WebSocket
//! - Receipts and sales analytics
//! - Vision proxy, label matching and best-effort sale commentary
//!
//! # Collaborators
//!
//! Kolosal (detection and chat) and `OpenAI` (speech) are optional. Without credentials the
//! service still handles every cart operation; detection reports nothing and commentary is
//! skipped.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers and service methods all return Result
#![allow(clippy::unused_async)] // Handlers are async for the router even when the store is sync

pub mod ai;
pub mod audio;
pub mod cart;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod routes;
pub mod state;

pub use cart::CartService;
pub use config::ServiceConfig;
pub use error::ApiError;
pub use events::{CartEvent, CartEventKind, EventBus};
pub use routes::create_router;
pub use state::AppState;
