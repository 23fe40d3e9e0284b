//! Warung Client SDK.
//!
//! HTTP client for the warung service plus the camera-side scanning loop that turns
//! objects crossing the counter into cart actions.
//!
//! # Example
//!
//! ```no_run
//! use warung_client::{ScanSession, WarungClient};
//! use warung_core::Direction;
//!
//! # async fn example() -> Result<(), warung_client::ClientError> {
//! let client = WarungClient::new("http://localhost:8000")?;
//! let cart = client.open_transaction(Direction::Out).await?;
//!
//! let mut session = ScanSession::with_client(client.clone(), Vec::new());
//! # let frame = String::new();
//! if let Some(outcome) = session.step(&frame, Direction::Out).await {
//!     let current = client.get_transaction(cart.id()).await?;
//!     client.apply_scan(cart.id(), &outcome, &current).await?;
//! }
//!
//! let completed = client.complete(cart.id()).await?;
//! println!("Total: {}", completed.transaction.total_amount);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod scanner;
mod tracker;
mod types;

pub use client::{ClientOptions, WarungClient};
pub use error::ClientError;
pub use scanner::{Detector, FrameSource, LabelMatcher, ScanSession, DEFAULT_SAMPLE_INTERVAL};
pub use tracker::{DetectionTracker, CONFIDENCE_THRESHOLD};
pub use types::*;
