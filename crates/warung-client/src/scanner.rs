//! Camera scanning session.
//!
//! A [`ScanSession`] samples frames at a fixed cadence, sends each one to a [`Detector`],
//! feeds the result to a [`DetectionTracker`] and resolves every crossing to a catalog
//! product through a [`LabelMatcher`]. Samples never overlap: the next tick waits for the
//! previous detection round trip.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;

use warung_core::{DetectResponse, Direction, Product};

use crate::client::WarungClient;
use crate::error::ClientError;
use crate::tracker::DetectionTracker;
use crate::types::ScanOutcome;

/// Default sampling interval.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Object detection backend.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detect objects in a base64 frame.
    async fn detect(&self, frame: &str, prompts: &[String]) -> Result<DetectResponse, ClientError>;
}

/// Resolves detector labels to products.
#[async_trait]
pub trait LabelMatcher: Send + Sync {
    /// The product for `label`, if any.
    async fn match_label(&self, label: &str) -> Result<Option<Product>, ClientError>;
}

/// Source of camera frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Capture the current frame as base64, or `None` if the camera has no frame yet.
    async fn capture(&mut self) -> Option<String>;
}

#[async_trait]
impl Detector for WarungClient {
    async fn detect(&self, frame: &str, prompts: &[String]) -> Result<DetectResponse, ClientError> {
        WarungClient::detect(self, frame, prompts).await
    }
}

#[async_trait]
impl LabelMatcher for WarungClient {
    async fn match_label(&self, label: &str) -> Result<Option<Product>, ClientError> {
        WarungClient::match_label(self, label).await
    }
}

/// One scanning session over a camera feed.
pub struct ScanSession {
    tracker: DetectionTracker,
    detector: Arc<dyn Detector>,
    matcher: Arc<dyn LabelMatcher>,
    prompts: Vec<String>,
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("tracker", &self.tracker)
            .field("prompts", &self.prompts)
            .finish_non_exhaustive()
    }
}

impl ScanSession {
    /// Create a session. Empty `prompts` lets the detector use the catalog's labels.
    #[must_use]
    pub fn new(
        detector: Arc<dyn Detector>,
        matcher: Arc<dyn LabelMatcher>,
        prompts: Vec<String>,
    ) -> Self {
        Self {
            tracker: DetectionTracker::new(),
            detector,
            matcher,
            prompts,
        }
    }

    /// Create a session backed by the warung service for both detection and matching.
    #[must_use]
    pub fn with_client(client: WarungClient, prompts: Vec<String>) -> Self {
        let client = Arc::new(client);
        Self::new(client.clone(), client, prompts)
    }

    /// The session's tracker.
    #[must_use]
    pub const fn tracker(&self) -> &DetectionTracker {
        &self.tracker
    }

    /// Flip the mirror setting of the feed. Clears the track.
    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.tracker.set_mirrored(mirrored);
    }

    /// Process one frame.
    ///
    /// Detector failures count as an empty frame. A matcher failure yields an outcome
    /// without a product.
    pub async fn step(&mut self, frame: &str, direction: Direction) -> Option<ScanOutcome> {
        let response = match self.detector.detect(frame, &self.prompts).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Detection failed, treating frame as empty");
                DetectResponse::unavailable()
            }
        };

        let crossing =
            self.tracker
                .observe(&response.results, response.image_width(), direction)?;

        let product = match self.matcher.match_label(&crossing.label).await {
            Ok(product) => product,
            Err(e) => {
                tracing::warn!(label = %crossing.label, error = %e, "Label matching failed");
                None
            }
        };

        Some(ScanOutcome {
            product,
            action: crossing.action,
            confidence: crossing.confidence,
            zone: crossing.zone,
            label: crossing.label,
        })
    }

    /// Sample `frames` every `interval` until `shutdown` resolves.
    ///
    /// Each outcome is handed to `on_outcome`. On shutdown any in-flight sample is
    /// abandoned and the tracker is reset.
    pub async fn run<F, S>(
        &mut self,
        frames: &mut dyn FrameSource,
        direction: Direction,
        interval: Duration,
        shutdown: S,
        mut on_outcome: F,
    ) where
        F: FnMut(ScanOutcome) + Send,
        S: Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::debug!(?direction, ?interval, "Scan session started");

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let sample = async {
                let frame = frames.capture().await?;
                self.step(&frame, direction).await
            };

            tokio::select! {
                () = &mut shutdown => break,
                outcome = sample => {
                    if let Some(outcome) = outcome {
                        on_outcome(outcome);
                    }
                }
            }
        }

        self.tracker.reset();
        tracing::debug!("Scan session stopped");
    }
}
