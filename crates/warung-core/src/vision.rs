//! Object detection results as exchanged with the vision endpoint.

use serde::{Deserialize, Serialize};

/// Frame width assumed when the detector does not report the image size.
pub const DEFAULT_IMAGE_WIDTH: f64 = 320.0;

/// One detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Open-vocabulary label.
    pub name: String,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
    /// `[x, y, width, height]` in image pixels.
    pub bbox: [f64; 4],
}

impl Detection {
    /// Horizontal center of the bounding box.
    #[must_use]
    pub fn center_x(&self) -> f64 {
        self.bbox[0] + self.bbox[2] / 2.0
    }
}

/// Response of `POST /api/ai/detect`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectResponse {
    /// False when the detector is unconfigured or failed.
    #[serde(default)]
    pub success: bool,
    /// Objects found in the frame.
    #[serde(default)]
    pub results: Vec<Detection>,
    /// `[width, height]` of the analysed image, when known.
    #[serde(default)]
    pub image_size: Option<Vec<f64>>,
}

impl DetectResponse {
    /// An empty, unsuccessful result.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Frame width for zone computation.
    #[must_use]
    pub fn image_width(&self) -> f64 {
        self.image_size
            .as_ref()
            .and_then(|size| size.first().copied())
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_IMAGE_WIDTH)
    }
}
