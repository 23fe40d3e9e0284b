//! Zone-crossing inference over consecutive detection frames.
//!
//! The tracker remembers at most one `(label, zone)` pair: the best object seen in the
//! previous sample. An action fires only when the same label is seen on the other side of
//! the midline in the very next sample, after which the track is cleared so one crossing
//! produces exactly one action.

use warung_core::{Detection, Direction};

use crate::types::{Crossing, ScanAction, Zone};

/// Detections below this confidence are ignored.
pub const CONFIDENCE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
struct Track {
    label: String,
    zone: Zone,
}

/// Stateful crossing detector for one scanning session.
#[derive(Debug, Clone, Default)]
pub struct DetectionTracker {
    track: Option<Track>,
    mirrored: bool,
}

impl DetectionTracker {
    /// Create a tracker for an unmirrored feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker whose detections come from a horizontally flipped frame.
    ///
    /// Coordinates are flipped back before zoning, so the shop side stays on the logical
    /// left regardless of how the preview is displayed.
    #[must_use]
    pub fn mirrored() -> Self {
        Self {
            track: None,
            mirrored: true,
        }
    }

    /// Whether detections are un-mirrored before zoning.
    #[must_use]
    pub const fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    /// Change the mirror setting. The track is cleared since old zones no longer compare.
    pub fn set_mirrored(&mut self, mirrored: bool) {
        if self.mirrored != mirrored {
            self.mirrored = mirrored;
            self.reset();
        }
    }

    /// Forget the tracked object.
    pub fn reset(&mut self) {
        self.track = None;
    }

    /// Label and zone currently tracked.
    #[must_use]
    pub fn tracked(&self) -> Option<(&str, Zone)> {
        self.track.as_ref().map(|t| (t.label.as_str(), t.zone))
    }

    /// Feed one sample. Returns a crossing when the tracked object changed sides.
    pub fn observe(
        &mut self,
        detections: &[Detection],
        image_width: f64,
        direction: Direction,
    ) -> Option<Crossing> {
        let Some(best) = best_detection(detections) else {
            self.reset();
            return None;
        };

        let zone = self.zone_of(best, image_width);
        let previous = match self.track.take() {
            Some(track) if track.label == best.name => track,
            _ => {
                // First sighting, or a different object: start over.
                self.track = Some(Track {
                    label: best.name.clone(),
                    zone,
                });
                return None;
            }
        };

        match ScanAction::for_crossing(previous.zone, zone, direction) {
            Some(action) => {
                tracing::debug!(
                    label = %best.name,
                    ?action,
                    ?zone,
                    confidence = best.confidence,
                    "Crossing detected"
                );
                Some(Crossing {
                    label: best.name.clone(),
                    action,
                    confidence: best.confidence,
                    zone,
                })
            }
            None => {
                self.track = Some(previous);
                None
            }
        }
    }

    fn zone_of(&self, detection: &Detection, image_width: f64) -> Zone {
        let center = detection.center_x();
        let logical = if self.mirrored {
            image_width - center
        } else {
            center
        };
        if logical < image_width / 2.0 {
            Zone::Inside
        } else {
            Zone::Outside
        }
    }
}

/// The single most confident detection at or above the threshold.
fn best_detection(detections: &[Detection]) -> Option<&Detection> {
    detections
        .iter()
        .filter(|d| d.confidence >= CONFIDENCE_THRESHOLD)
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
}
