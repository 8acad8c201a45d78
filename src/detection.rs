/// Detection data model
///
/// Holds the values the overlay works with (frames, boxes, detections) and the
/// JSON shape the inference service answers with.
use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use log::warn;

/// Normalized bounding box in `(x1, y1, x2, y2)` order.
///
/// Each coordinate is a fraction of the image width (x) or height (y). The
/// producer is expected to keep `x1 <= x2` and `y1 <= y2` but nothing here
/// enforces it; the renderer draws inverted boxes as degenerate rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// True when the corners are ordered (`x1 <= x2`, `y1 <= y2`)
    pub fn is_ordered(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }
}

/// Natural (unscaled) pixel size of the loaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
}

impl ImageFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A single labelled detection as returned by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// Label chip text, e.g. `cat (97.00%)`
    pub fn label_text(&self) -> String {
        format!("{} ({:.2}%)", self.label, self.confidence * 100.0)
    }
}

/// Ordered detections for one image, in the order the server returned them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet {
    detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.detections
    }

    /// Per-label counts, sorted by count (descending) then label (ascending)
    pub fn summary(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for detection in &self.detections {
            *counts.entry(detection.label.as_str()).or_insert(0) += 1;
        }

        let mut sorted: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(label, count)| (label.to_string(), count))
            .collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted
    }
}

impl From<Vec<Detection>> for DetectionSet {
    fn from(detections: Vec<Detection>) -> Self {
        Self::new(detections)
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

/// Response body of the inference service: `{"results": [...]}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub results: Vec<WireDetection>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireDetection {
    pub label: String,
    pub confidence: f64,
    pub bbox: [f64; 4],  // [x1, y1, x2, y2], normalized
}

impl DetectResponse {
    /// Parse a response body
    pub fn from_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Convert the wire results into a detection set.
    ///
    /// All-or-nothing: one bad entry rejects the whole response so a partial
    /// set never reaches the store.
    pub fn into_detection_set(self) -> Result<DetectionSet, String> {
        let mut detections = Vec::with_capacity(self.results.len());

        for (index, wire) in self.results.into_iter().enumerate() {
            if wire.label.trim().is_empty() {
                return Err(format!("result {} has an empty label", index));
            }

            if let Some(bad) = wire.bbox.iter().find(|c| !c.is_finite()) {
                return Err(format!(
                    "result {} ({}) has a non-finite bbox coordinate: {}",
                    index, wire.label, bad
                ));
            }

            if !wire.confidence.is_finite() {
                return Err(format!("result {} ({}) has a non-finite confidence", index, wire.label));
            }

            let confidence = if (0.0..=1.0).contains(&wire.confidence) {
                wire.confidence as f32
            } else {
                warn!(
                    "Clamping confidence {} of result {} ({}) into [0, 1]",
                    wire.confidence, index, wire.label
                );
                wire.confidence.clamp(0.0, 1.0) as f32
            };

            let bbox = BoundingBox::new(
                wire.bbox[0] as f32,
                wire.bbox[1] as f32,
                wire.bbox[2] as f32,
                wire.bbox[3] as f32,
            );
            if !bbox.is_ordered() {
                warn!("Result {} ({}) has inverted bbox corners: {:?}", index, wire.label, bbox.to_array());
            }

            detections.push(Detection {
                label: wire.label,
                confidence,
                bbox,
            });
        }

        Ok(DetectionSet::new(detections))
    }
}
