/// Detection result store
///
/// Holds the single (image frame, detection set) pair the overlay is drawn
/// from. Both halves are replaced together so a new frame is never paired
/// with boxes from the previous upload.
use std::sync::Arc;
use log::{debug, info};

use crate::detection::{DetectionSet, ImageFrame};

/// A frame together with the detections computed for it
#[derive(Debug, PartialEq)]
pub struct FrameDetections {
    pub frame: ImageFrame,
    pub detections: DetectionSet,
}

/// Immutable view of the store at one point in time
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    contents: Option<Arc<FrameDetections>>,
    generation: u64,
}

impl StoreSnapshot {
    pub fn frame(&self) -> Option<&ImageFrame> {
        self.contents.as_ref().map(|c| &c.frame)
    }

    pub fn detections(&self) -> Option<&DetectionSet> {
        self.contents.as_ref().map(|c| &c.detections)
    }

    /// Detections as a slice; empty when nothing is loaded
    pub fn detection_slice(&self) -> &[crate::detection::Detection] {
        self.detections().map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Incremented on every `set_frame` and on every `clear` of a loaded store
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Owner of the current frame/detection pair
#[derive(Debug, Default)]
pub struct DetectionStore {
    current: Option<Arc<FrameDetections>>,
    generation: u64,
}

impl DetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the frame and its detections in one step
    pub fn set_frame(&mut self, frame: ImageFrame, detections: DetectionSet) -> u64 {
        debug!(
            "Store: replacing pair with frame {}x{} and {} detection(s)",
            frame.width, frame.height, detections.len()
        );
        self.current = Some(Arc::new(FrameDetections { frame, detections }));
        self.generation += 1;
        self.generation
    }

    /// Drop the current pair (no image loaded)
    pub fn clear(&mut self) -> u64 {
        if self.current.take().is_some() {
            self.generation += 1;
            info!("Cleared detection results");
        }
        self.generation
    }

    /// Cheap, fully formed copy of the current state
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            contents: self.current.clone(),
            generation: self.generation,
        }
    }
}
