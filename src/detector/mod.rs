/// Detector client seam
///
/// The overlay only needs `detect(image bytes) -> results`; how the bytes
/// reach the inference service is up to the implementation.
pub mod replay;

use async_trait::async_trait;
use thiserror::Error;

use crate::detection::DetectResponse;

pub use replay::ReplayDetector;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("no image loaded")]
    NoImage,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("detector unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DetectorClient: Send + Sync {
    /// Run detection on an encoded image. Boxes must come back normalized to [0, 1].
    async fn detect(&self, image: &[u8]) -> Result<DetectResponse, DetectorError>;
}
