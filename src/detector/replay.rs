use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, info};

use crate::detection::DetectResponse;
use super::{DetectorClient, DetectorError};

/// Answers every request with a response previously saved from the inference service
pub struct ReplayDetector {
    response_path: PathBuf,
}

impl ReplayDetector {
    pub fn new(response_path: impl Into<PathBuf>) -> Self {
        Self {
            response_path: response_path.into(),
        }
    }
}

#[async_trait]
impl DetectorClient for ReplayDetector {
    async fn detect(&self, image: &[u8]) -> Result<DetectResponse, DetectorError> {
        if image.is_empty() {
            return Err(DetectorError::InvalidInput("empty image upload".to_string()));
        }
        debug!(
            "Replaying detection for {} byte image from {}",
            image.len(),
            self.response_path.display()
        );

        let content = match tokio::fs::read_to_string(&self.response_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DetectorError::Unavailable(format!(
                    "no saved response at {}",
                    self.response_path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let response = DetectResponse::from_str(&content)?;

        info!(
            "Detector returned {} result(s) from {}",
            response.results.len(),
            self.response_path.display()
        );
        Ok(response)
    }
}
