use serde::{Deserialize, Serialize};

use crate::bundle::ManifestError;

/// `frames.json` describing an ordered frame sequence and its playback rate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameManifest {
    pub fps: f64,
    pub frames: Vec<String>,
}

impl FrameManifest {
    pub fn validate(&self) -> Result<(), ManifestError> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ManifestError::InvalidFps(self.fps));
        }
        if let Some(idx) = self.frames.iter().position(|f| f.trim().is_empty()) {
            return Err(ManifestError::EmptyFrameName(idx));
        }
        Ok(())
    }
}
