use serde::{Deserialize, Serialize};

use crate::bundle::{BackboneSpec, ManifestError};

/// Sidecar written next to a trained model record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointManifest {
    pub backbone: BackboneSpec,
    pub num_classes: usize,
    /// (height, width) the model was trained at.
    pub image_shape: [usize; 2],
    pub iterations: usize,
    pub final_loss: Option<f32>,
}

impl CheckpointManifest {
    pub fn validate(&self) -> Result<(), ManifestError> {
        self.backbone.validate()?;
        if self.num_classes == 0 {
            return Err(ManifestError::NoClasses);
        }
        let [h, w] = self.image_shape;
        if h == 0 || w == 0 || h % 32 != 0 || w % 32 != 0 {
            return Err(ManifestError::InvalidImageShape(self.image_shape));
        }
        Ok(())
    }
}
