use std::path::Path;

use crate::checkpoint::{load_checkpoint, CheckpointError};
use crate::renderer::SegmentationRenderer;
use crate::InferenceBackend;

/// Builds renderers from trained checkpoints.
pub struct InferenceFactory;

impl InferenceFactory {
    pub fn build(
        &self,
        checkpoint: &Path,
    ) -> Result<SegmentationRenderer<InferenceBackend>, CheckpointError> {
        let device = <InferenceBackend as burn::tensor::backend::Backend>::Device::default();
        let (model, manifest) = load_checkpoint::<InferenceBackend>(checkpoint, &device)?;
        tracing::info!(
            checkpoint = %checkpoint.display(),
            classes = manifest.num_classes,
            iterations = manifest.iterations,
            "loaded segmentation checkpoint"
        );
        Ok(SegmentationRenderer::new(
            model,
            manifest.num_classes,
            manifest.image_shape,
            device,
        ))
    }
}
