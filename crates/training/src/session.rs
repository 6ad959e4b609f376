//! Execution context for a training run.

use std::path::Path;

use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Tensor;
use data_contracts::BackboneSpec;
use models::{load_vgg, BundleError, FcnDecoder, FcnDecoderConfig, FcnVgg16, LoadedEncoder, L2_SCALE};

use crate::objective::optimize;

/// Per-step feed values.
#[derive(Debug, Clone, Copy)]
pub struct StepFeed {
    pub keep_prob: f64,
    pub learning_rate: f64,
    pub include_regularization: bool,
}

/// Owns the device, the frozen encoder and the trainable decoder.
///
/// The encoder lives on the inner (non-differentiable) backend, so the only
/// parameters an optimizer step can touch are the decoder's.
pub struct Session<B: AutodiffBackend> {
    device: B::Device,
    encoder: LoadedEncoder<B::InnerBackend>,
    decoder_config: FcnDecoderConfig,
    decoder: FcnDecoder<B>,
}

impl<B: AutodiffBackend> Session<B> {
    pub fn open(
        vgg_path: impl AsRef<Path>,
        num_classes: usize,
        device: &B::Device,
    ) -> Result<Self, BundleError> {
        let encoder = load_vgg::<B::InnerBackend>(vgg_path, device)?;
        Ok(Self::from_encoder(encoder, num_classes, device))
    }

    pub fn from_encoder(
        encoder: LoadedEncoder<B::InnerBackend>,
        num_classes: usize,
        device: &B::Device,
    ) -> Self {
        let decoder_config = FcnDecoderConfig::for_backbone(encoder.backbone(), num_classes);
        let decoder = FcnDecoder::new(&decoder_config, device);
        tracing::debug!(
            bundle = %encoder.root.display(),
            num_classes,
            "session opened"
        );
        Self {
            device: device.clone(),
            encoder,
            decoder_config,
            decoder,
        }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn backbone(&self) -> &BackboneSpec {
        self.encoder.backbone()
    }

    pub fn encoder(&self) -> &LoadedEncoder<B::InnerBackend> {
        &self.encoder
    }

    pub fn num_classes(&self) -> usize {
        self.decoder_config.num_classes
    }

    pub fn decoder(&self) -> &FcnDecoder<B> {
        &self.decoder
    }

    /// Fresh draw of every decoder parameter; encoder weights stay as loaded.
    pub fn initialize(&mut self) {
        self.decoder = FcnDecoder::new(&self.decoder_config, &self.device);
    }

    /// Class scores `[batch, num_classes, h, w]` for images `[batch, 3, h, w]`.
    pub fn forward(&self, images: Tensor<B, 4>, keep_prob: f64) -> Tensor<B, 4> {
        let features = self.encoder.encoder.forward(images.inner(), keep_prob);
        self.decoder.forward(
            Tensor::from_inner(features.layer3),
            Tensor::from_inner(features.layer4),
            Tensor::from_inner(features.layer7),
        )
    }

    /// One optimization step on a batch; returns the loss before the update.
    pub fn step<O>(
        &mut self,
        images: Tensor<B, 4>,
        labels: Tensor<B, 4>,
        feed: StepFeed,
        optim: &mut O,
    ) -> f32
    where
        O: Optimizer<FcnDecoder<B>, B>,
    {
        let scores = self.forward(images, feed.keep_prob);
        let mut objective = optimize(scores, labels, feed.learning_rate, self.num_classes());
        if feed.include_regularization {
            objective = objective.with_penalty(self.decoder.regularization_loss(L2_SCALE));
        }
        let (decoder, loss) = objective.minimize(self.decoder.clone(), optim);
        self.decoder = decoder;
        loss
    }

    /// Encoder and trained decoder as one inference model.
    pub fn snapshot(&self) -> FcnVgg16<B::InnerBackend> {
        FcnVgg16 {
            encoder: self.encoder.encoder.clone(),
            decoder: self.decoder.valid(),
        }
    }
}

impl<B: AutodiffBackend> Drop for Session<B> {
    fn drop(&mut self) {
        tracing::debug!(bundle = %self.encoder.root.display(), "session closed");
    }
}
