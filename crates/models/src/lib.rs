//! Burn modules for road segmentation.
//!
//! - `Vgg16Encoder`: pretrained backbone exposing the pool3/pool4/fc7 taps.
//! - `FcnDecoder`: the FCN-8 head turning those taps into per-pixel class scores.
//! - `FcnVgg16`: both together, the unit that gets checkpointed and served.
//!
//! `bundle` loads and writes the on-disk encoder bundles the training run starts from.

pub mod bundle;
pub mod decoder;
pub mod encoder;

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use data_contracts::BackboneSpec;

pub use bundle::{
    bundle_exists, load_vgg, save_vgg, BundleError, Dim, EncoderEndpoints, LoadedEncoder,
    TensorSpec,
};
pub use decoder::{FcnDecoder, FcnDecoderConfig, L2_SCALE, WEIGHT_INIT_STD};
pub use encoder::{EncoderFeatures, Vgg16Encoder, TOTAL_STRIDE};

#[derive(Debug, Module)]
pub struct FcnVgg16<B: Backend> {
    pub encoder: Vgg16Encoder<B>,
    pub decoder: FcnDecoder<B>,
}

impl<B: Backend> FcnVgg16<B> {
    pub fn new(backbone: &BackboneSpec, num_classes: usize, device: &B::Device) -> Self {
        Self {
            encoder: Vgg16Encoder::new(backbone, device),
            decoder: FcnDecoder::new(&FcnDecoderConfig::for_backbone(backbone, num_classes), device),
        }
    }

    /// Class scores `[batch, num_classes, h, w]` for images `[batch, 3, h, w]`.
    pub fn forward(&self, images: Tensor<B, 4>, keep_prob: f64) -> Tensor<B, 4> {
        let features = self.encoder.forward(images, keep_prob);
        self.decoder
            .forward(features.layer3, features.layer4, features.layer7)
    }
}

pub mod prelude {
    pub use super::{
        load_vgg, save_vgg, FcnDecoder, FcnDecoderConfig, FcnVgg16, LoadedEncoder, Vgg16Encoder,
    };
}
