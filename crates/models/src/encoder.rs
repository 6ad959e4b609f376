//! VGG16 feature extractor exposing the pool3/pool4/fc7 taps used by FCN-8.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::module::max_pool2d;
use burn::tensor::{Distribution, Tensor};
use data_contracts::BackboneSpec;

/// Convolutions per stage in VGG16.
pub const STAGE_DEPTHS: [usize; 5] = [2, 2, 3, 3, 3];
/// Spatial reduction from the input image to `layer7_out`.
pub const TOTAL_STRIDE: usize = 32;

/// Same-padded 3x3 convolutions followed by a 2x2 max-pool.
#[derive(Debug, Module)]
pub struct VggStage<B: Backend> {
    convs: Vec<Conv2d<B>>,
}

impl<B: Backend> VggStage<B> {
    fn new(in_channels: usize, width: usize, depth: usize, device: &B::Device) -> Self {
        let mut convs = Vec::with_capacity(depth);
        let mut channels = in_channels;
        for _ in 0..depth {
            convs.push(
                Conv2dConfig::new([channels, width], [3, 3])
                    .with_padding(PaddingConfig2d::Same)
                    .init(device),
            );
            channels = width;
        }
        Self { convs }
    }

    /// Convs with ReLU, then 2x2 max-pool.
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = input;
        for conv in &self.convs {
            x = relu(conv.forward(x));
        }
        max_pool2d(x, [2, 2], [2, 2], [0, 0], [1, 1])
    }
}

/// The three feature maps the decoder consumes.
#[derive(Debug, Clone)]
pub struct EncoderFeatures<B: Backend> {
    /// pool3 output: `[batch, stage_widths[2], h/8, w/8]`.
    pub layer3: Tensor<B, 4>,
    /// pool4 output: `[batch, stage_widths[3], h/16, w/16]`.
    pub layer4: Tensor<B, 4>,
    /// fc7 output: `[batch, fc_width, h/32, w/32]`.
    pub layer7: Tensor<B, 4>,
}

#[derive(Debug, Module)]
pub struct Vgg16Encoder<B: Backend> {
    stages: Vec<VggStage<B>>,
    fc6: Conv2d<B>,
    fc7: Conv2d<B>,
}

impl<B: Backend> Vgg16Encoder<B> {
    pub fn new(spec: &BackboneSpec, device: &B::Device) -> Self {
        let mut stages = Vec::with_capacity(STAGE_DEPTHS.len());
        let mut channels = 3;
        for (width, depth) in spec.stage_widths.iter().zip(STAGE_DEPTHS) {
            stages.push(VggStage::new(channels, *width, depth, device));
            channels = *width;
        }
        let fc6 = Conv2dConfig::new([channels, spec.fc_width], [spec.fc_kernel, spec.fc_kernel])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let fc7 = Conv2dConfig::new([spec.fc_width, spec.fc_width], [1, 1]).init(device);
        Self { stages, fc6, fc7 }
    }

    /// Run the backbone on `[batch, 3, h, w]` images.
    ///
    /// `keep_prob` drives the dropout after fc6 and fc7; 1.0 disables it.
    pub fn forward(&self, images: Tensor<B, 4>, keep_prob: f64) -> EncoderFeatures<B> {
        let layer3 = self.stages[..3]
            .iter()
            .fold(images, |x, stage| stage.forward(x));
        let layer4 = self.stages[3].forward(layer3.clone());
        let pool5 = self.stages[4].forward(layer4.clone());
        let x = dropout(relu(self.fc6.forward(pool5)), keep_prob);
        let layer7 = dropout(relu(self.fc7.forward(x)), keep_prob);
        EncoderFeatures {
            layer3,
            layer4,
            layer7,
        }
    }
}

/// Inverted dropout: keep each activation with probability `keep_prob` and rescale.
pub fn dropout<B: Backend, const D: usize>(input: Tensor<B, D>, keep_prob: f64) -> Tensor<B, D> {
    if keep_prob >= 1.0 {
        return input;
    }
    let mask = input.random_like(Distribution::Bernoulli(keep_prob));
    (input * mask).div_scalar(keep_prob)
}
