//! FCN-8 skip-connected upsampling head.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::Initializer;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use data_contracts::BackboneSpec;

/// Std of the zero-mean Gaussian every decoder kernel is drawn from.
pub const WEIGHT_INIT_STD: f64 = 0.01;
/// L2 penalty coefficient shared by every decoder kernel.
pub const L2_SCALE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq)]
pub struct FcnDecoderConfig {
    pub num_classes: usize,
    pub layer3_channels: usize,
    pub layer4_channels: usize,
    pub layer7_channels: usize,
    pub init_std: f64,
}

impl FcnDecoderConfig {
    /// Head sized for the taps of `backbone`.
    pub fn for_backbone(backbone: &BackboneSpec, num_classes: usize) -> Self {
        Self {
            num_classes,
            layer3_channels: backbone.stage_widths[2],
            layer4_channels: backbone.stage_widths[3],
            layer7_channels: backbone.fc_width,
            init_std: WEIGHT_INIT_STD,
        }
    }

    fn initializer(&self) -> Initializer {
        Initializer::Normal {
            mean: 0.0,
            std: self.init_std,
        }
    }
}

/// Padding that makes a transposed conv with `kernel`/`stride` scale its input by exactly `stride`.
///
/// Returns `(padding, padding_out)`: output is `(in - 1) * stride - 2 * padding + kernel + padding_out`.
pub fn same_upsample_padding(kernel: usize, stride: usize) -> (usize, usize) {
    debug_assert!(kernel >= stride);
    let overhang = kernel - stride;
    let padding = overhang.div_ceil(2);
    (padding, 2 * padding - overhang)
}

#[derive(Debug, Module)]
pub struct FcnDecoder<B: Backend> {
    score7: Conv2d<B>,
    up7: ConvTranspose2d<B>,
    score4: Conv2d<B>,
    up4: ConvTranspose2d<B>,
    score3: Conv2d<B>,
    up_out: ConvTranspose2d<B>,
}

impl<B: Backend> FcnDecoder<B> {
    pub fn new(cfg: &FcnDecoderConfig, device: &B::Device) -> Self {
        let n = cfg.num_classes;
        let score = |in_channels: usize| {
            Conv2dConfig::new([in_channels, n], [1, 1])
                .with_initializer(cfg.initializer())
                .init(device)
        };
        let upsample = |kernel: usize, stride: usize| {
            let (padding, padding_out) = same_upsample_padding(kernel, stride);
            ConvTranspose2dConfig::new([n, n], [kernel, kernel])
                .with_stride([stride, stride])
                .with_padding([padding, padding])
                .with_padding_out([padding_out, padding_out])
                .with_initializer(cfg.initializer())
                .init(device)
        };
        Self {
            score7: score(cfg.layer7_channels),
            up7: upsample(4, 2),
            score4: score(cfg.layer4_channels),
            up4: upsample(4, 2),
            score3: score(cfg.layer3_channels),
            up_out: upsample(16, 8),
        }
    }

    /// Class scores at input resolution: `[batch, num_classes, 8 * h3, 8 * w3]`.
    pub fn forward(
        &self,
        layer3: Tensor<B, 4>,
        layer4: Tensor<B, 4>,
        layer7: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.up7.forward(self.score7.forward(layer7));
        let x = x + self.score4.forward(layer4);
        let x = self.up4.forward(x);
        let x = x + self.score3.forward(layer3);
        self.up_out.forward(x)
    }

    /// `scale * sum(w^2) / 2` over every decoder kernel.
    pub fn regularization_loss(&self, scale: f64) -> Tensor<B, 1> {
        let mut total = self.score7.weight.val().powf_scalar(2.0).sum();
        for kernel in [
            self.score4.weight.val(),
            self.score3.weight.val(),
            self.up7.weight.val(),
            self.up4.weight.val(),
            self.up_out.weight.val(),
        ] {
            total = total + kernel.powf_scalar(2.0).sum();
        }
        total.mul_scalar(scale / 2.0)
    }
}
