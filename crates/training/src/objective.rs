//! Loss and update step: per-pixel softmax cross-entropy minimized with Adam.

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;

/// Adam with the usual moment decays and a 1e-8 epsilon.
pub fn adam() -> AdamConfig {
    AdamConfig::new()
        .with_beta_1(0.9)
        .with_beta_2(0.999)
        .with_epsilon(1e-8)
}

/// `[n, c, h, w]` -> `[n * h * w, c]`, one row per pixel.
pub fn flatten_pixels<B: Backend>(map: Tensor<B, 4>, num_classes: usize) -> Tensor<B, 2> {
    let [n, _, h, w] = map.dims();
    map.permute([0, 2, 3, 1]).reshape([n * h * w, num_classes])
}

/// Mean over rows of `-sum(labels * log_softmax(logits))`.
pub fn softmax_cross_entropy<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 2>) -> Tensor<B, 1> {
    (labels * log_softmax(logits, 1)).sum_dim(1).neg().mean()
}

pub fn scalar<B: Backend>(value: Tensor<B, 1>) -> f32 {
    value
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .unwrap_or_default()
        .first()
        .copied()
        .unwrap_or(f32::NAN)
}

/// Flattened logits, the loss to minimize, and the rate the step will use.
pub struct Objective<B: Backend> {
    pub logits: Tensor<B, 2>,
    pub loss: Tensor<B, 1>,
    pub learning_rate: f64,
}

/// Build the objective for one batch of class scores against one-hot labels.
pub fn optimize<B: Backend>(
    score_map: Tensor<B, 4>,
    labels: Tensor<B, 4>,
    learning_rate: f64,
    num_classes: usize,
) -> Objective<B> {
    let logits = flatten_pixels(score_map, num_classes);
    let labels = flatten_pixels(labels, num_classes);
    let loss = softmax_cross_entropy(logits.clone(), labels);
    Objective {
        logits,
        loss,
        learning_rate,
    }
}

impl<B: Backend> Objective<B> {
    /// Add a regularization term to the loss.
    pub fn with_penalty(self, penalty: Tensor<B, 1>) -> Self {
        Self {
            loss: self.loss + penalty,
            ..self
        }
    }
}

impl<B: AutodiffBackend> Objective<B> {
    /// Apply one update to `module`'s parameters; returns the updated module and the loss value.
    ///
    /// Only parameters reachable from `module` are updated.
    pub fn minimize<M, O>(self, module: M, optim: &mut O) -> (M, f32)
    where
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let loss_value = scalar(self.loss.clone().detach());
        let grads = GradientsParams::from_grads(self.loss.backward(), &module);
        (optim.step(self.learning_rate, module, grads), loss_value)
    }
}
