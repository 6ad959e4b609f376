use anyhow::anyhow;
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use image::imageops::FilterType;
use image::{RgbImage, Rgba};
use models::FcnVgg16;
use vision_core::interfaces::Renderer;
use vision_core::overlay::blend_mask;

/// Overlay color for road pixels (green, roughly half transparent).
pub const ROAD_COLOR: Rgba<u8> = Rgba([0, 255, 0, 127]);
/// Road probability above which a pixel is painted.
pub const ROAD_THRESHOLD: f32 = 0.5;

/// Resize to `(height, width)` with a triangle filter.
pub fn resize_to(image: &RgbImage, image_shape: [usize; 2]) -> RgbImage {
    let [h, w] = image_shape;
    if image.dimensions() == (w as u32, h as u32) {
        return image.clone();
    }
    image::imageops::resize(image, w as u32, h as u32, FilterType::Triangle)
}

/// Planar CHW floats in [0, 1].
pub fn image_to_chw(image: &RgbImage) -> Vec<f32> {
    let (w, h) = image.dimensions();
    let mut buf = Vec::with_capacity((w * h * 3) as usize);
    for c in 0..3 {
        for y in 0..h {
            for x in 0..w {
                buf.push(image.get_pixel(x, y)[c] as f32 / 255.0);
            }
        }
    }
    buf
}

/// Runs a trained model on single images and paints predicted road pixels.
pub struct SegmentationRenderer<B: Backend> {
    model: FcnVgg16<B>,
    num_classes: usize,
    image_shape: [usize; 2],
    device: B::Device,
}

impl<B: Backend> SegmentationRenderer<B> {
    pub fn new(
        model: FcnVgg16<B>,
        num_classes: usize,
        image_shape: [usize; 2],
        device: B::Device,
    ) -> Self {
        Self {
            model,
            num_classes,
            image_shape,
            device,
        }
    }

    pub fn image_shape(&self) -> [usize; 2] {
        self.image_shape
    }

    /// The road class is the last class index.
    pub fn road_class(&self) -> usize {
        self.num_classes.saturating_sub(1)
    }

    /// Per-pixel road probability at `image_shape`, row-major.
    pub fn road_probabilities(&self, image: &RgbImage) -> anyhow::Result<Vec<f32>> {
        let [h, w] = self.image_shape;
        let resized = resize_to(image, self.image_shape);
        let input = Tensor::<B, 4>::from_data(
            TensorData::new(image_to_chw(&resized), [1, 3, h, w]),
            &self.device,
        );
        let scores = self.model.forward(input, 1.0);
        let road = self.road_class();
        softmax(scores, 1)
            .slice([0..1, road..road + 1, 0..h, 0..w])
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("failed to read road probabilities: {e:?}"))
    }

    pub fn road_mask(&self, image: &RgbImage) -> anyhow::Result<Vec<bool>> {
        Ok(self
            .road_probabilities(image)?
            .into_iter()
            .map(|p| p > ROAD_THRESHOLD)
            .collect())
    }
}

impl<B: Backend> Renderer for SegmentationRenderer<B> {
    fn render(&self, image: &RgbImage) -> anyhow::Result<RgbImage> {
        let resized = resize_to(image, self.image_shape);
        let mask = self.road_mask(&resized)?;
        Ok(blend_mask(&resized, &mask, ROAD_COLOR))
    }
}
