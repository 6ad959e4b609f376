//! Batch sources: the KITTI road layout on disk and a synthetic generator.

use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use image::imageops::FilterType;
use inference::renderer::{image_to_chw, resize_to};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

/// Ground-truth color of non-road pixels.
pub const BACKGROUND_COLOR: [u8; 3] = [255, 0, 0];

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("dataset directory missing: {path}")]
    MissingDir { path: PathBuf },
    #[error("no training images under {path}")]
    Empty { path: PathBuf },
    #[error("no ground truth for image {image}")]
    MissingLabel { image: PathBuf },
    #[error("road dataset has 2 classes, run asked for {0}")]
    UnsupportedClasses(usize),
}

/// One minibatch; both tensors are NCHW and share the batch dimension.
#[derive(Debug, Clone)]
pub struct SegmentationBatch<B: Backend> {
    /// `[batch, 3, h, w]`, values in [0, 1].
    pub images: Tensor<B, 4>,
    /// `[batch, num_classes, h, w]`, one-hot along the class axis.
    pub labels: Tensor<B, 4>,
}

impl<B: Backend> SegmentationBatch<B> {
    pub fn len(&self) -> usize {
        self.images.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type BatchIter<'a, B> = Box<dyn Iterator<Item = DatasetResult<SegmentationBatch<B>>> + 'a>;

/// Yields a fresh, finite pass over the data on every call.
pub trait BatchSource<B: Backend> {
    fn batches(&self, batch_size: usize, device: &B::Device) -> BatchIter<'_, B>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadSample {
    pub image: PathBuf,
    pub label: PathBuf,
}

/// Image file name a ground-truth file annotates (`um_road_000001.png` -> `um_000001.png`).
pub fn label_key(gt_name: &str) -> Option<String> {
    ["_road_", "_lane_"]
        .iter()
        .find(|infix| gt_name.contains(*infix))
        .map(|infix| gt_name.replacen(infix, "_", 1))
}

fn read_dir_sorted(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(DatasetError::MissingDir {
            path: dir.to_path_buf(),
        });
    }
    let entries = fs::read_dir(dir).map_err(|e| DatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DatasetError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|s| s.to_str())
}

fn is_png(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("png")
}

/// `data_road/training`: `image_2/*.png` with road ground truth in `gt_image_2/*_road_*.png`.
pub struct KittiRoadDataset {
    samples: Vec<RoadSample>,
    image_shape: [usize; 2],
    seed: Option<u64>,
    passes: Cell<u64>,
}

impl KittiRoadDataset {
    pub fn open(
        training_dir: &Path,
        image_shape: [usize; 2],
        num_classes: usize,
        seed: Option<u64>,
    ) -> DatasetResult<Self> {
        if num_classes != 2 {
            return Err(DatasetError::UnsupportedClasses(num_classes));
        }
        let labels: HashMap<String, PathBuf> = read_dir_sorted(&training_dir.join("gt_image_2"))?
            .into_iter()
            .filter(|p| is_png(p) && file_name(p).is_some_and(|n| n.contains("_road_")))
            .filter_map(|p| file_name(&p).and_then(label_key).map(|key| (key, p.clone())))
            .collect();

        let mut samples = Vec::new();
        for image in read_dir_sorted(&training_dir.join("image_2"))? {
            if !is_png(&image) {
                continue;
            }
            let label = file_name(&image)
                .and_then(|name| labels.get(name))
                .cloned()
                .ok_or_else(|| DatasetError::MissingLabel {
                    image: image.clone(),
                })?;
            samples.push(RoadSample { image, label });
        }
        if samples.is_empty() {
            return Err(DatasetError::Empty {
                path: training_dir.join("image_2"),
            });
        }
        tracing::info!(
            samples = samples.len(),
            dir = %training_dir.display(),
            "indexed road dataset"
        );
        Ok(Self {
            samples,
            image_shape,
            seed,
            passes: Cell::new(0),
        })
    }

    pub fn samples(&self) -> &[RoadSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn shuffled(&self) -> Vec<RoadSample> {
        let pass = self.passes.get();
        self.passes.set(pass + 1);
        let mut rng = match self.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed.wrapping_add(pass)),
            None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
        };
        let mut order = self.samples.clone();
        order.shuffle(&mut rng);
        order
    }
}

fn open_rgb(path: &Path) -> DatasetResult<image::RgbImage> {
    Ok(image::open(path)
        .map_err(|e| DatasetError::Image {
            path: path.to_path_buf(),
            source: e,
        })?
        .to_rgb8())
}

fn load_batch<B: Backend>(
    chunk: &[RoadSample],
    image_shape: [usize; 2],
    device: &B::Device,
) -> DatasetResult<SegmentationBatch<B>> {
    let [h, w] = image_shape;
    let pixels = h * w;
    let mut images = Vec::with_capacity(chunk.len() * 3 * pixels);
    let mut labels = Vec::with_capacity(chunk.len() * 2 * pixels);
    for sample in chunk {
        let image = resize_to(&open_rgb(&sample.image)?, image_shape);
        images.extend(image_to_chw(&image));

        let gt = image::imageops::resize(
            &open_rgb(&sample.label)?,
            w as u32,
            h as u32,
            FilterType::Nearest,
        );
        let background: Vec<f32> = gt
            .pixels()
            .map(|p| if p.0 == BACKGROUND_COLOR { 1.0 } else { 0.0 })
            .collect();
        // Class 0 is background, class 1 is road.
        labels.extend(background.iter().copied());
        labels.extend(background.iter().map(|bg| 1.0 - bg));
    }
    let n = chunk.len();
    Ok(SegmentationBatch {
        images: Tensor::from_data(TensorData::new(images, [n, 3, h, w]), device),
        labels: Tensor::from_data(TensorData::new(labels, [n, 2, h, w]), device),
    })
}

impl<B: Backend> BatchSource<B> for KittiRoadDataset {
    fn batches(&self, batch_size: usize, device: &B::Device) -> BatchIter<'_, B> {
        let batch_size = batch_size.max(1);
        let chunks: Vec<Vec<RoadSample>> = self
            .shuffled()
            .chunks(batch_size)
            .map(|c| c.to_vec())
            .collect();
        let image_shape = self.image_shape;
        let device = device.clone();
        Box::new(
            chunks
                .into_iter()
                .map(move |chunk| load_batch::<B>(&chunk, image_shape, &device)),
        )
    }
}

/// Deterministic road scenes: the lower half of every frame is road (last class).
#[derive(Debug, Clone)]
pub struct SyntheticRoadSource {
    pub samples: usize,
    pub image_shape: [usize; 2],
    pub num_classes: usize,
}

impl SyntheticRoadSource {
    fn batch<B: Backend>(&self, range: std::ops::Range<usize>, device: &B::Device) -> SegmentationBatch<B> {
        let [h, w] = self.image_shape;
        let classes = self.num_classes.max(1);
        let road = classes - 1;
        let n = range.len();
        let mut images = Vec::with_capacity(n * 3 * h * w);
        let mut labels = vec![0.0f32; n * classes * h * w];
        for (b, idx) in range.enumerate() {
            let shade = (idx % 5) as f32 * 0.02;
            for c in 0..3 {
                for y in 0..h {
                    for x in 0..w {
                        let base = if y >= h / 2 { 0.3 } else { 0.8 };
                        let tint = if c == 2 && y < h / 2 { 0.1 } else { 0.0 };
                        images.push(base + tint + shade + x as f32 / (w as f32 * 50.0));
                    }
                }
            }
            for y in 0..h {
                let class = if y >= h / 2 { road } else { 0 };
                for x in 0..w {
                    labels[((b * classes + class) * h + y) * w + x] = 1.0;
                }
            }
        }
        SegmentationBatch {
            images: Tensor::from_data(TensorData::new(images, [n, 3, h, w]), device),
            labels: Tensor::from_data(TensorData::new(labels, [n, classes, h, w]), device),
        }
    }
}

impl<B: Backend> BatchSource<B> for SyntheticRoadSource {
    fn batches(&self, batch_size: usize, device: &B::Device) -> BatchIter<'_, B> {
        let batch_size = batch_size.max(1);
        let device = device.clone();
        Box::new(
            (0..self.samples)
                .step_by(batch_size)
                .map(move |start| {
                    let end = (start + batch_size).min(self.samples);
                    Ok(self.batch::<B>(start..end, &device))
                }),
        )
    }
}
