#![allow(dead_code)]

use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use data_contracts::BackboneSpec;
use image::{Rgb, RgbImage};
use models::{load_vgg, save_vgg, Vgg16Encoder};
use training::Session;

pub type B = NdArray<f32>;
pub type AD = Autodiff<B>;

/// Narrow VGG layout so tests stay fast; strides match the full network.
pub fn compact() -> BackboneSpec {
    BackboneSpec {
        stage_widths: [2, 3, 4, 5, 5],
        fc_width: 6,
        fc_kernel: 3,
    }
}

pub fn write_bundle(dir: &Path) {
    let device = Default::default();
    let encoder = Vgg16Encoder::<B>::new(&compact(), &device);
    save_vgg(&encoder, &compact(), dir).expect("save bundle");
}

pub fn session(dir: &Path, num_classes: usize) -> Session<AD> {
    write_bundle(dir);
    let device = Default::default();
    let encoder = load_vgg::<B>(dir, &device).expect("load bundle");
    Session::from_encoder(encoder, num_classes, &device)
}

/// KITTI-style training pair: top half background, bottom half road.
pub fn write_kitti_pair(training_dir: &Path, stem: &str, width: u32, height: u32) {
    let images = training_dir.join("image_2");
    let labels = training_dir.join("gt_image_2");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::create_dir_all(&labels).unwrap();

    let (prefix, number) = stem.split_once('_').expect("stem like um_000000");
    let image = RgbImage::from_fn(width, height, |x, y| {
        if y >= height / 2 {
            Rgb([90, 90, 90])
        } else {
            Rgb([120, 170, (x % 255) as u8])
        }
    });
    image.save(images.join(format!("{stem}.png"))).unwrap();
    let gt = RgbImage::from_fn(width, height, |_, y| {
        if y >= height / 2 {
            Rgb([255, 0, 255])
        } else {
            Rgb([255, 0, 0])
        }
    });
    gt.save(labels.join(format!("{prefix}_road_{number}.png")))
        .unwrap();
}
