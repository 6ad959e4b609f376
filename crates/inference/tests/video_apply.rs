use std::fs;
use std::path::Path;

use data_contracts::FrameManifest;
use image::{Rgb, RgbImage};
use inference::video::FRAME_MANIFEST;
use inference::{apply_to_video, save_inference_samples, FrameDirSink, FrameDirSource};
use vision_core::interfaces::{FrameSource, Renderer};

/// Inverts every pixel; stands in for a trained model.
struct Invert;

impl Renderer for Invert {
    fn render(&self, image: &RgbImage) -> anyhow::Result<RgbImage> {
        let mut out = image.clone();
        for p in out.pixels_mut() {
            *p = Rgb([255 - p[0], 255 - p[1], 255 - p[2]]);
        }
        Ok(out)
    }
}

fn write_sequence(dir: &Path, count: usize, fps: f64) {
    fs::create_dir_all(dir).unwrap();
    let mut frames = Vec::new();
    for i in 0..count {
        let name = format!("in_{i}.png");
        RgbImage::from_pixel(4, 3, Rgb([i as u8 * 10, 0, 0]))
            .save(dir.join(&name))
            .unwrap();
        frames.push(name);
    }
    let manifest = FrameManifest { fps, frames };
    fs::write(
        dir.join(FRAME_MANIFEST),
        serde_json::to_vec(&manifest).unwrap(),
    )
    .unwrap();
}

#[test]
fn every_frame_is_rendered_at_source_rate() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("in");
    let output = tmp.path().join("out");
    write_sequence(&input, 3, 25.0);

    let mut source = FrameDirSource::open(&input).unwrap();
    assert_eq!(source.len(), 3);
    let mut sink = FrameDirSink::create(&output).unwrap();
    let count = apply_to_video(&mut source, &mut sink, &Invert).unwrap();
    assert_eq!(count, 3);

    let written: FrameManifest =
        serde_json::from_slice(&fs::read(output.join(FRAME_MANIFEST)).unwrap()).unwrap();
    assert_eq!(written.fps, 25.0);
    assert_eq!(written.frames.len(), 3);
    let last = image::open(output.join(&written.frames[2])).unwrap().to_rgb8();
    assert_eq!(last.get_pixel(0, 0), &Rgb([235, 255, 255]));
}

#[test]
fn frame_timestamps_follow_fps() {
    let tmp = tempfile::tempdir().unwrap();
    write_sequence(tmp.path(), 2, 10.0);
    let mut source = FrameDirSource::open(tmp.path()).unwrap();
    let first = source.next_frame().unwrap().unwrap();
    let second = source.next_frame().unwrap().unwrap();
    assert_eq!(first.timestamp, 0.0);
    assert!((second.timestamp - 0.1).abs() < 1e-9);
    assert!(source.next_frame().unwrap().is_none());
}

#[test]
fn missing_manifest_fails_to_open() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(FrameDirSource::open(tmp.path()).is_err());
}

#[test]
fn samples_are_written_per_test_image() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    let test_dir = data_dir.join(inference::samples::TEST_IMAGES_SUBDIR);
    fs::create_dir_all(&test_dir).unwrap();
    for name in ["um_000000.png", "um_000001.png"] {
        RgbImage::new(8, 8).save(test_dir.join(name)).unwrap();
    }
    fs::write(test_dir.join("notes.txt"), b"skip me").unwrap();

    let runs_dir = tmp.path().join("runs");
    let out = save_inference_samples(&runs_dir, &data_dir, &Invert).unwrap();
    assert!(out.starts_with(&runs_dir));
    let rendered = image::open(out.join("um_000001.png")).unwrap().to_rgb8();
    assert_eq!(rendered.get_pixel(3, 3), &Rgb([255, 255, 255]));
    assert!(!out.join("notes.txt").exists());
}
