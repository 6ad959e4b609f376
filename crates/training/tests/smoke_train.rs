mod common;

use burn::tensor::Tensor;
use common::{session, AD, B};
use image::RgbImage;
use data_contracts::CheckpointManifest;
use inference::{load_checkpoint, save_checkpoint, SegmentationRenderer};
use training::{train_nn, RunConfig, SyntheticRoadSource, TrainPhase};

fn config(image_shape: [usize; 2]) -> RunConfig {
    RunConfig {
        epochs: 1,
        batch_size: 2,
        image_shape,
        seed: Some(1),
        ..Default::default()
    }
}

#[test]
fn one_epoch_one_batch_reports_iteration_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let mut session = session(tmp.path(), 2);
    let cfg = config([160, 576]);
    let source = SyntheticRoadSource {
        samples: 2,
        image_shape: cfg.image_shape,
        num_classes: 2,
    };

    let mut progress = Vec::new();
    let state = train_nn(&mut session, &cfg, &source, &mut progress).expect("train");

    assert_eq!(state.phase, TrainPhase::Done);
    assert_eq!(state.iteration, 1);
    assert_eq!(state.history.len(), 1);
    let record = state.history.records()[0];
    assert_eq!(record.iteration, 0);
    assert!(record.loss.is_finite() && record.loss >= 0.0);

    let text = String::from_utf8(progress).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Epoch: 1/1..."), "{}", lines[0]);
    assert!(lines[0].contains("Iteration: 0"));
    assert!(lines[0].contains("Training loss: "));
}

#[test]
fn trained_model_survives_checkpoint_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let mut session = session(&tmp.path().join("vgg"), 2);
    let cfg = config([64, 96]);
    let source = SyntheticRoadSource {
        samples: 2,
        image_shape: cfg.image_shape,
        num_classes: 2,
    };
    let state = train_nn(&mut session, &cfg, &source, &mut std::io::sink()).unwrap();

    let model = session.snapshot();
    let manifest = CheckpointManifest {
        backbone: *session.backbone(),
        num_classes: 2,
        image_shape: cfg.image_shape,
        iterations: state.iteration,
        final_loss: state.history.last().map(|r| r.loss),
    };
    let path = tmp.path().join("runs/model");
    save_checkpoint(&model, &manifest, &path).unwrap();

    let device = Default::default();
    let (restored, restored_manifest) = load_checkpoint::<B>(&path, &device).unwrap();
    assert_eq!(restored_manifest, manifest);

    let image = RgbImage::from_fn(96, 64, |x, y| image::Rgb([(x * 2) as u8, (y * 3) as u8, 40]));
    let before = SegmentationRenderer::new(model, 2, cfg.image_shape, Default::default())
        .road_probabilities(&image)
        .unwrap();
    let after = SegmentationRenderer::new(restored, 2, cfg.image_shape, Default::default())
        .road_probabilities(&image)
        .unwrap();
    assert_eq!(before.len(), 64 * 96);
    for (a, b) in before.iter().zip(&after) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn session_forward_keeps_spatial_size() {
    let tmp = tempfile::tempdir().unwrap();
    let session = session(tmp.path(), 3);
    let device = Default::default();
    let images = Tensor::<AD, 4>::zeros([2, 3, 64, 96], &device);
    assert_eq!(session.forward(images, 1.0).dims(), [2, 3, 64, 96]);
}
