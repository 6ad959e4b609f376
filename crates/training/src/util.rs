use std::io::{self, Write};
use std::path::Path;

use burn::backend::Autodiff;
use burn::tensor::backend::{AutodiffBackend, Backend};
use data_contracts::CheckpointManifest;
use inference::renderer::SegmentationRenderer;
use inference::samples::TEST_IMAGES_SUBDIR;
use inference::{apply_to_video, save_checkpoint, save_inference_samples, FrameDirSink, FrameDirSource};
use models::{bundle_exists, FcnDecoder};
use thiserror::Error;

use crate::config::{BackendKind, RunConfig, TrainArgs};
use crate::dataset::{BatchSource, DatasetError, KittiRoadDataset};
use crate::history::TrainingHistory;
use crate::objective::adam;
use crate::session::{Session, StepFeed};
use crate::TrainBackend;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("failed to write progress: {0}")]
    Progress(#[from] io::Error),
    #[error("loss diverged at iteration {iteration}: {loss}")]
    NonFiniteLoss { iteration: usize, loss: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainPhase {
    Initializing,
    EpochRunning { epoch: usize },
    Done,
}

#[derive(Debug, Clone)]
pub struct TrainingState {
    pub phase: TrainPhase,
    /// Zero-based epoch currently (or last) running.
    pub epoch: usize,
    /// Global iteration counter; equals the number of completed steps.
    pub iteration: usize,
    pub history: TrainingHistory,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self {
            phase: TrainPhase::Initializing,
            epoch: 0,
            iteration: 0,
            history: TrainingHistory::default(),
        }
    }
}

/// `epoch` is 1-based.
pub fn format_progress(epoch: usize, epochs: usize, iteration: usize, loss: f32) -> String {
    format!("Epoch: {epoch}/{epochs}... Iteration: {iteration} Training loss: {loss:.5}")
}

/// Run `cfg.epochs` passes over `source`, one optimizer step per batch.
///
/// Decoder parameters are re-drawn first. A progress line goes to `progress`
/// whenever the global iteration is a multiple of `cfg.progress_every`.
pub fn train_nn<B, S>(
    session: &mut Session<B>,
    cfg: &RunConfig,
    source: &S,
    progress: &mut dyn Write,
) -> Result<TrainingState, TrainError>
where
    B: AutodiffBackend,
    S: BatchSource<B> + ?Sized,
{
    let mut state = TrainingState::default();
    session.initialize();
    let mut optim = adam().init::<B, FcnDecoder<B>>();
    let feed = StepFeed {
        keep_prob: cfg.keep_prob,
        learning_rate: cfg.learning_rate,
        include_regularization: cfg.include_regularization,
    };

    for epoch in 0..cfg.epochs {
        state.phase = TrainPhase::EpochRunning { epoch };
        state.epoch = epoch;
        let device = session.device().clone();
        for batch in source.batches(cfg.batch_size, &device) {
            let batch = batch?;
            let loss = session.step(batch.images, batch.labels, feed, &mut optim);
            if !loss.is_finite() {
                return Err(TrainError::NonFiniteLoss {
                    iteration: state.iteration,
                    loss,
                });
            }
            state.history.push(state.iteration, loss);
            if state.iteration % cfg.progress_every == 0 {
                writeln!(
                    progress,
                    "{}",
                    format_progress(epoch + 1, cfg.epochs, state.iteration, loss)
                )?;
            }
            state.iteration += 1;
        }
        tracing::debug!(epoch = epoch + 1, iterations = state.iteration, "epoch complete");
    }
    state.phase = TrainPhase::Done;
    Ok(state)
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            tracing::warn!("built with backend-wgpu; training will still use the WGPU backend despite --backend ndarray");
        }
        (BackendKind::NdArray, false) => {
            tracing::warn!("no GPU backend built in; training runs on the CPU (ndarray)");
        }
        _ => {}
    }
    Ok(())
}

/// Fail before any tensor work if the dataset or encoder bundle is absent.
pub fn check_resources(cfg: &RunConfig) -> anyhow::Result<()> {
    let training_dir = cfg.training_dir();
    if !training_dir.is_dir() {
        anyhow::bail!(
            "training data not found at {}; extract the KITTI road dataset (data_road) into {}",
            training_dir.display(),
            cfg.data_dir.display()
        );
    }
    let vgg_path = cfg.vgg_path();
    if !bundle_exists(&vgg_path) {
        anyhow::bail!(
            "pretrained VGG16 bundle not found at {}; place saved_model.json and variables.bin there",
            vgg_path.display()
        );
    }
    Ok(())
}

/// Install the fmt subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    inference::init_tracing();
}

type ADBackend = Autodiff<TrainBackend>;

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let cfg = args.resolve()?;
    cfg.validate()?;
    validate_backend_choice(args.backend)?;
    check_resources(&cfg)?;
    // Dataset errors surface before the encoder record is restored.
    let dataset = KittiRoadDataset::open(
        &cfg.training_dir(),
        cfg.image_shape,
        cfg.num_classes,
        cfg.seed,
    )?;

    let device = <ADBackend as Backend>::Device::default();
    if let Some(seed) = cfg.seed {
        ADBackend::seed(seed);
    }
    let mut session = Session::<ADBackend>::open(cfg.vgg_path(), cfg.num_classes, &device)?;

    let state = {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        train_nn(&mut session, &cfg, &dataset, &mut out)?
    };
    state.history.save_plot(&cfg.plot_file())?;

    let model = session.snapshot();
    let manifest = CheckpointManifest {
        backbone: *session.backbone(),
        num_classes: cfg.num_classes,
        image_shape: cfg.image_shape,
        iterations: state.iteration,
        final_loss: state.history.last().map(|r| r.loss),
    };
    drop(session);

    let renderer = SegmentationRenderer::new(model.clone(), cfg.num_classes, cfg.image_shape, device);
    if cfg.data_dir.join(TEST_IMAGES_SUBDIR).is_dir() {
        save_inference_samples(&cfg.runs_dir, &cfg.data_dir, &renderer)?;
    } else {
        tracing::warn!(
            dir = %cfg.data_dir.join(TEST_IMAGES_SUBDIR).display(),
            "no test images; skipping inference samples"
        );
    }

    let checkpoint = cfg.checkpoint_path();
    save_checkpoint(&model, &manifest, &checkpoint)?;

    if let Some(video) = &cfg.video_input {
        apply_video(video, &cfg.video_output_dir(), &renderer)?;
    }

    println!(
        "Saved checkpoint to {}",
        inference::checkpoint::record_path(&checkpoint).display()
    );
    Ok(())
}

fn apply_video<B: Backend>(
    input: &Path,
    output: &Path,
    renderer: &SegmentationRenderer<B>,
) -> anyhow::Result<()> {
    let mut source = FrameDirSource::open(input)?;
    let mut sink = FrameDirSink::create(output)?;
    let count = apply_to_video(&mut source, &mut sink, renderer)?;
    println!("Wrote {count} segmented frames to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_format() {
        assert_eq!(
            format_progress(1, 20, 0, 0.693_147),
            "Epoch: 1/20... Iteration: 0 Training loss: 0.69315"
        );
        assert_eq!(
            format_progress(3, 3, 40, 0.1),
            "Epoch: 3/3... Iteration: 40 Training loss: 0.10000"
        );
    }

    #[test]
    fn missing_data_fails_before_training() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = RunConfig {
            data_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let err = check_resources(&cfg).unwrap_err();
        assert!(err.to_string().contains("data_road"));

        std::fs::create_dir_all(cfg.training_dir()).unwrap();
        let err = check_resources(&cfg).unwrap_err();
        assert!(err.to_string().contains("VGG16"));
    }
}
