use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use models::TOTAL_STRIDE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("epochs must be at least 1")]
    NoEpochs,
    #[error("batch_size must be at least 1")]
    EmptyBatch,
    #[error("num_classes must be at least 1")]
    NoClasses,
    #[error("image_shape {0:?} must be positive multiples of {stride}", stride = TOTAL_STRIDE)]
    ImageShape([usize; 2]),
    #[error("learning_rate must be finite and positive, got {0}")]
    LearningRate(f64),
    #[error("keep_prob must be in (0, 1], got {0}")]
    KeepProb(f64),
    #[error("progress_every must be at least 1")]
    ProgressEvery,
}

/// Every tunable of a training run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub num_classes: usize,
    /// (height, width) images are resized to.
    pub image_shape: [usize; 2],
    pub learning_rate: f64,
    /// Dropout keep probability while training; inference always uses 1.0.
    pub keep_prob: f64,
    /// Report progress every this many iterations.
    pub progress_every: usize,
    pub seed: Option<u64>,
    /// Add the decoder's L2 penalty to the optimized loss.
    pub include_regularization: bool,
    pub data_dir: PathBuf,
    pub runs_dir: PathBuf,
    /// Encoder bundle root; `<data_dir>/vgg` when unset.
    pub vgg_dir: Option<PathBuf>,
    /// Checkpoint path, extended with `.bin`/`.json`; `<runs_dir>/model` when unset.
    pub checkpoint: Option<PathBuf>,
    /// Loss plot; `<runs_dir>/training.png` when unset.
    pub plot_path: Option<PathBuf>,
    /// Frame directory to segment after training.
    pub video_input: Option<PathBuf>,
    /// `<runs_dir>/video` when unset.
    pub video_output: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            batch_size: 5,
            num_classes: 2,
            image_shape: [160, 576],
            learning_rate: 1e-3,
            keep_prob: 0.5,
            progress_every: 10,
            seed: None,
            include_regularization: false,
            data_dir: PathBuf::from("./data"),
            vgg_dir: None,
            runs_dir: PathBuf::from("./runs"),
            checkpoint: None,
            plot_path: None,
            video_input: None,
            video_output: None,
        }
    }
}

impl RunConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epochs == 0 {
            return Err(ConfigError::NoEpochs);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::EmptyBatch);
        }
        if self.num_classes == 0 {
            return Err(ConfigError::NoClasses);
        }
        if self
            .image_shape
            .iter()
            .any(|side| *side == 0 || side % TOTAL_STRIDE != 0)
        {
            return Err(ConfigError::ImageShape(self.image_shape));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::LearningRate(self.learning_rate));
        }
        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            return Err(ConfigError::KeepProb(self.keep_prob));
        }
        if self.progress_every == 0 {
            return Err(ConfigError::ProgressEvery);
        }
        Ok(())
    }

    pub fn vgg_path(&self) -> PathBuf {
        self.vgg_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("vgg"))
    }

    pub fn training_dir(&self) -> PathBuf {
        self.data_dir.join("data_road/training")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint
            .clone()
            .unwrap_or_else(|| self.runs_dir.join("model"))
    }

    pub fn plot_file(&self) -> PathBuf {
        self.plot_path
            .clone()
            .unwrap_or_else(|| self.runs_dir.join("training.png"))
    }

    pub fn video_output_dir(&self) -> PathBuf {
        self.video_output
            .clone()
            .unwrap_or_else(|| self.runs_dir.join("video"))
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(Parser, Debug)]
#[command(
    name = "train",
    about = "Train the FCN-8 road segmentation head on a frozen VGG16 encoder"
)]
pub struct TrainArgs {
    /// TOML run config; flags below override it.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Number of epochs.
    #[arg(long)]
    pub epochs: Option<usize>,
    /// Batch size.
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Learning rate.
    #[arg(long)]
    pub learning_rate: Option<f64>,
    /// Dropout keep probability during training.
    #[arg(long)]
    pub keep_prob: Option<f64>,
    /// Root holding data_road/ and vgg/.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Output root for plots, samples and checkpoints.
    #[arg(long)]
    pub runs_dir: Option<PathBuf>,
    /// Encoder bundle root (defaults to <data-dir>/vgg).
    #[arg(long)]
    pub vgg_dir: Option<PathBuf>,
    /// Checkpoint output path; `.bin` and `.json` are appended.
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
    /// Seed for parameter init and batch shuffling.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Frame directory to segment once training finishes.
    #[arg(long)]
    pub video: Option<PathBuf>,
}

impl TrainArgs {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn resolve(&self) -> Result<RunConfig, ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_path(path)?,
            None => RunConfig::default(),
        };
        if let Some(v) = self.epochs {
            cfg.epochs = v;
        }
        if let Some(v) = self.batch_size {
            cfg.batch_size = v;
        }
        if let Some(v) = self.learning_rate {
            cfg.learning_rate = v;
        }
        if let Some(v) = self.keep_prob {
            cfg.keep_prob = v;
        }
        if let Some(v) = &self.data_dir {
            cfg.data_dir = v.clone();
        }
        if let Some(v) = &self.runs_dir {
            cfg.runs_dir = v.clone();
        }
        if let Some(v) = &self.vgg_dir {
            cfg.vgg_dir = Some(v.clone());
        }
        if let Some(v) = &self.checkpoint {
            cfg.checkpoint = Some(v.clone());
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if let Some(v) = &self.video {
            cfg.video_input = Some(v.clone());
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_run() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.epochs, 20);
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.num_classes, 2);
        assert_eq!(cfg.image_shape, [160, 576]);
        assert_eq!(cfg.learning_rate, 1e-3);
        assert_eq!(cfg.keep_prob, 0.5);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.vgg_path(), PathBuf::from("./data/vgg"));
    }

    #[test]
    fn misaligned_image_shape_rejected() {
        let cfg = RunConfig {
            image_shape: [150, 576],
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::ImageShape(_))));
    }

    #[test]
    fn keep_prob_bounds() {
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            let cfg = RunConfig {
                keep_prob: bad,
                ..Default::default()
            };
            assert!(matches!(cfg.validate(), Err(ConfigError::KeepProb(_))));
        }
    }

    #[test]
    fn flags_override_defaults() {
        let args = TrainArgs::parse_from([
            "train",
            "--epochs",
            "3",
            "--runs-dir",
            "/tmp/out",
            "--seed",
            "7",
        ]);
        let cfg = args.resolve().unwrap();
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.checkpoint_path(), PathBuf::from("/tmp/out/model"));
        assert_eq!(cfg.plot_file(), PathBuf::from("/tmp/out/training.png"));
        assert_eq!(cfg.batch_size, 5);
    }
}
