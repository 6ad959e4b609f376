#![recursion_limit = "256"]

pub mod config;
pub mod dataset;
pub mod history;
pub mod objective;
pub mod session;
pub mod util;

pub use config::{BackendKind, ConfigError, RunConfig, TrainArgs};
pub use dataset::{
    BatchSource, DatasetError, KittiRoadDataset, SegmentationBatch, SyntheticRoadSource,
};
pub use history::{LossRecord, TrainingHistory};
pub use objective::{adam, optimize, Objective};
pub use session::{Session, StepFeed};
pub use util::{run_train, train_nn, TrainError, TrainPhase, TrainingState};

/// Backend alias for training (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;
