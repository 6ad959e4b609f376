#![recursion_limit = "256"]

pub mod checkpoint;
pub mod factory;
pub mod renderer;
pub mod samples;
pub mod video;

#[cfg(feature = "backend-wgpu")]
pub type InferenceBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type InferenceBackend = burn_ndarray::NdArray<f32>;

pub use checkpoint::{load_checkpoint, save_checkpoint, CheckpointError};
pub use factory::InferenceFactory;
pub use renderer::SegmentationRenderer;
pub use samples::save_inference_samples;
pub use video::{apply_to_video, FrameDirSink, FrameDirSource};

pub mod prelude {
    pub use crate::checkpoint::{load_checkpoint, save_checkpoint};
    pub use crate::factory::InferenceFactory;
    pub use crate::renderer::SegmentationRenderer;
    pub use crate::video::{apply_to_video, FrameDirSink, FrameDirSource};
    pub use crate::InferenceBackend;
}

/// Install the fmt subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
