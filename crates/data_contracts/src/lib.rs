//! Shared on-disk contracts: encoder bundles, checkpoints, and frame sequences.

pub mod bundle;
pub mod checkpoint;
pub mod frames;

pub use bundle::{BackboneSpec, EncoderManifest, EndpointNames, ManifestError, VGG_TAG};
pub use checkpoint::CheckpointManifest;
pub use frames::FrameManifest;
