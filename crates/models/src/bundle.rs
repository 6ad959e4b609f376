//! Encoder bundles: a directory holding `saved_model.json` and a Burn weight record.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use data_contracts::{BackboneSpec, EncoderManifest, EndpointNames, ManifestError};
use thiserror::Error;

use crate::encoder::{Vgg16Encoder, TOTAL_STRIDE};

pub const MANIFEST_FILE: &str = "saved_model.json";

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("no encoder bundle at {path} (expected {manifest} and a weight record)", manifest = MANIFEST_FILE)]
    Missing { path: PathBuf },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid manifest at {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },
    #[error("failed to restore weights from {path}: {message}")]
    Weights { path: PathBuf, message: String },
}

/// One axis of a symbolic shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    /// Resolved only when concrete inputs are bound.
    Dynamic,
    Fixed(usize),
}

/// Named handle to a tensor the encoder can produce or consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub name: String,
    pub dims: Vec<Dim>,
}

impl TensorSpec {
    fn feature_map(name: &str, channels: usize) -> Self {
        Self {
            name: name.to_string(),
            dims: vec![Dim::Dynamic, Dim::Fixed(channels), Dim::Dynamic, Dim::Dynamic],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

/// The five handles a bundle exposes, in NCHW layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderEndpoints {
    pub image_input: TensorSpec,
    pub keep_prob: TensorSpec,
    pub layer3_out: TensorSpec,
    pub layer4_out: TensorSpec,
    pub layer7_out: TensorSpec,
}

impl EncoderEndpoints {
    pub fn new(names: &EndpointNames, backbone: &BackboneSpec) -> Self {
        Self {
            image_input: TensorSpec::feature_map(&names.image_input, 3),
            keep_prob: TensorSpec {
                name: names.keep_prob.clone(),
                dims: Vec::new(),
            },
            layer3_out: TensorSpec::feature_map(&names.layer3_out, backbone.stage_widths[2]),
            layer4_out: TensorSpec::feature_map(&names.layer4_out, backbone.stage_widths[3]),
            layer7_out: TensorSpec::feature_map(&names.layer7_out, backbone.fc_width),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TensorSpec> {
        [
            &self.image_input,
            &self.keep_prob,
            &self.layer3_out,
            &self.layer4_out,
            &self.layer7_out,
        ]
        .into_iter()
    }

    pub fn get(&self, name: &str) -> Option<&TensorSpec> {
        self.iter().find(|spec| spec.name == name)
    }
}

/// A restored encoder plus the metadata it was described with.
#[derive(Debug)]
pub struct LoadedEncoder<B: Backend> {
    pub encoder: Vgg16Encoder<B>,
    pub manifest: EncoderManifest,
    pub endpoints: EncoderEndpoints,
    pub root: PathBuf,
}

impl<B: Backend> LoadedEncoder<B> {
    pub fn backbone(&self) -> &BackboneSpec {
        &self.manifest.backbone
    }

    /// Concrete NCHW shapes of layer3/layer4/layer7 for a `[batch, 3, height, width]` input.
    pub fn feature_shapes(&self, batch: usize, height: usize, width: usize) -> [[usize; 4]; 3] {
        let backbone = self.backbone();
        let at = |stride: usize, channels: usize| {
            [batch, channels, height / stride, width / stride]
        };
        [
            at(TOTAL_STRIDE / 4, backbone.stage_widths[2]),
            at(TOTAL_STRIDE / 2, backbone.stage_widths[3]),
            at(TOTAL_STRIDE, backbone.fc_width),
        ]
    }
}

/// True when `vgg_path` looks like a bundle root.
pub fn bundle_exists(vgg_path: impl AsRef<Path>) -> bool {
    vgg_path.as_ref().join(MANIFEST_FILE).is_file()
}

/// Restore a pretrained VGG16 bundle from `vgg_path`.
pub fn load_vgg<B: Backend>(
    vgg_path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<LoadedEncoder<B>, BundleError> {
    let root = vgg_path.as_ref().to_path_buf();
    let manifest_path = root.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(BundleError::Missing { path: root });
    }
    let raw = fs::read(&manifest_path).map_err(|e| BundleError::Io {
        path: manifest_path.clone(),
        source: e,
    })?;
    let manifest: EncoderManifest =
        serde_json::from_slice(&raw).map_err(|e| BundleError::Json {
            path: manifest_path.clone(),
            source: e,
        })?;
    manifest.validate().map_err(|e| BundleError::Manifest {
        path: manifest_path.clone(),
        source: e,
    })?;

    let weights_path = root.join(&manifest.weights);
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let encoder = Vgg16Encoder::<B>::new(&manifest.backbone, device)
        .load_file(weights_path.clone(), &recorder, device)
        .map_err(|e| BundleError::Weights {
            path: weights_path,
            message: e.to_string(),
        })?;
    tracing::debug!(
        bundle = %root.display(),
        tag = %manifest.tag,
        "restored encoder bundle"
    );

    let endpoints = EncoderEndpoints::new(&manifest.endpoints, &manifest.backbone);
    Ok(LoadedEncoder {
        encoder,
        manifest,
        endpoints,
        root,
    })
}

/// Write `encoder` as a bundle rooted at `vgg_path`.
pub fn save_vgg<B: Backend>(
    encoder: &Vgg16Encoder<B>,
    backbone: &BackboneSpec,
    vgg_path: impl AsRef<Path>,
) -> Result<(), BundleError> {
    let root = vgg_path.as_ref();
    fs::create_dir_all(root).map_err(|e| BundleError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;
    let manifest = EncoderManifest {
        backbone: *backbone,
        ..Default::default()
    };
    let manifest_path = root.join(MANIFEST_FILE);
    let json = serde_json::to_vec_pretty(&manifest).map_err(|e| BundleError::Json {
        path: manifest_path.clone(),
        source: e,
    })?;
    fs::write(&manifest_path, json).map_err(|e| BundleError::Io {
        path: manifest_path,
        source: e,
    })?;

    let weights_path = root.join(&manifest.weights);
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    encoder
        .clone()
        .save_file(weights_path.clone(), &recorder)
        .map_err(|e| BundleError::Weights {
            path: weights_path,
            message: e.to_string(),
        })
}
