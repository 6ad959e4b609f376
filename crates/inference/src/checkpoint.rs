//! Trained model persistence: `<path>.bin` record plus `<path>.json` manifest.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use data_contracts::{CheckpointManifest, ManifestError};
use models::FcnVgg16;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("no checkpoint manifest at {path}")]
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
    #[error("invalid checkpoint manifest at {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },
    #[error("checkpoint record error at {path}: {message}")]
    Record { path: PathBuf, message: String },
}

/// `path` with `.{ext}` appended, keeping any extension it already has.
fn with_suffix(path: &Path, ext: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

pub fn manifest_path(path: &Path) -> PathBuf {
    with_suffix(path, "json")
}

pub fn record_path(path: &Path) -> PathBuf {
    with_suffix(path, "bin")
}

pub fn save_checkpoint<B: Backend>(
    model: &FcnVgg16<B>,
    manifest: &CheckpointManifest,
    path: impl AsRef<Path>,
) -> Result<(), CheckpointError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CheckpointError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let meta_path = manifest_path(path);
    let json = serde_json::to_vec_pretty(manifest).map_err(|e| CheckpointError::Json {
        path: meta_path.clone(),
        source: e,
    })?;
    fs::write(&meta_path, json).map_err(|e| CheckpointError::Io {
        path: meta_path,
        source: e,
    })?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(record_path(path), &recorder)
        .map_err(|e| CheckpointError::Record {
            path: record_path(path),
            message: e.to_string(),
        })
}

pub fn load_checkpoint<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(FcnVgg16<B>, CheckpointManifest), CheckpointError> {
    let path = path.as_ref();
    let meta_path = manifest_path(path);
    if !meta_path.is_file() {
        return Err(CheckpointError::Missing { path: meta_path });
    }
    let raw = fs::read(&meta_path).map_err(|e| CheckpointError::Io {
        path: meta_path.clone(),
        source: e,
    })?;
    let manifest: CheckpointManifest =
        serde_json::from_slice(&raw).map_err(|e| CheckpointError::Json {
            path: meta_path.clone(),
            source: e,
        })?;
    manifest.validate().map_err(|e| CheckpointError::Manifest {
        path: meta_path,
        source: e,
    })?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let model = FcnVgg16::<B>::new(&manifest.backbone, manifest.num_classes, device)
        .load_file(record_path(path), &recorder, device)
        .map_err(|e| CheckpointError::Record {
            path: record_path(path),
            message: e.to_string(),
        })?;
    Ok((model, manifest))
}
