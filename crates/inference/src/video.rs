//! Frame-by-frame application of a renderer to a frame sequence.
//!
//! Sequences live in a directory with a `frames.json` manifest (playback rate and
//! ordered file names) next to the frame images.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use data_contracts::FrameManifest;
use image::RgbImage;
use vision_core::interfaces::{Frame, FrameSink, FrameSource, Renderer};

pub const FRAME_MANIFEST: &str = "frames.json";

pub struct FrameDirSource {
    root: PathBuf,
    manifest: FrameManifest,
    cursor: usize,
}

impl FrameDirSource {
    pub fn open(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(FRAME_MANIFEST);
        let raw = fs::read(&manifest_path)
            .with_context(|| format!("no frame manifest at {}", manifest_path.display()))?;
        let manifest: FrameManifest = serde_json::from_slice(&raw)
            .with_context(|| format!("invalid frame manifest {}", manifest_path.display()))?;
        manifest
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid frame manifest {}: {e}", manifest_path.display()))?;
        Ok(Self {
            root,
            manifest,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.manifest.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.frames.is_empty()
    }
}

impl FrameSource for FrameDirSource {
    fn fps(&self) -> f64 {
        self.manifest.fps
    }

    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        let Some(name) = self.manifest.frames.get(self.cursor) else {
            return Ok(None);
        };
        let path = self.root.join(name);
        let image = image::open(&path)
            .with_context(|| format!("failed to open frame {}", path.display()))?
            .to_rgb8();
        let index = self.cursor as u64;
        self.cursor += 1;
        Ok(Some(Frame {
            index,
            timestamp: index as f64 / self.manifest.fps,
            image,
        }))
    }
}

pub struct FrameDirSink {
    root: PathBuf,
    frames: Vec<String>,
}

impl FrameDirSink {
    pub fn create(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            frames: Vec::new(),
        })
    }
}

impl FrameSink for FrameDirSink {
    fn write_frame(&mut self, index: u64, image: &RgbImage) -> anyhow::Result<()> {
        let name = format!("frame_{index:06}.png");
        image.save(self.root.join(&name))?;
        self.frames.push(name);
        Ok(())
    }

    fn finish(&mut self, fps: f64) -> anyhow::Result<()> {
        let manifest = FrameManifest {
            fps,
            frames: std::mem::take(&mut self.frames),
        };
        manifest
            .validate()
            .map_err(|e| anyhow::anyhow!("refusing to write frame manifest: {e}"))?;
        fs::write(
            self.root.join(FRAME_MANIFEST),
            serde_json::to_vec_pretty(&manifest)?,
        )?;
        Ok(())
    }
}

/// Render every frame of `source` into `sink` at the source rate; returns the frame count.
pub fn apply_to_video<S, K, R>(source: &mut S, sink: &mut K, renderer: &R) -> anyhow::Result<usize>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
    R: Renderer + ?Sized,
{
    let mut count = 0usize;
    while let Some(frame) = source.next_frame()? {
        let rendered = renderer.render(&frame.image)?;
        sink.write_frame(frame.index, &rendered)?;
        count += 1;
    }
    sink.finish(source.fps())?;
    tracing::info!(frames = count, fps = source.fps(), "applied renderer to frame sequence");
    Ok(count)
}
