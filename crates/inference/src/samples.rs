use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use vision_core::interfaces::Renderer;

/// Test images rendered after training, relative to the data directory.
pub const TEST_IMAGES_SUBDIR: &str = "data_road/testing/image_2";

/// PNG files directly under `dir`, sorted by name.
pub fn list_pngs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("png") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Render every test image into a fresh `runs_dir/<unix time>` directory and return it.
pub fn save_inference_samples<R: Renderer + ?Sized>(
    runs_dir: &Path,
    data_dir: &Path,
    renderer: &R,
) -> anyhow::Result<PathBuf> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
    let output_dir = runs_dir.join(format!("{}.{:03}", now.as_secs(), now.subsec_millis()));
    if output_dir.exists() {
        fs::remove_dir_all(&output_dir)?;
    }
    fs::create_dir_all(&output_dir)?;

    println!(
        "Training Finished. Saving test images to: {}",
        output_dir.display()
    );
    let images = list_pngs(&data_dir.join(TEST_IMAGES_SUBDIR))?;
    for path in &images {
        let image = image::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?
            .to_rgb8();
        let rendered = renderer.render(&image)?;
        let name = path
            .file_name()
            .with_context(|| format!("no file name in {}", path.display()))?;
        rendered.save(output_dir.join(name))?;
    }
    tracing::info!(count = images.len(), dir = %output_dir.display(), "saved inference samples");
    Ok(output_dir)
}
