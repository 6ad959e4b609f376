use std::path::PathBuf;

use clap::Parser;
use inference::{apply_to_video, init_tracing, FrameDirSink, FrameDirSource, InferenceFactory};
use vision_core::interfaces::Renderer;

#[derive(Parser, Debug)]
#[command(
    name = "segment",
    about = "Paint predicted road pixels on an image or a frame sequence"
)]
struct Args {
    /// Checkpoint path given to `train`; `.bin` and `.json` are appended.
    #[arg(long, default_value = "runs/model")]
    checkpoint: PathBuf,
    /// Single image to segment.
    #[arg(long, conflicts_with = "frames")]
    image: Option<PathBuf>,
    /// Frame directory (with frames.json) to segment frame by frame.
    #[arg(long)]
    frames: Option<PathBuf>,
    /// Output image path, or output frame directory with --frames.
    #[arg(long, default_value = "runs/segmented")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let renderer = InferenceFactory.build(&args.checkpoint)?;

    match (args.image, args.frames) {
        (Some(image_path), _) => {
            let image = image::open(&image_path)?.to_rgb8();
            let rendered = renderer.render(&image)?;
            if let Some(parent) = args.output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            rendered.save(&args.output)?;
            println!("Saved overlay to {}", args.output.display());
        }
        (None, Some(frames)) => {
            let mut source = FrameDirSource::open(&frames)?;
            let mut sink = FrameDirSink::create(&args.output)?;
            let count = apply_to_video(&mut source, &mut sink, &renderer)?;
            println!("Wrote {count} frames to {}", args.output.display());
        }
        (None, None) => anyhow::bail!("pass --image or --frames"),
    }
    Ok(())
}
