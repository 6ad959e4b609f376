use image::RgbImage;

/// A decoded frame and its position in the sequence.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    /// Presentation time in seconds.
    pub timestamp: f64,
    pub image: RgbImage,
}

/// Pulls frames from some source (frame directory, decoder, test generator).
pub trait FrameSource {
    /// Native playback rate of the source.
    fn fps(&self) -> f64;
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>>;
}

/// Persists rendered frames.
pub trait FrameSink {
    fn write_frame(&mut self, index: u64, image: &RgbImage) -> anyhow::Result<()>;
    /// Flushes the sequence; `fps` is the rate the output should play back at.
    fn finish(&mut self, fps: f64) -> anyhow::Result<()>;
}

/// Turns a raw frame into an annotated one.
pub trait Renderer {
    fn render(&self, image: &RgbImage) -> anyhow::Result<RgbImage>;
}
